use std::sync::{Arc, Mutex, RwLock};

use crate::defs::{OutputSurface, TextSource};

/// A text source backed by a shared string. Clones share the same value, so a
/// host (or a test) keeps one clone to write into while the pipeline reads.
#[derive(Clone, Default)]
pub struct SharedText {
    value: Arc<RwLock<String>>,
}

impl SharedText {
    pub fn new(initial: &str) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial.to_owned())),
        }
    }

    pub fn set(&self, text: &str) {
        let mut value = self.value.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *value = text.to_owned();
    }
}

impl TextSource for SharedText {
    fn current_text(&self) -> Option<String> {
        let value = self.value.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if value.is_empty() {
            None
        } else {
            Some(value.clone())
        }
    }
}

/// An output surface that remembers every value written to it.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    history: Arc<Mutex<Vec<String>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value currently displayed.
    pub fn latest(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    /// Every value ever displayed, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OutputSurface for RecordingSurface {
    fn set_text(&self, text: &str) {
        self.lock().push(text.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_text_reports_empty_as_none() {
        let source = SharedText::default();
        assert_eq!(source.current_text(), None);

        let writer = source.clone();
        writer.set("um, hello there");
        assert_eq!(source.current_text().as_deref(), Some("um, hello there"));
    }

    #[test]
    fn recording_surface_keeps_order() {
        let surface = RecordingSurface::new();
        surface.set_text("Sending to integration...");
        surface.set_text("Integration Result:\nok");

        assert_eq!(surface.write_count(), 2);
        assert_eq!(surface.latest().as_deref(), Some("Integration Result:\nok"));
        assert_eq!(surface.history()[0], "Sending to integration...");
    }
}
