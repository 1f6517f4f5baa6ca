use std::io::Write;

use crate::defs::OutputSurface;

/// Writes every update to stdout under a fixed label.
pub struct ConsoleSurface {
    label: String,
}

impl ConsoleSurface {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
        }
    }
}

impl OutputSurface for ConsoleSurface {
    fn set_text(&self, text: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // Write errors are ignored.
        let _ = writeln!(out, "[{}] {}", self.label, text.replace('\n', "\n    "));
        let _ = out.flush();
    }
}
