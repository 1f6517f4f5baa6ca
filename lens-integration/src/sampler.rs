use crate::types::SampleState;
use interfaces::TextSource;
use std::sync::Arc;
use tracing::debug;

/// Reads the live text source once per tick.
pub struct Sampler {
    source: Arc<dyn TextSource>,
}

impl Sampler {
    pub fn new(source: Arc<dyn TextSource>) -> Self {
        Self { source }
    }

    /// Copy the current source value into `state.accumulated_text` when it is
    /// non-empty and differs from what was last sent. The value replaces, never
    /// extends, whatever was accumulated before.
    ///
    /// Returns `true` when the accumulated text changed.
    pub fn capture(&self, state: &mut SampleState) -> bool {
        let current = match self.source.current_text() {
            Some(text) => text,
            None => return false,
        };

        let current = current.trim();
        if current.is_empty() || current == state.last_sent_text {
            return false;
        }
        if current == state.accumulated_text {
            return false;
        }

        debug!("Captured transcription: {}", current);
        state.accumulated_text = current.to_string();
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Dispatch(String),
    Empty,
    Unchanged,
}

/// Single-value deduplication in front of the dispatcher.
pub struct ChangeGate;

impl ChangeGate {
    pub fn check(state: &SampleState) -> GateDecision {
        let candidate = state.accumulated_text.trim();
        if candidate.is_empty() {
            GateDecision::Empty
        } else if candidate == state.last_sent_text {
            GateDecision::Unchanged
        } else {
            GateDecision::Dispatch(candidate.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::SharedText;

    fn sampler_over(text: &SharedText) -> Sampler {
        Sampler::new(Arc::new(text.clone()))
    }

    #[test]
    fn capture_replaces_instead_of_appending() {
        let source = SharedText::new("um I think");
        let sampler = sampler_over(&source);
        let mut state = SampleState::default();

        assert!(sampler.capture(&mut state));
        source.set("um I think the project went well");
        assert!(sampler.capture(&mut state));

        assert_eq!(state.accumulated_text, "um I think the project went well");
    }

    #[test]
    fn capture_ignores_empty_and_already_sent_values() {
        let source = SharedText::new("   ");
        let sampler = sampler_over(&source);
        let mut state = SampleState {
            accumulated_text: "previous".to_string(),
            last_sent_text: "previous".to_string(),
            last_send_timestamp: 1,
        };

        assert!(!sampler.capture(&mut state));
        source.set("previous");
        assert!(!sampler.capture(&mut state));
        assert_eq!(state.accumulated_text, "previous");
    }

    #[test]
    fn gate_skips_text_equal_to_last_sent_after_trimming() {
        let state = SampleState {
            accumulated_text: "  hello world \n".to_string(),
            last_sent_text: "hello world".to_string(),
            last_send_timestamp: 10,
        };
        assert_eq!(ChangeGate::check(&state), GateDecision::Unchanged);
    }

    #[test]
    fn gate_rejects_blank_text() {
        let state = SampleState {
            accumulated_text: " \t ".to_string(),
            ..Default::default()
        };
        assert_eq!(ChangeGate::check(&state), GateDecision::Empty);
    }

    #[test]
    fn gate_forwards_trimmed_new_text() {
        let state = SampleState {
            accumulated_text: "  like, the demo worked ".to_string(),
            last_sent_text: "like, the demo".to_string(),
            last_send_timestamp: 10,
        };
        assert_eq!(
            ChangeGate::check(&state),
            GateDecision::Dispatch("like, the demo worked".to_string())
        );
    }
}
