/// A live text value owned by the host, e.g. a speech transcription widget.
pub trait TextSource: Send + Sync {
    /// Current value of the source. `None` when the host has nothing to show.
    fn current_text(&self) -> Option<String>;
}

/// A text display owned by the host: a result label or an overlay.
pub trait OutputSurface: Send + Sync {
    fn set_text(&self, text: &str);
}

// Object style note:
// Hosts own the widgets; these traits only read or replace a single string
// value and must never block. Anything that needs to wait (network, timers)
// lives on the caller's side of the seam.
