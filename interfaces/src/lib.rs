pub mod console;
pub mod defs;
pub mod memory;

pub use console::ConsoleSurface;
pub use defs::{OutputSurface, TextSource};
pub use memory::{RecordingSurface, SharedText};
