// ABOUTME: Keyboard input handling for attached sessions
// Shortcut recognition and routing of raw bytes to the focused process

pub mod router;
pub mod shortcuts;

pub use router::{InputAction, InputRouter};
pub use shortcuts::{KeyBinding, KeyBindingError, KeyBindings, ShortcutAction, ShortcutResolver};
