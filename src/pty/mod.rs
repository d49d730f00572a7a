// ABOUTME: Pseudo-terminal process handles
// Spawns children on a PTY and reports their output and exit as an ordered event stream

pub mod error;
pub mod native;
pub mod process;

pub use error::PtyError;
pub use native::NativePtySpawner;
pub use process::{ProcessEvent, ProcessHandle, ProcessSpawner, SpawnSpec, SpawnedProcess, TerminalSize};
