// ABOUTME: Error types for pseudo-terminal process handles
// Defines the failures a spawned child can report through its handle

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("PTY creation failed: {0}")]
    PtyCreationFailed(String),

    #[error("Failed to spawn `{program}`: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Resize failed: {0}")]
    ResizeFailed(String),

    #[error("Kill failed: {0}")]
    KillFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
