// ABOUTME: Error types surfaced by the session multiplexer
// Only lookups and spawns fail; kill, resize and write failures are reported, never raised

use crate::pty::PtyError;
use crate::session::Channel;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("Session already exists for workspace: {}", .0.display())]
    SessionAlreadyExists(PathBuf),

    #[error("No session for workspace: {}", .0.display())]
    SessionNotFound(PathBuf),

    #[error("Failed to start {channel} process: {source}")]
    ProcessSpawnFailure {
        channel: Channel,
        #[source]
        source: PtyError,
    },
}

impl MuxError {
    pub const fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::ProcessSpawnFailure { .. })
    }
}
