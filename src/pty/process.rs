// ABOUTME: Process handle abstraction shared by the native PTY backend and test doubles
// A handle accepts writes, resizes and kills; output and exit arrive on a per-handle channel

use crate::pty::error::PtyError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    pub const fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Everything needed to start a child on a fresh PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub size: TerminalSize,
}

impl SpawnSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>, size: TerminalSize) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: HashMap::new(),
            size,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Notifications produced by one child, delivered in the order the child produced them.
/// `Exit` is always the last event of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output(Vec<u8>),
    Exit(Option<u32>),
}

/// A live (or already exited) child attached to a PTY.
///
/// Every operation may fail once the child is gone; callers treat failures as
/// best effort.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessHandle: Send {
    /// Queue bytes for the child's stdin without waiting for the write to land.
    fn write(&self, data: &[u8]) -> Result<(), PtyError>;

    fn resize(&self, size: TerminalSize) -> Result<(), PtyError>;

    /// Ask the child to terminate. Does not wait for the exit to be observed.
    fn kill(&mut self) -> Result<(), PtyError>;

    fn pid(&self) -> Option<u32>;
}

/// A freshly spawned child: its handle plus the receiving end of its event stream
pub struct SpawnedProcess {
    pub handle: Box<dyn ProcessHandle>,
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.handle.pid())
            .finish_non_exhaustive()
    }
}

/// Starts children. Implemented by the native PTY backend and by test fakes.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, spec: SpawnSpec) -> Result<SpawnedProcess, PtyError>;
}
