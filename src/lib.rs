// ABOUTME: Library crate for agents-mux exposing the session multiplexer for the binary and tests
// Sessions pair a primary program with an on-demand shell on PTYs inside a workspace

pub mod ansi;
pub mod config;
pub mod error;
pub mod input;
pub mod pty;
pub mod session;
pub mod terminal;
pub mod workspace;

pub use config::MuxConfig;
pub use error::MuxError;
pub use input::{InputAction, InputRouter, KeyBindings, ShortcutAction, ShortcutResolver};
pub use pty::{NativePtySpawner, ProcessHandle, ProcessSpawner, PtyError, TerminalSize};
pub use session::{
    Channel, MuxSettings, OutputSink, ResizeReport, Session, SessionCommand, SessionEvent, SessionManager,
    TeardownReport,
};
pub use workspace::{GitWorktreeDirectory, Workspace, WorkspaceDirectory, WorkspaceError};
