// ABOUTME: Terminal module for off-screen emulation of PTY output
// Each session channel owns one virtual terminal that tracks the child's screen

pub mod virtual_terminal;

pub use virtual_terminal::{TerminalError, VirtualTerminal};
