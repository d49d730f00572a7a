// ABOUTME: Off-screen terminal emulation for one output channel
// Feeds PTY output through a VT100 parser so the current screen can be queried

use crate::pty::TerminalSize;
use thiserror::Error;
use tracing::trace;

const DEFAULT_SCROLLBACK_LINES: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerminalError {
    #[error("Invalid terminal size {cols}x{rows}")]
    InvalidSize { cols: u16, rows: u16 },
}

/// Virtual terminal buffer backed by `vt100`
pub struct VirtualTerminal {
    parser: vt100::Parser,
    size: TerminalSize,
}

impl VirtualTerminal {
    pub fn new(size: TerminalSize) -> Self {
        // vt100 cannot represent an empty grid; fall back until the first real resize
        let size = if size.is_empty() { TerminalSize::default() } else { size };
        Self {
            parser: vt100::Parser::new(size.rows, size.cols, DEFAULT_SCROLLBACK_LINES),
            size,
        }
    }

    /// Feed raw PTY output
    pub fn process(&mut self, data: &[u8]) {
        trace!("Virtual terminal processing {} bytes", data.len());
        self.parser.process(data);
    }

    pub fn resize(&mut self, size: TerminalSize) -> Result<(), TerminalError> {
        if size.is_empty() {
            return Err(TerminalError::InvalidSize {
                cols: size.cols,
                rows: size.rows,
            });
        }
        self.parser.set_size(size.rows, size.cols);
        self.size = size;
        Ok(())
    }

    /// Visible screen as plain text
    pub fn contents(&self) -> String {
        self.parser.screen().contents()
    }

    /// Visible screen including the escape sequences needed to redraw it
    pub fn contents_formatted(&self) -> Vec<u8> {
        self.parser.screen().contents_formatted()
    }

    /// Cursor position as (row, col)
    pub fn cursor_position(&self) -> (u16, u16) {
        self.parser.screen().cursor_position()
    }

    pub const fn size(&self) -> TerminalSize {
        self.size
    }
}

impl std::fmt::Debug for VirtualTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualTerminal")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_output_updates_screen() {
        let mut terminal = VirtualTerminal::new(TerminalSize::new(20, 5));
        terminal.process(b"hello\r\nworld");

        let contents = terminal.contents();
        assert!(contents.starts_with("hello\nworld"));
        assert_eq!(terminal.cursor_position(), (1, 5));
    }

    #[test]
    fn test_resize_changes_dimensions() {
        let mut terminal = VirtualTerminal::new(TerminalSize::new(80, 24));
        terminal.resize(TerminalSize::new(100, 30)).unwrap();

        assert_eq!(terminal.size(), TerminalSize::new(100, 30));
        assert_eq!(terminal.parser.screen().size(), (30, 100));
    }

    #[test]
    fn test_resize_rejects_zero_dimensions() {
        let mut terminal = VirtualTerminal::new(TerminalSize::new(80, 24));
        let result = terminal.resize(TerminalSize::new(0, 24));

        assert_eq!(result, Err(TerminalError::InvalidSize { cols: 0, rows: 24 }));
        assert_eq!(terminal.size(), TerminalSize::new(80, 24));
    }

    #[test]
    fn test_new_with_empty_size_falls_back_to_default() {
        let terminal = VirtualTerminal::new(TerminalSize::new(0, 0));
        assert_eq!(terminal.size(), TerminalSize::default());
    }

    #[test]
    fn test_clear_sequence_blanks_screen() {
        let mut terminal = VirtualTerminal::new(TerminalSize::new(20, 5));
        terminal.process(b"stale");
        terminal.process(b"\x1b[2J\x1b[Hfresh");

        assert!(terminal.contents().starts_with("fresh"));
        assert!(!terminal.contents().contains("stale"));
    }
}
