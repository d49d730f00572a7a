// ABOUTME: Destination for live session output
// The focused channel of the active session is forwarded here byte-for-byte

use std::io::{self, Write};

/// Where forwarded output, replays and status lines are written
pub trait OutputSink: Send + Sync {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()>;
}

/// Writes straight to the process's stdout, flushing after every chunk
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()
    }
}

/// Discards everything; used when no terminal is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_all(&self, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }
}
