// ABOUTME: Native process handles backed by portable-pty
// One blocking reader thread per child feeds output then exit into the child's event channel

use crate::pty::error::PtyError;
use crate::pty::process::{
    ProcessEvent, ProcessHandle, ProcessSpawner, SpawnSpec, SpawnedProcess, TerminalSize,
};
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Spawns children on the host's native PTY system
#[derive(Debug, Clone)]
pub struct NativePtySpawner {
    term: String,
}

impl NativePtySpawner {
    pub fn new(term: impl Into<String>) -> Self {
        Self { term: term.into() }
    }
}

impl Default for NativePtySpawner {
    fn default() -> Self {
        Self::new("xterm-256color")
    }
}

impl ProcessSpawner for NativePtySpawner {
    fn spawn(&self, spec: SpawnSpec) -> Result<SpawnedProcess, PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(to_pty_size(spec.size))
            .map_err(|e| PtyError::PtyCreationFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.cwd(&spec.cwd);
        cmd.env("TERM", &self.term);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed {
                program: spec.program.clone(),
                reason: e.to_string(),
            })?;
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();

        let reader = match pair.master.try_clone_reader() {
            Ok(reader) => reader,
            Err(e) => {
                terminate(child.as_mut());
                return Err(PtyError::PtyCreationFailed(format!("Failed to clone PTY reader: {e}")));
            }
        };
        let writer = match pair.master.take_writer() {
            Ok(writer) => writer,
            Err(e) => {
                terminate(child.as_mut());
                return Err(PtyError::PtyCreationFailed(format!("Failed to take PTY writer: {e}")));
            }
        };

        info!(
            "Spawned `{}` (pid {:?}) in {} at {}x{}",
            spec.program,
            pid,
            spec.cwd.display(),
            spec.size.cols,
            spec.size.rows
        );

        let exited = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();

        spawn_read_loop(reader, child, event_tx, Arc::clone(&exited));
        spawn_write_loop(writer, stdin_rx);

        Ok(SpawnedProcess {
            handle: Box::new(NativePtyHandle {
                master: pair.master,
                killer,
                stdin_tx,
                exited,
                pid,
            }),
            events: event_rx,
        })
    }
}

/// Handle to a child running on a native PTY
pub struct NativePtyHandle {
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    stdin_tx: mpsc::UnboundedSender<Vec<u8>>,
    exited: Arc<AtomicBool>,
    pid: Option<u32>,
}

impl ProcessHandle for NativePtyHandle {
    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        self.stdin_tx
            .send(data.to_vec())
            .map_err(|_| PtyError::WriteFailed("PTY writer is no longer available".to_string()))
    }

    fn resize(&self, size: TerminalSize) -> Result<(), PtyError> {
        if self.exited.load(Ordering::Acquire) {
            return Err(PtyError::ResizeFailed("process has already exited".to_string()));
        }
        self.master
            .resize(to_pty_size(size))
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))
    }

    fn kill(&mut self) -> Result<(), PtyError> {
        self.killer
            .kill()
            .map_err(|e| PtyError::KillFailed(e.to_string()))
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

const fn to_pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn terminate(child: &mut (dyn Child + Send + Sync)) {
    let _ = child.kill();
    let _ = child.wait();
}

// Reads until EOF, then reaps the child so `Exit` is queued after the last output chunk.
fn spawn_read_loop(
    mut reader: Box<dyn Read + Send>,
    mut child: Box<dyn Child + Send + Sync>,
    events: mpsc::UnboundedSender<ProcessEvent>,
    exited: Arc<AtomicBool>,
) {
    std::thread::spawn(move || {
        let mut buffer = [0_u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if events.send(ProcessEvent::Output(buffer[..n].to_vec())).is_err() {
                        debug!("Output receiver dropped, stopping PTY reader");
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("PTY read ended: {}", e);
                    break;
                }
            }
        }

        let code = match child.wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                warn!("Failed to reap PTY child: {}", e);
                None
            }
        };
        exited.store(true, Ordering::Release);
        let _ = events.send(ProcessEvent::Exit(code));
    });
}

fn spawn_write_loop(mut writer: Box<dyn Write + Send>, mut stdin_rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    std::thread::spawn(move || {
        while let Some(input) = stdin_rx.blocking_recv() {
            if input.is_empty() {
                continue;
            }
            if let Err(e) = writer.write_all(&input).and_then(|()| writer.flush()) {
                warn!("PTY write failed, closing writer: {}", e);
                break;
            }
        }
    });
}
