// ABOUTME: Terminal-dimension propagation to every process and the focused virtual terminal
// Each resize attempt is independent; failures are logged and reported, never raised

use crate::pty::{PtyError, TerminalSize};
use crate::session::manager::SessionManager;
use crate::session::model::Channel;
use crate::session::session::Session;
use crate::terminal::TerminalError;
use std::path::Path;
use tracing::{debug, warn};

/// What went wrong during a best-effort resize
#[derive(Debug, Default)]
pub struct ResizeReport {
    pub size: TerminalSize,
    pub process_failures: Vec<(Channel, PtyError)>,
    pub screen_failure: Option<TerminalError>,
}

impl ResizeReport {
    pub fn is_clean(&self) -> bool {
        self.process_failures.is_empty() && self.screen_failure.is_none()
    }
}

impl Session {
    /// Record the new size and push it to the primary process, the shell (if
    /// started) and the focused channel's virtual terminal.
    ///
    /// A process that has already exited makes its own attempt fail and nothing else.
    pub fn resize(&self, cols: u16, rows: u16) -> ResizeReport {
        let size = TerminalSize::new(cols, rows);
        let mut report = ResizeReport {
            size,
            ..ResizeReport::default()
        };

        let mut state = self.lock_state();
        state.last_dimensions = size;

        for channel in Channel::ALL {
            let Some(process) = state.slot(channel).process.as_ref() else {
                continue;
            };
            if let Err(e) = process.handle.resize(size) {
                warn!(
                    "Best-effort resize of {} process in {} to {}x{} failed: {}",
                    channel,
                    self.workspace_path().display(),
                    cols,
                    rows,
                    e
                );
                report.process_failures.push((channel, e));
            }
        }

        let mode = state.mode;
        if let Err(e) = state.slot_mut(mode).screen.resize(size) {
            warn!("Best-effort resize of {} screen failed: {}", mode, e);
            report.screen_failure = Some(e);
        }

        debug!("Session {} resized to {}x{}", self.id(), cols, rows);
        report
    }
}

impl SessionManager {
    /// Resize the session registered for `workspace_path`; `None` if there is none
    pub fn resize_session(&self, workspace_path: impl AsRef<Path>, cols: u16, rows: u16) -> Option<ResizeReport> {
        self.get_session(workspace_path).map(|session| session.resize(cols, rows))
    }
}
