// ABOUTME: Focus switch between a session's primary program and its shell
// The shell is spawned lazily on first switch and never more than once per session

use crate::ansi;
use crate::error::MuxError;
use crate::pty::SpawnSpec;
use crate::session::manager::{spawn_pump, SessionManager};
use crate::session::model::{Channel, ProcessStatus};
use crate::session::events::SessionEvent;
use crate::session::session::{ProcessSlot, Session};
use std::sync::Arc;
use tracing::{debug, error, info};

impl SessionManager {
    /// Move focus to the other channel and return the newly focused one.
    ///
    /// The first switch to the secondary channel spawns the shell in the
    /// session's workspace at the session's last known size. The check and the
    /// spawn happen under the session lock, so concurrent toggles cannot start a
    /// second shell. If the spawn fails, focus stays on the primary channel.
    /// A destroyed session is reported as not found and nothing is spawned.
    pub fn toggle_mode(&self, session: &Arc<Session>) -> Result<Channel, MuxError> {
        let mut state = session.lock_state();
        if state.destroyed {
            return Err(MuxError::SessionNotFound(session.workspace_path().to_path_buf()));
        }
        let next = state.mode.other();

        if next == Channel::Secondary && state.slot(Channel::Secondary).process.is_none() {
            let shell = &self.inner.settings.shell;
            let spec = SpawnSpec {
                program: shell.program.clone(),
                args: shell.args.clone(),
                cwd: session.workspace_path().to_path_buf(),
                env: shell.env.clone(),
                size: state.last_dimensions,
            };
            let spawned = self.inner.spawner.spawn(spec).map_err(|source| {
                error!(
                    "Failed to start shell `{}` in {}: {}",
                    shell.program,
                    session.workspace_path().display(),
                    source
                );
                MuxError::ProcessSpawnFailure {
                    channel: Channel::Secondary,
                    source,
                }
            })?;

            state.slot_mut(Channel::Secondary).process = Some(ProcessSlot {
                handle: spawned.handle,
                status: ProcessStatus::Running,
            });
            spawn_pump(
                Arc::clone(&self.inner),
                Arc::clone(session),
                Channel::Secondary,
                spawned.events,
            );
            info!(
                "Started shell `{}` for session {}",
                shell.program,
                session.id()
            );
        }

        state.mode = next;

        let size = state.last_dimensions;
        if let Err(e) = state.slot_mut(next).screen.resize(size) {
            debug!("Could not bring {} screen to {:?}: {}", next, size, e);
        }

        if state.active {
            self.inner.write_sink(ansi::CLEAR_SCREEN);
            let screen = state.slot(next).screen.contents_formatted();
            self.inner.write_sink(&screen);
            self.inner.draw_mode_indicator(next);
        }

        debug!("Session {} switched to {}", session.id(), next);
        self.inner.events.publish(&SessionEvent::ModeChanged {
            session: session.id(),
            workspace: session.workspace_path().to_path_buf(),
            channel: next,
            label: self.inner.settings.label(next).to_string(),
        });
        Ok(next)
    }
}
