// ABOUTME: Session entity binding one workspace to a primary process and an optional shell
// All mutable state sits behind one lock so every mutation of a session is serialized

use crate::pty::{ProcessHandle, TerminalSize};
use crate::session::history::HistoryBuffer;
use crate::session::model::{Channel, ProcessStatus, SessionId};
use crate::terminal::VirtualTerminal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Command used to start a session's primary process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl SessionCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

pub(crate) struct ProcessSlot {
    pub(crate) handle: Box<dyn ProcessHandle>,
    pub(crate) status: ProcessStatus,
}

pub(crate) struct ChannelSlot {
    pub(crate) process: Option<ProcessSlot>,
    pub(crate) history: HistoryBuffer,
    pub(crate) screen: VirtualTerminal,
}

impl ChannelSlot {
    fn new(process: Option<ProcessSlot>, budget: usize, size: TerminalSize) -> Self {
        Self {
            process,
            history: HistoryBuffer::new(budget),
            screen: VirtualTerminal::new(size),
        }
    }
}

pub(crate) struct SessionState {
    pub(crate) mode: Channel,
    pub(crate) active: bool,
    /// Set once teardown has killed the processes; no shell may be started after it
    pub(crate) destroyed: bool,
    pub(crate) last_dimensions: TerminalSize,
    pub(crate) channels: [ChannelSlot; 2],
}

impl SessionState {
    pub(crate) fn slot(&self, channel: Channel) -> &ChannelSlot {
        &self.channels[channel.index()]
    }

    pub(crate) fn slot_mut(&mut self, channel: Channel) -> &mut ChannelSlot {
        &mut self.channels[channel.index()]
    }
}

/// One workspace's pair of processes, their output history and focus state.
///
/// Consumers read state and call `write`/`resize`; focus and activation only
/// change through the session manager.
pub struct Session {
    id: SessionId,
    workspace_path: PathBuf,
    command: SessionCommand,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        workspace_path: PathBuf,
        command: SessionCommand,
        primary: Box<dyn ProcessHandle>,
        size: TerminalSize,
        history_budget: usize,
    ) -> Self {
        let primary = ProcessSlot {
            handle: primary,
            status: ProcessStatus::Running,
        };
        Self {
            id: SessionId::new(),
            workspace_path,
            command,
            created_at: Utc::now(),
            state: Mutex::new(SessionState {
                mode: Channel::Primary,
                active: false,
                destroyed: false,
                last_dimensions: size,
                channels: [
                    ChannelSlot::new(Some(primary), history_budget, size),
                    ChannelSlot::new(None, history_budget, size),
                ],
            }),
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn id(&self) -> SessionId {
        self.id
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    pub const fn command(&self) -> &SessionCommand {
        &self.command
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Channel currently receiving input and live output
    pub fn mode(&self) -> Channel {
        self.lock_state().mode
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().active
    }

    pub fn has_secondary(&self) -> bool {
        self.lock_state().slot(Channel::Secondary).process.is_some()
    }

    pub fn last_dimensions(&self) -> TerminalSize {
        self.lock_state().last_dimensions
    }

    /// `None` when the channel's process was never started
    pub fn process_status(&self, channel: Channel) -> Option<ProcessStatus> {
        self.lock_state().slot(channel).process.as_ref().map(|p| p.status)
    }

    pub fn pid(&self, channel: Channel) -> Option<u32> {
        self.lock_state()
            .slot(channel)
            .process
            .as_ref()
            .and_then(|p| p.handle.pid())
    }

    /// Retained output of a channel, oldest chunk first
    pub fn history(&self, channel: Channel) -> Vec<Vec<u8>> {
        self.lock_state().slot(channel).history.snapshot()
    }

    pub fn history_bytes(&self, channel: Channel) -> usize {
        self.lock_state().slot(channel).history.total_bytes()
    }

    /// Plain-text screen of a channel's virtual terminal
    pub fn screen_contents(&self, channel: Channel) -> String {
        self.lock_state().slot(channel).screen.contents()
    }

    pub fn screen_size(&self, channel: Channel) -> TerminalSize {
        self.lock_state().slot(channel).screen.size()
    }

    /// Send input to the focused process.
    ///
    /// Fire-and-forget: a failed write is logged and reported as `false`.
    pub fn write(&self, bytes: &[u8]) -> bool {
        let state = self.lock_state();
        let mode = state.mode;
        let Some(process) = state.slot(mode).process.as_ref() else {
            debug!("Dropping {} input bytes: no {} process in {}", bytes.len(), mode, self.workspace_path.display());
            return false;
        };
        match process.handle.write(bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!("Best-effort write to {} process of {} failed: {}", mode, self.workspace_path.display(), e);
                false
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.lock_state();
        SessionSummary {
            id: self.id,
            workspace_path: self.workspace_path.clone(),
            program: self.command.program.clone(),
            mode: state.mode,
            active: state.active,
            primary: state.slot(Channel::Primary).process.as_ref().map(|p| p.status),
            secondary: state.slot(Channel::Secondary).process.as_ref().map(|p| p.status),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("workspace_path", &self.workspace_path)
            .field("program", &self.command.program)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a session for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub workspace_path: PathBuf,
    pub program: String,
    pub mode: Channel,
    pub active: bool,
    pub primary: Option<ProcessStatus>,
    pub secondary: Option<ProcessStatus>,
    pub created_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn indicator(&self) -> &'static str {
        self.primary.map_or("?", |status| status.indicator())
    }
}
