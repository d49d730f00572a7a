// ABOUTME: Session lifecycle management for workspace-bound PTY sessions
// Owns the registry, dispatches process output into history and the sink, and publishes events

use crate::ansi;
use crate::error::MuxError;
use crate::pty::{ProcessEvent, ProcessSpawner, PtyError, SpawnSpec, TerminalSize};
use crate::session::events::{EventBus, EventKind, SessionEvent, Subscription};
use crate::session::history::DEFAULT_HISTORY_BUDGET;
use crate::session::model::{Channel, ProcessStatus, SessionId};
use crate::session::session::{Session, SessionCommand, SessionSummary};
use crate::session::sink::OutputSink;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Tunables for a session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxSettings {
    /// Byte budget of each channel's history buffer
    pub history_budget: usize,
    /// Size used for new sessions until the first resize
    pub initial_size: TerminalSize,
    /// Shell started for the secondary channel
    pub shell: SessionCommand,
    pub primary_label: String,
    pub secondary_label: String,
    /// Display label of the toggle shortcut, shown next to the mode badge
    pub toggle_hint: Option<String>,
}

impl MuxSettings {
    pub fn label(&self, channel: Channel) -> &str {
        match channel {
            Channel::Primary => &self.primary_label,
            Channel::Secondary => &self.secondary_label,
        }
    }
}

impl Default for MuxSettings {
    fn default() -> Self {
        Self {
            history_budget: DEFAULT_HISTORY_BUDGET,
            initial_size: TerminalSize::default(),
            shell: SessionCommand::new(default_shell()),
            primary_label: "Agent".to_string(),
            secondary_label: "Shell".to_string(),
            toggle_hint: None,
        }
    }
}

/// `$SHELL`, falling back to bash
pub fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|shell| !shell.trim().is_empty())
        .unwrap_or_else(|| "/bin/bash".to_string())
}

/// Outcome of tearing a session down. Kill failures are recorded, not raised.
#[derive(Debug)]
pub struct TeardownReport {
    pub session: SessionId,
    pub kill_failures: Vec<(Channel, PtyError)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.kill_failures.is_empty()
    }
}

enum RegistryEntry {
    // Reserved while the primary process is being spawned
    Starting,
    Ready(Arc<Session>),
}

pub(super) struct ManagerInner {
    registry: RwLock<HashMap<PathBuf, RegistryEntry>>,
    pub(super) spawner: Arc<dyn ProcessSpawner>,
    pub(super) sink: Arc<dyn OutputSink>,
    pub(super) events: EventBus,
    pub(super) settings: MuxSettings,
}

/// Registry of sessions keyed by workspace path.
///
/// Cloning is cheap; all clones share the same registry.
#[derive(Clone)]
pub struct SessionManager {
    pub(super) inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new(spawner: Arc<dyn ProcessSpawner>, sink: Arc<dyn OutputSink>, settings: MuxSettings) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: RwLock::new(HashMap::new()),
                spawner,
                sink,
                events: EventBus::new(),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &MuxSettings {
        &self.inner.settings
    }

    /// Spawn the primary process in `workspace_path` and register the session.
    ///
    /// Nothing is registered if the spawn fails. Must be called from within a
    /// Tokio runtime, which runs the output pump.
    pub fn create_session(
        &self,
        workspace_path: impl AsRef<Path>,
        command: SessionCommand,
    ) -> Result<Arc<Session>, MuxError> {
        let path = workspace_path.as_ref().to_path_buf();
        self.inner.reserve(&path)?;

        let size = self.inner.settings.initial_size;
        let spec = SpawnSpec {
            program: command.program.clone(),
            args: command.args.clone(),
            cwd: path.clone(),
            env: command.env.clone(),
            size,
        };

        let spawned = match self.inner.spawner.spawn(spec) {
            Ok(spawned) => spawned,
            Err(source) => {
                self.inner.release(&path);
                error!("Failed to start `{}` in {}: {}", command.program, path.display(), source);
                return Err(MuxError::ProcessSpawnFailure {
                    channel: Channel::Primary,
                    source,
                });
            }
        };

        let session = Arc::new(Session::new(
            path.clone(),
            command,
            spawned.handle,
            size,
            self.inner.settings.history_budget,
        ));
        self.inner.install(&path, Arc::clone(&session));
        spawn_pump(Arc::clone(&self.inner), Arc::clone(&session), Channel::Primary, spawned.events);

        info!(
            "Created session {} for {} running `{}`",
            session.id(),
            path.display(),
            session.command().program
        );
        Ok(session)
    }

    pub fn get_session(&self, workspace_path: impl AsRef<Path>) -> Option<Arc<Session>> {
        match self.inner.read_registry().get(workspace_path.as_ref()) {
            Some(RegistryEntry::Ready(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    pub fn require_session(&self, workspace_path: impl AsRef<Path>) -> Result<Arc<Session>, MuxError> {
        let path = workspace_path.as_ref();
        self.get_session(path)
            .ok_or_else(|| MuxError::SessionNotFound(path.to_path_buf()))
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .inner
            .read_registry()
            .values()
            .filter_map(|entry| match entry {
                RegistryEntry::Ready(session) => Some(session.summary()),
                RegistryEntry::Starting => None,
            })
            .collect();
        summaries.sort_by(|a, b| a.workspace_path.cmp(&b.workspace_path));
        summaries
    }

    /// Kill both processes and unregister the session.
    ///
    /// Returns `None` if no session exists. A failed kill never stops the other
    /// kill or the removal; it is logged and recorded in the report.
    pub fn destroy_session(&self, workspace_path: impl AsRef<Path>) -> Option<TeardownReport> {
        let path = workspace_path.as_ref();
        let session = self.get_session(path)?;

        let mut report = TeardownReport {
            session: session.id(),
            kill_failures: Vec::new(),
        };
        {
            let mut state = session.lock_state();
            state.active = false;
            state.destroyed = true;
            for channel in Channel::ALL {
                let Some(process) = state.slot_mut(channel).process.as_mut() else {
                    continue;
                };
                if let Err(e) = process.handle.kill() {
                    warn!("Best-effort kill of {} process in {} failed: {}", channel, path.display(), e);
                    report.kill_failures.push((channel, e));
                }
            }
        }

        let mut registry = self.inner.write_registry();
        if let Some(RegistryEntry::Ready(registered)) = registry.get(path) {
            if Arc::ptr_eq(registered, &session) {
                registry.remove(path);
            }
        }
        drop(registry);

        info!("Destroyed session {} for {}", session.id(), path.display());
        Some(report)
    }

    /// Destroy every registered session
    pub fn destroy_all(&self) -> Vec<TeardownReport> {
        let paths: Vec<PathBuf> = self.inner.read_registry().keys().cloned().collect();
        paths
            .into_iter()
            .filter_map(|path| self.destroy_session(path))
            .collect()
    }

    /// Give or take terminal focus. No-op for unknown sessions or when nothing changes.
    ///
    /// Activation clears the screen, replays the focused channel's history and
    /// publishes a restore event. Deactivation disables focus reporting; output is
    /// buffered only from then on.
    pub fn set_session_active(&self, workspace_path: impl AsRef<Path>, active: bool) {
        let Some(session) = self.get_session(workspace_path) else {
            return;
        };

        let mut state = session.lock_state();
        if state.active == active {
            return;
        }
        state.active = active;

        if !active {
            self.inner.write_sink(ansi::DISABLE_FOCUS_REPORTING);
            debug!("Session {} deactivated", session.id());
            return;
        }

        let mode = state.mode;
        let chunks = state.slot(mode).history.replay();
        self.inner.write_sink(ansi::CLEAR_SCREEN);
        for chunk in &chunks {
            self.inner.write_sink(chunk);
        }
        self.inner.draw_mode_indicator(mode);

        debug!(
            "Session {} activated, replayed {} {} chunks",
            session.id(),
            chunks.len(),
            mode
        );
        self.inner.events.publish(&SessionEvent::Restore {
            session: session.id(),
            workspace: session.workspace_path().to_path_buf(),
            channel: mode,
            chunks,
        });
    }

    /// Subscribe to every event kind
    pub fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe(&EventKind::ALL)
    }

    pub fn subscribe_to(&self, kinds: &[EventKind]) -> Subscription {
        self.inner.events.subscribe(kinds)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner.events.unsubscribe(subscription.id())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.inner.read_registry().len())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl ManagerInner {
    fn read_registry(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, RegistryEntry>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, HashMap<PathBuf, RegistryEntry>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, path: &Path) -> Result<(), MuxError> {
        match self.write_registry().entry(path.to_path_buf()) {
            Entry::Occupied(_) => Err(MuxError::SessionAlreadyExists(path.to_path_buf())),
            Entry::Vacant(entry) => {
                entry.insert(RegistryEntry::Starting);
                Ok(())
            }
        }
    }

    fn release(&self, path: &Path) {
        let mut registry = self.write_registry();
        if matches!(registry.get(path), Some(RegistryEntry::Starting)) {
            registry.remove(path);
        }
    }

    fn install(&self, path: &Path, session: Arc<Session>) {
        self.write_registry()
            .insert(path.to_path_buf(), RegistryEntry::Ready(session));
    }

    pub(super) fn write_sink(&self, bytes: &[u8]) {
        if let Err(e) = self.sink.write_all(bytes) {
            warn!("Failed to write {} bytes to output sink: {}", bytes.len(), e);
        }
    }

    pub(super) fn draw_mode_indicator(&self, mode: Channel) {
        let hint = self
            .settings
            .toggle_hint
            .as_ref()
            .map(|key| format!("{key}: {}", self.settings.label(mode.other())));
        let badge = ansi::mode_badge(self.settings.label(mode), mode == Channel::Primary, hint.as_deref());
        self.write_sink(&ansi::status_line(&badge));
    }

    fn handle_output(&self, session: &Session, channel: Channel, bytes: Vec<u8>) {
        let mut state = session.lock_state();
        self.events.publish(&SessionEvent::Data {
            session: session.id(),
            workspace: session.workspace_path().to_path_buf(),
            channel,
            bytes: bytes.clone(),
        });

        let forward = state.active && state.mode == channel;
        let slot = state.slot_mut(channel);
        slot.screen.process(&bytes);
        slot.history.append(bytes.clone());
        if forward {
            self.write_sink(&bytes);
        }
    }

    fn handle_exit(&self, session: &Session, channel: Channel, code: Option<u32>) {
        let mut state = session.lock_state();
        if let Some(process) = state.slot_mut(channel).process.as_mut() {
            process.status = ProcessStatus::Exited(code);
        }
        if channel == Channel::Primary && state.active {
            state.active = false;
            self.write_sink(ansi::DISABLE_FOCUS_REPORTING);
        }

        info!(
            "{} process of session {} exited with {:?}",
            channel,
            session.id(),
            code
        );
        self.events.publish(&SessionEvent::Exit {
            session: session.id(),
            workspace: session.workspace_path().to_path_buf(),
            channel,
            code,
        });
    }
}

/// Forward one handle's events, in order, into the dispatcher until it exits
pub(super) fn spawn_pump(
    inner: Arc<ManagerInner>,
    session: Arc<Session>,
    channel: Channel,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ProcessEvent::Output(bytes) => inner.handle_output(&session, channel, bytes),
                ProcessEvent::Exit(code) => {
                    inner.handle_exit(&session, channel, code);
                    break;
                }
            }
        }
        debug!("Event pump for {} channel of session {} finished", channel, session.id());
    });
}
