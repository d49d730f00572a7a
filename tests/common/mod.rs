// ABOUTME: Shared fixtures for integration tests
// A scriptable fake spawner whose handles record input and can emit output or exit on demand

#![allow(dead_code)]

use agents_mux::pty::{ProcessEvent, ProcessHandle, ProcessSpawner, PtyError, SpawnSpec, SpawnedProcess, TerminalSize};
use agents_mux::session::{MuxSettings, OutputSink, SessionCommand, SessionEvent, SessionManager, Subscription};
use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const SHELL: &str = "fake-shell";

#[derive(Debug, Default)]
struct FakeState {
    writes: Vec<Vec<u8>>,
    resizes: Vec<TerminalSize>,
    kills: usize,
    fail_kill: bool,
    fail_resize: bool,
    fail_write: bool,
}

/// One spawned fake child
pub struct FakeProcess {
    pub spec: SpawnSpec,
    pub pid: u32,
    state: Mutex<FakeState>,
    events: mpsc::UnboundedSender<ProcessEvent>,
}

impl FakeProcess {
    /// Pretend the child printed `bytes`
    pub fn emit(&self, bytes: &[u8]) {
        let _ = self.events.send(ProcessEvent::Output(bytes.to_vec()));
    }

    pub fn exit(&self, code: Option<u32>) {
        let _ = self.events.send(ProcessEvent::Exit(code));
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn resizes(&self) -> Vec<TerminalSize> {
        self.state.lock().unwrap().resizes.clone()
    }

    pub fn kills(&self) -> usize {
        self.state.lock().unwrap().kills
    }

    pub fn fail_kill(&self) {
        self.state.lock().unwrap().fail_kill = true;
    }

    pub fn fail_resize(&self) {
        self.state.lock().unwrap().fail_resize = true;
    }

    pub fn fail_write(&self) {
        self.state.lock().unwrap().fail_write = true;
    }
}

struct FakeHandle {
    process: Arc<FakeProcess>,
}

impl ProcessHandle for FakeHandle {
    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut state = self.process.state.lock().unwrap();
        if state.fail_write {
            return Err(PtyError::WriteFailed("fake writer closed".to_string()));
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    fn resize(&self, size: TerminalSize) -> Result<(), PtyError> {
        let mut state = self.process.state.lock().unwrap();
        if state.fail_resize {
            return Err(PtyError::ResizeFailed("process has already exited".to_string()));
        }
        state.resizes.push(size);
        Ok(())
    }

    fn kill(&mut self) -> Result<(), PtyError> {
        let mut state = self.process.state.lock().unwrap();
        state.kills += 1;
        if state.fail_kill {
            return Err(PtyError::KillFailed("no such process".to_string()));
        }
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(self.process.pid)
    }
}

/// Records every spawn; programs can be marked as failing
#[derive(Default)]
pub struct FakeSpawner {
    processes: Mutex<Vec<Arc<FakeProcess>>>,
    failing: Mutex<HashSet<String>>,
    spawn_delay: Option<Duration>,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawns block the calling thread for `delay`, widening race windows
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            spawn_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn fail_program(&self, program: &str) {
        self.failing.lock().unwrap().insert(program.to_string());
    }

    pub fn spawn_count(&self) -> usize {
        self.processes.lock().unwrap().len()
    }

    pub fn spawns_of(&self, program: &str) -> Vec<Arc<FakeProcess>> {
        self.processes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.spec.program == program)
            .cloned()
            .collect()
    }

    /// The only spawn of `program`; panics if there is not exactly one
    pub fn process(&self, program: &str) -> Arc<FakeProcess> {
        let mut spawns = self.spawns_of(program);
        assert_eq!(spawns.len(), 1, "expected exactly one spawn of {program}");
        spawns.remove(0)
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, spec: SpawnSpec) -> Result<SpawnedProcess, PtyError> {
        if let Some(delay) = self.spawn_delay {
            std::thread::sleep(delay);
        }
        if self.failing.lock().unwrap().contains(&spec.program) {
            return Err(PtyError::SpawnFailed {
                program: spec.program,
                reason: "No such file or directory".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut processes = self.processes.lock().unwrap();
        let process = Arc::new(FakeProcess {
            spec,
            pid: 1000 + u32::try_from(processes.len()).unwrap(),
            state: Mutex::new(FakeState::default()),
            events: tx,
        });
        processes.push(Arc::clone(&process));

        Ok(SpawnedProcess {
            handle: Box::new(FakeHandle { process }),
            events: rx,
        })
    }
}

/// Captures everything the manager writes to the terminal
#[derive(Default)]
pub struct RecordingSink {
    bytes: Mutex<Vec<u8>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.lock().unwrap())
    }
}

impl OutputSink for RecordingSink {
    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        self.bytes.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }
}

pub fn settings() -> MuxSettings {
    MuxSettings {
        history_budget: 1024,
        initial_size: TerminalSize::new(80, 24),
        shell: SessionCommand::new(SHELL),
        primary_label: "Agent".to_string(),
        secondary_label: "Shell".to_string(),
        toggle_hint: Some("Ctrl+T".to_string()),
    }
}

pub fn manager() -> (SessionManager, Arc<FakeSpawner>, Arc<RecordingSink>) {
    manager_with(FakeSpawner::new(), settings())
}

pub fn manager_with(
    spawner: Arc<FakeSpawner>,
    settings: MuxSettings,
) -> (SessionManager, Arc<FakeSpawner>, Arc<RecordingSink>) {
    let sink = RecordingSink::new();
    let manager = SessionManager::new(spawner.clone(), sink.clone(), settings);
    (manager, spawner, sink)
}

/// Next event on `subscription`, failing the test after two seconds
pub async fn next_event(subscription: &mut Subscription) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("subscription closed")
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
