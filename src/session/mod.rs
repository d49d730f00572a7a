// ABOUTME: Session management for workspace-bound PTY sessions
// Registry, dual-mode focus, bounded history with replay, and resize coordination

pub mod events;
pub mod history;
pub mod manager;
pub mod mode;
pub mod model;
pub mod resize;
#[allow(clippy::module_inception)]
pub mod session;
pub mod sink;

pub use events::{EventBus, EventKind, SessionEvent, Subscription, SubscriptionId};
pub use history::{HistoryBuffer, DEFAULT_HISTORY_BUDGET};
pub use manager::{default_shell, MuxSettings, SessionManager, TeardownReport};
pub use model::{Channel, ProcessStatus, SessionId};
pub use resize::ResizeReport;
pub use session::{Session, SessionCommand, SessionSummary};
pub use sink::{NullSink, OutputSink, StdoutSink};
