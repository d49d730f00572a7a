// ABOUTME: Core data types shared by the session multiplexer
// Channels, session identifiers and per-channel process status

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, never reused session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which of a session's two processes is meant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The long-lived program the session was created for
    #[default]
    Primary,
    /// The on-demand shell
    Secondary,
}

impl Channel {
    pub const ALL: [Self; 2] = [Self::Primary, Self::Secondary];

    pub const fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the process behind one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Running,
    Exited(Option<u32>),
}

impl ProcessStatus {
    pub const fn indicator(&self) -> &'static str {
        match self {
            Self::Running => "●",
            Self::Exited(_) => "✗",
        }
    }

    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}
