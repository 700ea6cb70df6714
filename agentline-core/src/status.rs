// ABOUTME: In-memory register holding the agent's availability
// ABOUTME: Only "online" and "offline" are accepted; anything else leaves the value untouched

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

/// Agent availability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    #[default]
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status candidate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status '{0}'. Must be 'online' or 'offline'")]
pub struct InvalidStatus(pub String);

impl FromStr for AgentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(AgentStatus::Online),
            "offline" => Ok(AgentStatus::Offline),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: AgentStatus,
    pub current: AgentStatus,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Single-value status store shared by the HTTP handlers.
///
/// Concurrent writers resolve as last-write-wins under the lock.
#[derive(Debug, Default)]
pub struct StatusRegister {
    current: RwLock<AgentStatus>,
}

impl StatusRegister {
    /// New register, starting `offline`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> AgentStatus {
        // The guarded value is Copy, so a poisoned lock still holds a whole value
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate `candidate` and store it.
    pub fn set(&self, candidate: &str) -> Result<StatusTransition, InvalidStatus> {
        let next: AgentStatus = candidate.parse()?;

        let previous = {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, next)
        };

        let transition = StatusTransition {
            previous,
            current: next,
        };
        tracing::info!(
            previous = %transition.previous,
            current = %transition.current,
            changed = transition.changed(),
            "Agent status updated"
        );
        crate::metrics::record_status_change(next.as_str());

        Ok(transition)
    }
}
