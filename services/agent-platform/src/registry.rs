//! Agent records and lifecycle state machine
//!
//! `CREATED → RUNNING ↔ PAUSED`, `RUNNING/PAUSED → STOPPED` by the user,
//! `RUNNING → ERROR` automatically after 10 consecutive failed ticks.
//! ERROR is terminal for the runtime; the operator inspects `last_error`
//! and explicitly starts the agent again.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::ids::AgentId;

/// Consecutive failed ticks before an agent trips into ERROR
pub const ERROR_BUDGET: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Error,
}

/// One agent's configuration and bookkeeping
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    pub description: String,
    pub exchange_url: String,
    /// Trader API key; never serialized in responses
    pub api_key: String,
    pub strategy_type: String,
    pub strategy_params: Value,
    /// DSL document source for rule-based strategies
    pub strategy_source: Option<String>,
    pub interval_seconds: f64,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
    pub total_ticks: u64,
    pub total_orders: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("agent not found")]
    NotFound,

    #[error("cannot {action} an agent in state {from:?}")]
    Invalid {
        action: &'static str,
        from: AgentStatus,
    },
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: DashMap<AgentId, AgentRecord>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: AgentRecord) {
        self.agents.insert(record.id, record);
    }

    pub fn get(&self, id: &AgentId) -> Option<AgentRecord> {
        self.agents.get(id).map(|r| r.value().clone())
    }

    pub fn list(&self) -> Vec<AgentRecord> {
        let mut agents: Vec<AgentRecord> =
            self.agents.iter().map(|r| r.value().clone()).collect();
        agents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        agents
    }

    pub fn status(&self, id: &AgentId) -> Option<AgentStatus> {
        self.agents.get(id).map(|r| r.status)
    }

    pub fn remove(&self, id: &AgentId) -> Option<AgentRecord> {
        self.agents.remove(id).map(|(_, r)| r)
    }

    /// Apply a field update from PATCH; caller has verified the agent is
    /// not running.
    pub fn update_with(
        &self,
        id: &AgentId,
        f: impl FnOnce(&mut AgentRecord),
    ) -> Option<AgentRecord> {
        let mut entry = self.agents.get_mut(id)?;
        f(&mut entry);
        Some(entry.clone())
    }

    pub fn mark_running(&self, id: &AgentId, now: DateTime<Utc>) -> Result<AgentRecord, TransitionError> {
        let mut entry = self.agents.get_mut(id).ok_or(TransitionError::NotFound)?;
        match entry.status {
            AgentStatus::Created
            | AgentStatus::Paused
            | AgentStatus::Stopped
            | AgentStatus::Error => {
                entry.status = AgentStatus::Running;
                entry.started_at = Some(now);
                entry.last_error = None;
                entry.consecutive_errors = 0;
                Ok(entry.clone())
            }
            from => Err(TransitionError::Invalid {
                action: "start",
                from,
            }),
        }
    }

    pub fn mark_paused(&self, id: &AgentId) -> Result<AgentRecord, TransitionError> {
        let mut entry = self.agents.get_mut(id).ok_or(TransitionError::NotFound)?;
        match entry.status {
            AgentStatus::Running => {
                entry.status = AgentStatus::Paused;
                Ok(entry.clone())
            }
            from => Err(TransitionError::Invalid {
                action: "pause",
                from,
            }),
        }
    }

    pub fn mark_stopped(&self, id: &AgentId, now: DateTime<Utc>) -> Result<AgentRecord, TransitionError> {
        let mut entry = self.agents.get_mut(id).ok_or(TransitionError::NotFound)?;
        match entry.status {
            AgentStatus::Running | AgentStatus::Paused => {
                entry.status = AgentStatus::Stopped;
                entry.stopped_at = Some(now);
                Ok(entry.clone())
            }
            from => Err(TransitionError::Invalid {
                action: "stop",
                from,
            }),
        }
    }

    /// Record a successful tick
    pub fn record_tick(&self, id: &AgentId, orders_placed: u64) {
        if let Some(mut entry) = self.agents.get_mut(id) {
            entry.total_ticks += 1;
            entry.total_orders += orders_placed;
            entry.consecutive_errors = 0;
        }
    }

    /// Record a failed tick. Returns true when the error budget trips and
    /// the agent transitions to ERROR.
    pub fn record_tick_error(&self, id: &AgentId, error: &str, now: DateTime<Utc>) -> bool {
        let Some(mut entry) = self.agents.get_mut(id) else {
            return true;
        };
        entry.total_ticks += 1;
        entry.consecutive_errors += 1;
        entry.last_error = Some(error.to_string());
        if entry.consecutive_errors >= ERROR_BUDGET && entry.status == AgentStatus::Running {
            entry.status = AgentStatus::Error;
            entry.stopped_at = Some(now);
            tracing::warn!(agent = %entry.name, error, "agent tripped into ERROR");
            return true;
        }
        false
    }
}
