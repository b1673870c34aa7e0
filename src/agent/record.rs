//! Agent record: identity, credentials, score and run state of one bot instance.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::worker::WorkerExit;

/// Process-unique agent identifier. Assigned in creation order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AgentStatus {
    /// No worker loop is executing. Initial state and terminal-on-failure state.
    #[default]
    Stopped,
    /// Exactly one worker loop is executing.
    Running,
}

impl AgentStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "Stopped",
            Self::Running => "Running",
        };
        write!(f, "{s}")
    }
}

/// Bearer token + session cookie pair used to authenticate polls.
///
/// Either half may be unset when the definition it came from lacked the
/// marker; the poll client reports that as a transport failure on first use.
#[derive(Debug, Default)]
pub struct Credentials {
    bearer: Option<SecretString>,
    session: Option<SecretString>,
}

impl Credentials {
    pub fn new(bearer: Option<String>, session: Option<String>) -> Self {
        Self {
            bearer: bearer.map(SecretString::from),
            session: session.map(SecretString::from),
        }
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_ref().map(|s| s.expose_secret())
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.expose_secret())
    }

    /// Whether both halves are present.
    pub fn is_complete(&self) -> bool {
        self.bearer.is_some() && self.session.is_some()
    }
}

/// Handle to the worker loop currently bound to an agent.
#[derive(Debug)]
pub(crate) struct ActiveRun {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: Option<JoinHandle<WorkerExit>>,
}

/// Mutable part of an agent record. Only ever touched under the slot's lock.
#[derive(Debug, Default)]
pub(crate) struct AgentState {
    pub(crate) status: AgentStatus,
    pub(crate) score: f64,
    pub(crate) last_payload: Option<serde_json::Value>,
    pub(crate) successful_polls: u64,
    pub(crate) last_polled_at: Option<DateTime<Utc>>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) run: Option<ActiveRun>,
}

impl AgentState {
    /// Bind a new run. Caller has checked the agent is stopped.
    pub(crate) fn begin_run(&mut self, cancel: CancellationToken) {
        self.status = AgentStatus::Running;
        self.started_at = Some(Utc::now());
        self.run = Some(ActiveRun { cancel, task: None });
    }

    /// Record a score-changing poll.
    pub(crate) fn record_progress(&mut self, score: f64, payload: serde_json::Value) {
        self.score = score;
        self.last_payload = Some(payload);
        self.successful_polls += 1;
        self.last_polled_at = Some(Utc::now());
    }

    /// Record a successful poll that did not change the score.
    pub(crate) fn record_unchanged(&mut self) {
        self.last_polled_at = Some(Utc::now());
    }

    /// Transition to stopped, cancelling and detaching the bound run if any.
    pub(crate) fn end_run(&mut self) -> Option<JoinHandle<WorkerExit>> {
        self.status = AgentStatus::Stopped;
        let run = self.run.take()?;
        run.cancel.cancel();
        run.task
    }
}

/// One agent: immutable identity plus its lock-guarded state.
#[derive(Debug)]
pub struct AgentSlot {
    pub id: AgentId,
    pub name: String,
    pub credentials: Credentials,
    pub(crate) state: RwLock<AgentState>,
}

impl AgentSlot {
    pub(crate) fn new(id: AgentId, name: String, credentials: Credentials) -> Self {
        Self {
            id,
            name,
            credentials,
            state: RwLock::new(AgentState::default()),
        }
    }

    /// Take a consistent read-only copy of the record.
    pub async fn snapshot(&self) -> AgentSnapshot {
        let state = self.state.read().await;
        AgentSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: state.status,
            score: state.score,
            last_payload: state.last_payload.clone(),
            successful_polls: state.successful_polls,
            last_polled_at: state.last_polled_at,
            started_at: state.started_at,
            credentials_complete: self.credentials.is_complete(),
        }
    }
}

/// Read-only copy of an agent record, as shown by the console.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub status: AgentStatus,
    pub score: f64,
    pub last_payload: Option<serde_json::Value>,
    pub successful_polls: u64,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub credentials_complete: bool,
}
