//! Supervisor: owns every agent record and its worker loop.
//!
//! Locking:
//! - the registry lock guards insertion and lookup; only `create` writes it
//! - each agent has its own state lock; start/stop/worker updates take it for
//!   writing, snapshots for reading
//! - no lock is held across a poll or the inter-poll delay

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::{AgentId, AgentSlot, AgentSnapshot, Credentials};
use crate::error::SupervisorError;
use crate::poll::PollClient;
use crate::worker::{WorkerContext, WorkerExit, WorkerSettings, run_worker};

/// Result of a start or stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleChange {
    /// The agent changed state.
    Applied,
    /// Start on a running agent; nothing happened.
    AlreadyRunning,
    /// Stop on a stopped agent; nothing happened.
    AlreadyStopped,
}

impl LifecycleChange {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Default)]
struct Registry {
    agents: BTreeMap<AgentId, Arc<AgentSlot>>,
    next_id: u64,
}

/// Owns the agent collection and the lifecycle of their worker loops.
pub struct Supervisor {
    registry: RwLock<Registry>,
    client: Arc<dyn PollClient>,
    settings: WorkerSettings,
}

impl Supervisor {
    /// Create a supervisor whose workers poll through `client`.
    pub fn new(client: Arc<dyn PollClient>, settings: WorkerSettings) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            client,
            settings,
        }
    }

    /// Register a new, stopped agent. Names are unique among all agents.
    pub async fn create(
        &self,
        name: impl Into<String>,
        credentials: Credentials,
    ) -> Result<AgentId, SupervisorError> {
        let name = name.into();
        let mut registry = self.registry.write().await;

        if registry.agents.values().any(|slot| slot.name == name) {
            warn!(name = %name, "Rejected duplicate agent name");
            return Err(SupervisorError::DuplicateName { name });
        }

        registry.next_id += 1;
        let id = AgentId(registry.next_id);
        if !credentials.is_complete() {
            warn!(agent_id = %id, name = %name, "Agent created with incomplete credentials");
        }
        registry
            .agents
            .insert(id, Arc::new(AgentSlot::new(id, name.clone(), credentials)));

        info!(agent_id = %id, name = %name, "Agent created");
        Ok(id)
    }

    /// Start the worker loop of a stopped agent.
    pub async fn start(&self, id: AgentId) -> Result<LifecycleChange, SupervisorError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.write().await;

        if state.status.is_running() {
            warn!(agent_id = %id, name = %slot.name, "Can't start, agent is already running");
            return Ok(LifecycleChange::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        state.begin_run(cancel.clone());

        // The worker needs this lock before it can touch the record, so the
        // handle is always stored before the run can end itself.
        let task = tokio::spawn(run_worker(WorkerContext {
            slot: Arc::clone(&slot),
            client: Arc::clone(&self.client),
            cancel,
            settings: self.settings,
        }));
        if let Some(run) = state.run.as_mut() {
            run.task = Some(task);
        }

        info!(agent_id = %id, name = %slot.name, "Agent started");
        Ok(LifecycleChange::Applied)
    }

    /// Signal the worker loop of a running agent to stop and mark it stopped.
    ///
    /// Does not wait for an in-flight poll; its result is discarded.
    pub async fn stop(&self, id: AgentId) -> Result<LifecycleChange, SupervisorError> {
        let (change, _task) = self.stop_detached(id).await?;
        Ok(change)
    }

    async fn stop_detached(
        &self,
        id: AgentId,
    ) -> Result<(LifecycleChange, Option<JoinHandle<WorkerExit>>), SupervisorError> {
        let slot = self.slot(id).await?;
        let mut state = slot.state.write().await;

        if !state.status.is_running() {
            warn!(agent_id = %id, name = %slot.name, "Can't stop, agent is already stopped");
            return Ok((LifecycleChange::AlreadyStopped, None));
        }

        let task = state.end_run();
        info!(agent_id = %id, name = %slot.name, "Agent stopped");
        Ok((LifecycleChange::Applied, task))
    }

    /// Consistent copy of one agent record.
    pub async fn snapshot(&self, id: AgentId) -> Result<AgentSnapshot, SupervisorError> {
        let slot = self.slot(id).await?;
        Ok(slot.snapshot().await)
    }

    /// Copies of every agent record, ordered by id.
    pub async fn list(&self) -> Vec<AgentSnapshot> {
        let slots: Vec<Arc<AgentSlot>> = self
            .registry
            .read()
            .await
            .agents
            .values()
            .cloned()
            .collect();

        let mut snapshots = Vec::with_capacity(slots.len());
        for slot in slots {
            snapshots.push(slot.snapshot().await);
        }
        snapshots
    }

    /// Look up an agent id by name.
    pub async fn find_by_name(&self, name: &str) -> Option<AgentId> {
        self.registry
            .read()
            .await
            .agents
            .values()
            .find(|slot| slot.name == name)
            .map(|slot| slot.id)
    }

    /// Number of agents currently running.
    pub async fn running_count(&self) -> usize {
        self.list()
            .await
            .iter()
            .filter(|snap| snap.status.is_running())
            .count()
    }

    /// Stop every running agent. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        self.stop_all_detached().await.len()
    }

    /// Stop every running agent and wait up to `grace` for their loops to exit.
    pub async fn shutdown(&self, grace: Duration) {
        let tasks = self.stop_all_detached().await;
        if tasks.is_empty() {
            return;
        }

        let count = tasks.len();
        if tokio::time::timeout(grace, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!(count, "Workers still busy after shutdown grace period");
        } else {
            info!(count, "All workers exited");
        }
    }

    async fn stop_all_detached(&self) -> Vec<JoinHandle<WorkerExit>> {
        let ids: Vec<AgentId> = self.registry.read().await.agents.keys().copied().collect();

        let mut tasks = Vec::new();
        for id in ids {
            let Ok((change, task)) = self.stop_detached(id).await else {
                continue;
            };
            if change.is_applied() {
                tasks.extend(task);
            }
        }
        tasks
    }

    async fn slot(&self, id: AgentId) -> Result<Arc<AgentSlot>, SupervisorError> {
        self.registry
            .read()
            .await
            .agents
            .get(&id)
            .cloned()
            .ok_or(SupervisorError::UnknownId { id })
    }
}
