//! Worker loop: repeatedly polls the remote score for one agent.
//!
//! Each iteration:
//! 1. Fetch the score (no lock held)
//! 2. Under the agent's write lock, drop the result if the run was cancelled
//!    meanwhile; otherwise apply it or end the run
//! 3. Sleep for the poll interval, waking early on cancellation

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::agent::AgentSlot;
use crate::config::StagnationPolicy;
use crate::error::PollError;
use crate::poll::{PollClient, ScoreSnapshot};

/// Why a worker loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerExit {
    /// Stopped from outside.
    Cancelled,
    /// The poll client failed; the agent was marked stopped.
    PollFailed(PollError),
    /// Two consecutive successful polls reported the same score; the agent was marked stopped.
    StagnantScore { score: f64 },
}

/// Per-fleet settings shared by every worker loop.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub stagnation: StagnationPolicy,
}

/// Everything a single run needs.
pub struct WorkerContext {
    pub slot: Arc<AgentSlot>,
    pub client: Arc<dyn PollClient>,
    pub cancel: CancellationToken,
    pub settings: WorkerSettings,
}

enum Step {
    Continue,
    Exit(WorkerExit),
}

/// Run the loop until cancelled or until a poll ends the run.
pub async fn run_worker(ctx: WorkerContext) -> WorkerExit {
    let slot = &ctx.slot;
    info!(agent_id = %slot.id, name = %slot.name, "Worker started");

    loop {
        if ctx.cancel.is_cancelled() {
            return cancelled(slot);
        }

        let result = ctx.client.fetch(&slot.credentials).await;

        match apply(&ctx, result).await {
            Step::Continue => {}
            Step::Exit(exit) => return exit,
        }

        tokio::select! {
            _ = ctx.cancel.cancelled() => return cancelled(slot),
            _ = tokio::time::sleep(ctx.settings.poll_interval) => {}
        }
    }
}

async fn apply(ctx: &WorkerContext, result: Result<ScoreSnapshot, PollError>) -> Step {
    let slot = &ctx.slot;
    let mut state = slot.state.write().await;

    // Stop flips status and cancels under this same lock, so a cancelled
    // token here means the record is no longer ours to touch.
    if ctx.cancel.is_cancelled() {
        drop(state);
        return Step::Exit(cancelled(slot));
    }

    match result {
        Err(e) => {
            state.end_run();
            drop(state);
            error!(
                agent_id = %slot.id,
                name = %slot.name,
                error = %e,
                "Poll failed, stopping worker"
            );
            Step::Exit(WorkerExit::PollFailed(e))
        }
        Ok(snapshot) if snapshot.score == state.score => match ctx.settings.stagnation {
            StagnationPolicy::Stop => {
                state.end_run();
                drop(state);
                error!(
                    agent_id = %slot.id,
                    name = %slot.name,
                    score = snapshot.score,
                    payload = %snapshot.payload,
                    "Score unchanged since last poll, stopping worker"
                );
                Step::Exit(WorkerExit::StagnantScore {
                    score: snapshot.score,
                })
            }
            StagnationPolicy::Ignore => {
                state.record_unchanged();
                debug!(agent_id = %slot.id, score = snapshot.score, "Score unchanged");
                Step::Continue
            }
        },
        Ok(snapshot) => {
            let score = snapshot.score;
            state.record_progress(score, snapshot.payload);
            drop(state);
            debug!(agent_id = %slot.id, name = %slot.name, score, "Score updated");
            Step::Continue
        }
    }
}

fn cancelled(slot: &AgentSlot) -> WorkerExit {
    info!(agent_id = %slot.id, name = %slot.name, "Worker cancelled");
    WorkerExit::Cancelled
}
