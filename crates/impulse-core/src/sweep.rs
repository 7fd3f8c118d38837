//! The periodic sweep: evaluate every active agent for a new action.
//!
//! One pass lists the active agents and runs one cycle per agent on a
//! bounded pool. A cycle ticks the agent's needs, picks the first
//! motivation the catalog can act on, stages a pending action, asks the
//! content collaborator for its text and starts it. Cycles are isolated:
//! a failing agent is logged and counted, never allowed to stop the pass.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use impulse_needs::derive_motivations;
use impulse_types::{ActionId, ActionStatus, AgentId};
use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::content::{ContentGenerator, ContentRequest};
use crate::engine::Engine;
use crate::error::{CollaboratorError, EngineError};
use crate::notify::Notifier;
use crate::storage::Storage;

/// How one agent cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// An action was started (or completed synchronously).
    Started(ActionId),
    /// The agent already has a pending or in-progress action.
    Busy,
    /// No motivation cleared its threshold, or none maps to an action.
    NoMotivation,
    /// The chosen action costs more than the resource need holds.
    InsufficientResource,
    /// Content generation failed; the pending action was withdrawn.
    ContentUnavailable,
    /// The pending action was interrupted or promoted while its content
    /// was being generated.
    Withdrawn,
}

/// Counters for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Agents whose cycle ran to an outcome or an error.
    pub agents_evaluated: usize,
    /// Cycles that started an action.
    pub actions_started: usize,
    /// Cycles that ended without starting anything.
    pub skipped: usize,
    /// Cycles that errored or panicked.
    pub failed: usize,
}

/// Run `op`, retrying up to `retries` times while `transient` holds for
/// its error.
async fn retry<T, E, F, Fut>(
    retries: u32,
    what: &'static str,
    transient: fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0_u32;
    loop {
        match op().await {
            Err(e) if attempt < retries && transient(&e) => {
                attempt = attempt.saturating_add(1);
                warn!(what, attempt, error = %e, "transient failure, retrying");
            }
            other => return other,
        }
    }
}

impl<S, G, N> Engine<S, G, N>
where
    S: Storage,
    G: ContentGenerator,
    N: Notifier,
{
    /// Evaluate one agent: tick its needs and start an action if a
    /// motivation calls for one.
    pub async fn run_agent_cycle(&self, agent_id: AgentId) -> Result<CycleOutcome, EngineError> {
        let config = self.config();
        let retries = config.sweep.collaborator_retries;

        retry(retries, "storage", EngineError::is_transient, move || {
            self.register_agent(agent_id)
        })
        .await?;
        self.tick_agent(agent_id).await?;

        let cell = self.cell(agent_id).await?;

        // Stage under the lock so nothing else can claim the slot while
        // content is generated.
        let (action_id, request) = {
            let mut guard = cell.lock().await;
            if guard.slot.is_occupied() {
                debug!(agent_id = %agent_id, "agent busy, skipping");
                return Ok(CycleOutcome::Busy);
            }
            let now = self.now();
            let Some((motivation, action_type)) = derive_motivations(&guard.book, now)
                .into_iter()
                .find_map(|m| config.actions.action_for(m.need_type).map(|t| (m, t)))
            else {
                return Ok(CycleOutcome::NoMotivation);
            };
            let action = config.actions.build(
                agent_id,
                action_type,
                Some(motivation.need_type),
                config.needs.resource_need,
                now,
            )?;
            if !guard.slot.can_execute(&guard.book, &action) {
                debug!(
                    agent_id = %agent_id,
                    action = %action_type,
                    cost = action.resource_cost,
                    "not enough resource for action"
                );
                return Ok(CycleOutcome::InsufficientResource);
            }
            guard.slot.stage(action.clone())?;
            self.persist_action(&action).await;
            info!(
                agent_id = %agent_id,
                action_id = %action.id,
                action = %action_type,
                need = %motivation.need_type,
                critical = motivation.critical,
                "action staged"
            );
            let request = ContentRequest {
                agent_id,
                action_type,
                motivation,
                needs: guard.book.snapshot(),
            };
            (action.id, request)
        };

        let content = &self.inner.content;
        let req = &request;
        let generated = retry(retries, "content", CollaboratorError::is_transient, move || {
            content.generate(req)
        })
        .await;

        let started = {
            let mut guard = cell.lock().await;
            let Some(pending) = guard
                .slot
                .current()
                .filter(|a| a.id == action_id && a.status == ActionStatus::Pending)
                .map(|a| a.id)
            else {
                debug!(
                    agent_id = %agent_id,
                    action_id = %action_id,
                    "staged action no longer pending"
                );
                return Ok(CycleOutcome::Withdrawn);
            };
            match generated {
                Err(e) => {
                    guard.slot.withdraw(pending);
                    warn!(
                        agent_id = %agent_id,
                        action_id = %action_id,
                        error = %e,
                        "content unavailable, skipping cycle"
                    );
                    return Ok(CycleOutcome::ContentUnavailable);
                }
                Ok(text) => {
                    guard.slot.attach_content(pending, text)?;
                    let Some(action) = guard.slot.current().cloned() else {
                        return Ok(CycleOutcome::Withdrawn);
                    };
                    self.start_locked(&mut guard, action).await?
                }
            }
        };
        let action = self.after_start(started).await;
        Ok(CycleOutcome::Started(action.id))
    }

    /// One full pass over the active agents.
    pub async fn sweep_once(&self) -> SweepSummary {
        let config = self.config();
        let agents = match retry(
            config.sweep.collaborator_retries,
            "storage",
            CollaboratorError::is_transient,
            move || self.storage().list_active_agents(),
        )
        .await
        {
            Ok(agents) => agents,
            Err(e) => {
                warn!(error = %e, "could not list active agents, skipping sweep");
                return SweepSummary::default();
            }
        };

        let permits = Arc::new(Semaphore::new(config.sweep.max_concurrent_agents.max(1)));
        let mut cycles = JoinSet::new();
        for agent_id in agents {
            let engine = self.clone();
            let permits = Arc::clone(&permits);
            cycles.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (agent_id, engine.run_agent_cycle(agent_id).await)
            });
        }

        let mut summary = SweepSummary::default();
        while let Some(joined) = cycles.join_next().await {
            summary.agents_evaluated = summary.agents_evaluated.saturating_add(1);
            match joined {
                Ok((_, Ok(CycleOutcome::Started(_)))) => {
                    summary.actions_started = summary.actions_started.saturating_add(1);
                }
                Ok((agent_id, Ok(outcome))) => {
                    debug!(agent_id = %agent_id, ?outcome, "agent cycle skipped");
                    summary.skipped = summary.skipped.saturating_add(1);
                }
                Ok((agent_id, Err(e))) => {
                    warn!(agent_id = %agent_id, error = %e, "agent cycle failed");
                    summary.failed = summary.failed.saturating_add(1);
                }
                Err(e) => {
                    error!(error = %e, "agent cycle aborted");
                    summary.failed = summary.failed.saturating_add(1);
                }
            }
        }

        info!(
            agents = summary.agents_evaluated,
            started = summary.actions_started,
            skipped = summary.skipped,
            failed = summary.failed,
            "sweep complete"
        );
        summary
    }

    /// Spawn the periodic sweep. The first pass runs immediately.
    pub fn start_sweep(&self) -> SweepHandle<S, G, N> {
        let control = Arc::new(SweepControl::default());
        let interval = Duration::from_secs(self.config().sweep.interval_secs.max(1));
        let task = tokio::spawn(sweep_loop(self.clone(), Arc::clone(&control), interval));
        SweepHandle {
            engine: self.clone(),
            control,
            task: Some(task),
        }
    }
}

// ---------------------------------------------------------------------------
// Sweep loop
// ---------------------------------------------------------------------------

/// Shared between the loop task and its handle.
#[derive(Debug, Default)]
struct SweepControl {
    stop_requested: AtomicBool,
    wake: Notify,
    passes: AtomicU64,
}

async fn sweep_loop<S, G, N>(
    engine: Engine<S, G, N>,
    control: Arc<SweepControl>,
    interval: Duration,
) where
    S: Storage,
    G: ContentGenerator,
    N: Notifier,
{
    info!(interval_secs = interval.as_secs(), "sweep loop started");
    while !control.stop_requested.load(Ordering::Acquire) {
        engine.sweep_once().await;
        control.passes.fetch_add(1, Ordering::AcqRel);

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = control.wake.notified() => {}
        }
    }
    info!(passes = control.passes.load(Ordering::Acquire), "sweep loop stopped");
}

/// Control over a running periodic sweep.
///
/// Dropping the handle aborts the loop; [`stop`](Self::stop) lets the
/// current pass finish first.
pub struct SweepHandle<S, G, N> {
    engine: Engine<S, G, N>,
    control: Arc<SweepControl>,
    task: Option<JoinHandle<()>>,
}

impl<S, G, N> SweepHandle<S, G, N>
where
    S: Storage,
    G: ContentGenerator,
    N: Notifier,
{
    /// Run one pass now, outside the loop's schedule.
    pub async fn run_once(&self) -> SweepSummary {
        self.engine.sweep_once().await
    }

    /// Wake the loop so its next pass starts without waiting out the
    /// interval.
    pub fn trigger(&self) {
        self.control.wake.notify_one();
    }

    /// Passes the loop has completed.
    pub fn passes(&self) -> u64 {
        self.control.passes.load(Ordering::Acquire)
    }

    /// Whether the loop task is still alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop after its current pass and wait for it to exit.
    pub async fn stop(mut self) {
        self.control.stop_requested.store(true, Ordering::Release);
        self.control.wake.notify_one();
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            error!(error = %e, "sweep loop ended abnormally");
        }
    }
}

impl<S, G, N> Drop for SweepHandle<S, G, N> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
