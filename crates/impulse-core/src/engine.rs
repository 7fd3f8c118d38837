//! The engine: per-agent registry, action lifecycle and completion timers.
//!
//! # Locking
//!
//! Every registered agent owns one [`AgentCell`] (its need book, action
//! slot and last tick time) behind its own async mutex. The registry map
//! is only locked long enough to look a cell up, so agents never contend
//! with each other. No code path holds two agent locks at once.
//!
//! # Completion
//!
//! Actions resolve when they complete. A zero-duration action completes
//! inside the `execute` call; anything longer gets a timer from the
//! [`TaskScheduler`]. Interrupting cancels that timer while the agent lock
//! is held, and a timer that fires anyway finds a different (or no)
//! current action id and does nothing.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use impulse_actions::{ActionSlot, RollSource, SeededRoll, resolve};
use impulse_needs::{FrustrationPolicy, NeedBook, NeedError, TickReport, derive_motivations};
use impulse_types::{
    ActionId, ActionStatus, ActionType, AgentId, CharacterAction, EngineEvent, EngineEventKind,
    Motivation, Need, NeedType,
};
use serde_json::json;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::content::ContentGenerator;
use crate::error::EngineError;
use crate::events::{BROADCAST_CAPACITY, EventBus};
use crate::notify::Notifier;
use crate::scheduler::TaskScheduler;
use crate::storage::Storage;

/// Working state of one agent, guarded by its own lock.
#[derive(Debug)]
pub(crate) struct AgentCell {
    pub(crate) book: NeedBook,
    pub(crate) slot: ActionSlot,
    pub(crate) last_tick: DateTime<Utc>,
}

pub(crate) struct Inner<S, G, N> {
    pub(crate) config: EngineConfig,
    pub(crate) storage: S,
    pub(crate) content: G,
    pub(crate) notifier: N,
    clock: Arc<dyn Clock>,
    rng: std::sync::Mutex<Box<dyn RollSource>>,
    agents: RwLock<BTreeMap<AgentId, Arc<Mutex<AgentCell>>>>,
    scheduler: TaskScheduler,
    events: EventBus,
}

/// What happened to an action handed to [`Engine::execute`].
pub(crate) enum Started {
    /// In progress with a completion timer.
    Scheduled(CharacterAction),
    /// Completed synchronously.
    Finished(CharacterAction),
}

/// The needs-driven action engine.
///
/// Cheap to clone; clones share the same registry, timers and event bus.
pub struct Engine<S, G, N> {
    pub(crate) inner: Arc<Inner<S, G, N>>,
}

impl<S, G, N> Clone for Engine<S, G, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Assembles an [`Engine`] with optional clock and probability overrides.
pub struct EngineBuilder<S, G, N> {
    config: EngineConfig,
    storage: S,
    content: G,
    notifier: N,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<Box<dyn RollSource>>,
    event_capacity: usize,
}

impl<S, G, N> EngineBuilder<S, G, N>
where
    S: Storage,
    G: ContentGenerator,
    N: Notifier,
{
    /// Read "now" from `clock` instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Draw resolution rolls from `rng` instead of a [`SeededRoll`].
    #[must_use]
    pub fn roll_source(mut self, rng: Box<dyn RollSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Capacity of the event channel (default: [`BROADCAST_CAPACITY`]).
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Finish building.
    pub fn build(self) -> Engine<S, G, N> {
        let rng: Box<dyn RollSource> = match self.rng {
            Some(rng) => rng,
            None => Box::new(
                self.config
                    .seed
                    .map_or_else(SeededRoll::from_entropy, SeededRoll::new),
            ),
        };
        Engine {
            inner: Arc::new(Inner {
                config: self.config,
                storage: self.storage,
                content: self.content,
                notifier: self.notifier,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                rng: std::sync::Mutex::new(rng),
                agents: RwLock::new(BTreeMap::new()),
                scheduler: TaskScheduler::new(),
                events: EventBus::new(self.event_capacity),
            }),
        }
    }
}

impl<S, G, N> Engine<S, G, N>
where
    S: Storage,
    G: ContentGenerator,
    N: Notifier,
{
    /// Start assembling an engine.
    pub fn builder(
        config: EngineConfig,
        storage: S,
        content: G,
        notifier: N,
    ) -> EngineBuilder<S, G, N> {
        EngineBuilder {
            config,
            storage,
            content,
            notifier,
            clock: None,
            rng: None,
            event_capacity: BROADCAST_CAPACITY,
        }
    }

    /// An engine on the system clock with a seeded (or OS-seeded) RNG.
    pub fn new(config: EngineConfig, storage: S, content: G, notifier: N) -> Self {
        Self::builder(config, storage, content, notifier).build()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The storage collaborator.
    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Current time according to the engine clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Registered agents, in id order.
    pub async fn agents(&self) -> Vec<AgentId> {
        self.inner.agents.read().await.keys().copied().collect()
    }

    /// Completion timers still waiting to fire.
    pub async fn scheduled_count(&self) -> usize {
        self.inner.scheduler.pending().await
    }

    pub(crate) async fn cell(
        &self,
        agent_id: AgentId,
    ) -> Result<Arc<Mutex<AgentCell>>, EngineError> {
        self.inner
            .agents
            .read()
            .await
            .get(&agent_id)
            .cloned()
            .ok_or(EngineError::AgentNotFound { agent_id })
    }

    pub(crate) fn publish(
        &self,
        agent_id: AgentId,
        kind: EngineEventKind,
        action_id: Option<ActionId>,
        at: DateTime<Utc>,
        payload: serde_json::Value,
    ) {
        self.inner
            .events
            .publish(EngineEvent::new(agent_id, kind, action_id, at, payload));
    }

    // -----------------------------------------------------------------------
    // Agents and needs
    // -----------------------------------------------------------------------

    /// Make an agent known to the engine.
    ///
    /// Loads its needs from storage. When storage has none, the configured
    /// defaults are created and saved. Registering twice is a no-op.
    pub async fn register_agent(&self, agent_id: AgentId) -> Result<(), EngineError> {
        if self.inner.agents.read().await.contains_key(&agent_id) {
            return Ok(());
        }
        let now = self.now();
        let stored = self.inner.storage.load_needs(agent_id).await?;
        let book = if stored.is_empty() {
            let book = NeedBook::with_defaults(agent_id, &self.inner.config.needs, now);
            for need in book.iter() {
                self.inner.storage.save_need(need).await?;
            }
            info!(agent_id = %agent_id, needs = book.len(), "agent registered with default needs");
            book
        } else {
            debug!(agent_id = %agent_id, needs = stored.len(), "agent registered from storage");
            NeedBook::from_needs(
                agent_id,
                stored,
                FrustrationPolicy::from(&self.inner.config.needs),
            )
        };

        self.inner
            .agents
            .write()
            .await
            .entry(agent_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(AgentCell {
                    book,
                    slot: ActionSlot::new(agent_id),
                    last_tick: now,
                }))
            });
        Ok(())
    }

    /// Snapshot of an agent's needs.
    pub async fn needs(&self, agent_id: AgentId) -> Result<Vec<Need>, EngineError> {
        let cell = self.cell(agent_id).await?;
        let guard = cell.lock().await;
        Ok(guard.book.snapshot())
    }

    /// Run `f` against an agent's need book under its lock, then save the
    /// book.
    pub async fn update_needs<T, F>(&self, agent_id: AgentId, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut NeedBook, DateTime<Utc>) -> Result<T, NeedError>,
    {
        let cell = self.cell(agent_id).await?;
        let mut guard = cell.lock().await;
        let out = f(&mut guard.book, self.now())?;
        self.persist_needs(&guard.book, None).await;
        Ok(out)
    }

    /// Grow one need by `hours` of its growth rate.
    pub async fn grow_need(
        &self,
        agent_id: AgentId,
        need_type: NeedType,
        hours: f64,
    ) -> Result<(), EngineError> {
        self.update_needs(agent_id, |book, now| book.grow(need_type, hours, now))
            .await
    }

    /// Decay one need by `hours` of its decay rate.
    pub async fn decay_need(
        &self,
        agent_id: AgentId,
        need_type: NeedType,
        hours: f64,
    ) -> Result<(), EngineError> {
        self.update_needs(agent_id, |book, now| book.decay(need_type, hours, now))
            .await
    }

    /// Fully satisfy one need.
    pub async fn reset_need(&self, agent_id: AgentId, need_type: NeedType) -> Result<(), EngineError> {
        self.update_needs(agent_id, |book, now| book.reset(need_type, now))
            .await
    }

    /// Shift one need by `delta`. Returns the delta applied after clamping.
    pub async fn update_need_level(
        &self,
        agent_id: AgentId,
        need_type: NeedType,
        delta: f64,
    ) -> Result<f64, EngineError> {
        self.update_needs(agent_id, |book, now| book.update_level(need_type, delta, now))
            .await
    }

    /// Push `delta` one hop along a need's influence links.
    pub async fn propagate_influence(
        &self,
        agent_id: AgentId,
        need_type: NeedType,
        delta: f64,
    ) -> Result<Vec<(NeedType, f64)>, EngineError> {
        self.update_needs(agent_id, |book, now| {
            book.propagate_influence(need_type, delta, now)
        })
        .await
    }

    /// Suppress one need for `hours`.
    pub async fn block_need(
        &self,
        agent_id: AgentId,
        need_type: NeedType,
        hours: f64,
        reason: &str,
    ) -> Result<(), EngineError> {
        self.update_needs(agent_id, |book, now| book.block_for(need_type, hours, reason, now))
            .await
    }

    /// Lift a block early.
    pub async fn unblock_need(
        &self,
        agent_id: AgentId,
        need_type: NeedType,
    ) -> Result<(), EngineError> {
        self.update_needs(agent_id, |book, now| book.unblock(need_type, now))
            .await
    }

    /// Ranked motivations for an agent. Empty when nothing qualifies.
    pub async fn derive_motivations(
        &self,
        agent_id: AgentId,
    ) -> Result<Vec<Motivation>, EngineError> {
        let cell = self.cell(agent_id).await?;
        let guard = cell.lock().await;
        Ok(derive_motivations(&guard.book, self.now()))
    }

    /// Advance an agent's needs by the time since its previous tick.
    ///
    /// Emits `need_threshold_crossed` for every need that rose past its
    /// threshold.
    #[allow(clippy::cast_precision_loss)] // Millisecond spans are far below f64's exact range.
    pub async fn tick_agent(&self, agent_id: AgentId) -> Result<TickReport, EngineError> {
        let cell = self.cell(agent_id).await?;
        let mut guard = cell.lock().await;
        let now = self.now();
        let elapsed_ms = now
            .signed_duration_since(guard.last_tick)
            .num_milliseconds()
            .max(0);
        let hours = elapsed_ms as f64 / 3_600_000.0;
        let report = guard.book.tick(hours, now);
        guard.last_tick = now;
        self.persist_needs(&guard.book, None).await;

        for &need_type in &report.crossed_threshold {
            let value = guard.book.get(need_type).map(|n| n.current_value).ok();
            info!(agent_id = %agent_id, need = %need_type, value, "need crossed threshold");
            self.publish(
                agent_id,
                EngineEventKind::NeedThresholdCrossed,
                None,
                now,
                json!({ "need": need_type, "value": value }),
            );
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Action lifecycle
    // -----------------------------------------------------------------------

    /// Instantiate a pending action from the catalog.
    pub async fn build_action(
        &self,
        agent_id: AgentId,
        action_type: ActionType,
        addressing: Option<NeedType>,
    ) -> Result<CharacterAction, EngineError> {
        self.cell(agent_id).await?;
        Ok(self.inner.config.actions.build(
            agent_id,
            action_type,
            addressing,
            self.inner.config.needs.resource_need,
            self.now(),
        )?)
    }

    /// Whether `candidate` could start now for `agent_id`.
    pub async fn can_execute(
        &self,
        agent_id: AgentId,
        candidate: &CharacterAction,
    ) -> Result<bool, EngineError> {
        let cell = self.cell(agent_id).await?;
        let guard = cell.lock().await;
        Ok(guard.slot.can_execute(&guard.book, candidate))
    }

    /// Start `action` for `agent_id`.
    ///
    /// Returns the action as it stands after the call: `in_progress` with a
    /// completion timer, or already terminal when its duration is zero.
    /// Rejected with [`ActionError::AlreadyActive`] while another action
    /// holds the agent's slot.
    ///
    /// [`ActionError::AlreadyActive`]: impulse_actions::ActionError::AlreadyActive
    pub async fn execute(
        &self,
        agent_id: AgentId,
        action: CharacterAction,
    ) -> Result<CharacterAction, EngineError> {
        let cell = self.cell(agent_id).await?;
        let started = {
            let mut guard = cell.lock().await;
            self.start_locked(&mut guard, action).await?
        };
        Ok(self.after_start(started).await)
    }

    /// Move an action into `in_progress` while the agent lock is held.
    pub(crate) async fn start_locked(
        &self,
        cell: &mut AgentCell,
        action: CharacterAction,
    ) -> Result<Started, EngineError> {
        let now = self.now();
        let started = cell.slot.begin(action, now)?.clone();
        self.persist_action(&started).await;
        self.publish(
            started.agent_id,
            EngineEventKind::ActionStarted,
            Some(started.id),
            now,
            json!({
                "action_type": started.action_type,
                "duration_ms": started.duration_ms,
                "related_needs": started.related_needs,
            }),
        );

        if started.duration_ms == 0 {
            return Ok(match self.complete_locked(cell, started.id).await? {
                Some(finished) => Started::Finished(finished),
                None => Started::Scheduled(started),
            });
        }

        let engine = self.clone();
        let agent_id = started.agent_id;
        let action_id = started.id;
        self.inner
            .scheduler
            .schedule_after(action_id, started.duration(), async move {
                if let Err(e) = engine.complete_action(agent_id, action_id).await {
                    warn!(
                        agent_id = %agent_id,
                        action_id = %action_id,
                        error = %e,
                        "scheduled completion failed"
                    );
                }
            })
            .await;
        Ok(Started::Scheduled(started))
    }

    /// Work that runs after the agent lock is released.
    pub(crate) async fn after_start(&self, started: Started) -> CharacterAction {
        match started {
            Started::Scheduled(action) => action,
            Started::Finished(action) => {
                self.deliver(&action).await;
                action
            }
        }
    }

    /// Resolve and finish `action_id` if it is still the agent's current
    /// in-progress action. Returns `None` for a stale completion.
    pub async fn complete_action(
        &self,
        agent_id: AgentId,
        action_id: ActionId,
    ) -> Result<Option<CharacterAction>, EngineError> {
        let cell = self.cell(agent_id).await?;
        let finished = {
            let mut guard = cell.lock().await;
            self.complete_locked(&mut guard, action_id).await?
        };
        if let Some(action) = &finished {
            self.deliver(action).await;
        }
        Ok(finished)
    }

    async fn complete_locked(
        &self,
        cell: &mut AgentCell,
        action_id: ActionId,
    ) -> Result<Option<CharacterAction>, EngineError> {
        let agent_id = cell.slot.agent_id();
        let Some(action) = cell
            .slot
            .current()
            .filter(|a| a.id == action_id && a.status == ActionStatus::InProgress)
            .cloned()
        else {
            debug!(agent_id = %agent_id, action_id = %action_id, "stale completion ignored");
            return Ok(None);
        };

        // Effects land on a scratch book so an error leaves the needs as
        // they were before the action.
        let now = self.now();
        let mut book = cell.book.clone();
        let resolved = {
            let mut rng = self.inner.rng.lock().unwrap_or_else(PoisonError::into_inner);
            resolve(
                &mut book,
                &action,
                &self.inner.config.resolution,
                &mut **rng,
                now,
            )
        };
        let resolution = match resolved {
            Ok(resolution) => {
                cell.book = book;
                resolution
            }
            Err(e) => {
                error!(
                    agent_id = %agent_id,
                    action_id = %action_id,
                    error = %e,
                    "resolution failed, interrupting action"
                );
                if let Some(interrupted) = cell.slot.interrupt(now) {
                    self.persist_action(&interrupted).await;
                    self.publish(
                        agent_id,
                        EngineEventKind::ActionInterrupted,
                        Some(action_id),
                        now,
                        json!({
                            "action_type": interrupted.action_type,
                            "reason": e.to_string(),
                        }),
                    );
                }
                return Err(e.into());
            }
        };

        let finished = cell.slot.finish(action_id, resolution, now)?;
        self.persist_needs(&cell.book, Some(&finished)).await;
        self.persist_action(&finished).await;

        let resolution = finished.resolution.as_ref();
        self.publish(
            agent_id,
            EngineEventKind::ActionCompleted,
            Some(action_id),
            now,
            json!({
                "status": finished.status,
                "success": resolution.is_some_and(|r| r.success),
                "effectiveness": resolution.map(|r| r.effectiveness),
                "failure": resolution.and_then(|r| r.failure),
                "actual_reward": resolution.map(|r| &r.actual_reward),
            }),
        );
        Ok(Some(finished))
    }

    /// Interrupt whatever action holds the agent's slot.
    ///
    /// Cancels the completion timer before releasing the agent lock. A
    /// no-op returning `None` when nothing is active.
    pub async fn interrupt(
        &self,
        agent_id: AgentId,
    ) -> Result<Option<CharacterAction>, EngineError> {
        let cell = self.cell(agent_id).await?;
        let mut guard = cell.lock().await;
        let Some(current) = guard.slot.current().map(|a| a.id) else {
            debug!(agent_id = %agent_id, "nothing to interrupt");
            return Ok(None);
        };
        self.inner.scheduler.cancel(current).await;
        let now = self.now();
        let interrupted = guard.slot.interrupt(now);
        if let Some(action) = &interrupted {
            self.persist_action(action).await;
            self.publish(
                agent_id,
                EngineEventKind::ActionInterrupted,
                Some(action.id),
                now,
                json!({ "action_type": action.action_type }),
            );
        }
        Ok(interrupted)
    }

    /// Cancel the completion timer of `action_id`. Idempotent.
    pub async fn cancel_scheduled(&self, action_id: ActionId) -> bool {
        self.inner.scheduler.cancel(action_id).await
    }

    /// The pending or in-progress action of an agent.
    pub async fn get_current_action(
        &self,
        agent_id: AgentId,
    ) -> Result<Option<CharacterAction>, EngineError> {
        let cell = self.cell(agent_id).await?;
        let guard = cell.lock().await;
        Ok(guard.slot.current().cloned())
    }

    /// Whether an action is in progress for the agent.
    pub async fn is_performing_action(&self, agent_id: AgentId) -> Result<bool, EngineError> {
        let cell = self.cell(agent_id).await?;
        let guard = cell.lock().await;
        Ok(guard.slot.is_performing())
    }

    /// Progress of the current action in `[0, 100]`, 0 when idle.
    pub async fn get_progress(&self, agent_id: AgentId) -> Result<f64, EngineError> {
        let cell = self.cell(agent_id).await?;
        let guard = cell.lock().await;
        Ok(guard.slot.progress(self.now()))
    }

    /// Recent terminal actions of an agent, oldest first.
    pub async fn history(&self, agent_id: AgentId) -> Result<Vec<CharacterAction>, EngineError> {
        let cell = self.cell(agent_id).await?;
        let guard = cell.lock().await;
        Ok(guard.slot.history().cloned().collect())
    }

    /// Interrupt every active action and drop all timers. Returns the
    /// number of actions interrupted.
    pub async fn shutdown(&self) -> usize {
        let mut interrupted = 0_usize;
        for agent_id in self.agents().await {
            match self.interrupt(agent_id).await {
                Ok(Some(_)) => interrupted = interrupted.saturating_add(1),
                Ok(None) => {}
                Err(e) => warn!(agent_id = %agent_id, error = %e, "interrupt on shutdown failed"),
            }
        }
        let dropped = self.inner.scheduler.cancel_all().await;
        info!(interrupted, dropped_timers = dropped, "engine shut down");
        interrupted
    }

    // -----------------------------------------------------------------------
    // Write-through and delivery
    // -----------------------------------------------------------------------

    /// Save every need of a book. Failures never undo in-memory effects;
    /// after a resolution they are logged with the computed deltas.
    async fn persist_needs(&self, book: &NeedBook, resolved: Option<&CharacterAction>) {
        for need in book.iter() {
            let Err(e) = self.inner.storage.save_need(need).await else {
                continue;
            };
            match resolved {
                Some(action) => {
                    let resolution = action.resolution.as_ref();
                    error!(
                        agent_id = %need.agent_id,
                        action_id = %action.id,
                        need = %need.need_type,
                        value = need.current_value,
                        frustration = need.frustration_level,
                        deltas = ?resolution.map(|r| &r.actual_reward),
                        side_effects = ?resolution.map(|r| &r.side_effects),
                        error = %e,
                        "failed to persist need after resolution"
                    );
                }
                None => {
                    warn!(
                        agent_id = %need.agent_id,
                        need = %need.need_type,
                        error = %e,
                        "failed to persist need"
                    );
                }
            }
        }
    }

    pub(crate) async fn persist_action(&self, action: &CharacterAction) {
        if let Err(e) = self.inner.storage.save_action(action).await {
            warn!(
                agent_id = %action.agent_id,
                action_id = %action.id,
                status = %action.status,
                error = %e,
                "failed to persist action"
            );
        }
    }

    /// Hand the content of a completed action to the notifier.
    async fn deliver(&self, action: &CharacterAction) {
        if action.status != ActionStatus::Completed {
            return;
        }
        let Some(content) = action.content.as_deref() else {
            return;
        };
        if let Err(e) = self.inner.notifier.notify(action.agent_id, content).await {
            warn!(
                agent_id = %action.agent_id,
                action_id = %action.id,
                error = %e,
                "delivery failed"
            );
        }
    }
}
