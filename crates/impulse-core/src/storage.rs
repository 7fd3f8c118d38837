//! Storage collaborator trait and in-memory implementation.
//!
//! The engine never assumes storage is synchronous or infallible: every
//! call returns a future and a [`CollaboratorError`]. The engine keeps its
//! own working copy of each agent's needs and action slot, and writes
//! through to storage after every mutation.

use std::collections::BTreeMap;
use std::future::Future;

use impulse_types::{ActionId, AgentId, CharacterAction, Need, NeedType};
use tokio::sync::RwLock;

use crate::error::CollaboratorError;

/// Persistence for needs, actions and the set of active agents.
pub trait Storage: Send + Sync + 'static {
    /// All needs stored for `agent_id`. Empty when the agent has none yet.
    fn load_needs(
        &self,
        agent_id: AgentId,
    ) -> impl Future<Output = Result<Vec<Need>, CollaboratorError>> + Send;

    /// Insert or replace one need, keyed by `(agent_id, need_type)`.
    fn save_need(&self, need: &Need) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    /// One action by id.
    fn load_action(
        &self,
        id: ActionId,
    ) -> impl Future<Output = Result<CharacterAction, CollaboratorError>> + Send;

    /// Insert or replace one action, keyed by id.
    fn save_action(
        &self,
        action: &CharacterAction,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    /// Agents the periodic sweep should evaluate.
    fn list_active_agents(
        &self,
    ) -> impl Future<Output = Result<Vec<AgentId>, CollaboratorError>> + Send;
}

/// Process-local storage backed by ordered maps.
///
/// An agent becomes active the first time one of its needs is saved and
/// stays active until [`deactivate_agent`](Self::deactivate_agent). Later
/// saves do not reactivate it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    needs: RwLock<BTreeMap<(AgentId, NeedType), Need>>,
    actions: RwLock<BTreeMap<ActionId, CharacterAction>>,
    agents: RwLock<BTreeMap<AgentId, bool>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an agent active without storing any needs for it.
    pub async fn add_agent(&self, agent_id: AgentId) {
        self.agents.write().await.insert(agent_id, true);
    }

    /// Exclude an agent from future sweeps. Its records are kept.
    pub async fn deactivate_agent(&self, agent_id: AgentId) {
        self.agents.write().await.insert(agent_id, false);
    }

    /// Number of stored actions.
    pub async fn action_count(&self) -> usize {
        self.actions.read().await.len()
    }
}

impl Storage for MemoryStorage {
    async fn load_needs(&self, agent_id: AgentId) -> Result<Vec<Need>, CollaboratorError> {
        let needs = self.needs.read().await;
        Ok(needs
            .iter()
            .filter(|((owner, _), _)| *owner == agent_id)
            .map(|(_, n)| n.clone())
            .collect())
    }

    async fn save_need(&self, need: &Need) -> Result<(), CollaboratorError> {
        self.needs
            .write()
            .await
            .insert((need.agent_id, need.need_type), need.clone());
        self.agents.write().await.entry(need.agent_id).or_insert(true);
        Ok(())
    }

    async fn load_action(&self, id: ActionId) -> Result<CharacterAction, CollaboratorError> {
        self.actions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound {
                what: format!("action {id}"),
            })
    }

    async fn save_action(&self, action: &CharacterAction) -> Result<(), CollaboratorError> {
        self.actions.write().await.insert(action.id, action.clone());
        Ok(())
    }

    async fn list_active_agents(&self) -> Result<Vec<AgentId>, CollaboratorError> {
        Ok(self
            .agents
            .read()
            .await
            .iter()
            .filter(|(_, active)| **active)
            .map(|(id, _)| *id)
            .collect())
    }
}
