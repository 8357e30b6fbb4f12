//! Agent registry: installs, looks up, and removes agents (§4.1
//! `register_agent`/`deregister_agent`).

use crate::error::{MeshError, Result};
use crate::models::Agent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<String, Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, agent: Agent) -> Result<()> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&agent.agent_id) {
            return Err(MeshError::RegistryError(format!(
                "agent {} already registered",
                agent.agent_id
            )));
        }
        info!(agent_id = %agent.agent_id, name = %agent.name, "registered agent");
        agents.insert(agent.agent_id.clone(), agent);
        Ok(())
    }

    /// Removes an agent provided it has no active tasks (§4.1 `deregister_agent`).
    pub async fn deregister(&self, agent_id: &str) -> Result<()> {
        let mut agents = self.agents.write().await;
        match agents.get(agent_id) {
            Some(agent) if agent.current_tasks > 0 => Err(MeshError::Validation(format!(
                "agent {agent_id} has {} active tasks and cannot be deregistered",
                agent.current_tasks
            ))),
            Some(_) => {
                agents.remove(agent_id);
                info!(agent_id, "deregistered agent");
                Ok(())
            }
            None => Err(MeshError::NotFound(format!("agent {agent_id} not found"))),
        }
    }

    pub async fn get(&self, agent_id: &str) -> Option<Agent> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<Agent> {
        self.agents.read().await.values().cloned().collect()
    }

    pub async fn update(&self, agent: Agent) {
        debug!(agent_id = %agent.agent_id, "updated agent state");
        self.agents.write().await.insert(agent.agent_id.clone(), agent);
    }

    pub async fn count(&self) -> usize {
        self.agents.read().await.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMetrics, AgentStatus};
    use chrono::Utc;
    use std::collections::HashSet;

    fn agent(id: &str) -> Agent {
        let now = Utc::now();
        Agent {
            agent_id: id.to_string(),
            name: "jorge_seller".to_string(),
            capabilities: HashSet::new(),
            status: AgentStatus::Idle,
            max_concurrent_tasks: 5,
            current_tasks: 0,
            priority_tier: 1,
            cost_per_token: 0.001,
            sla_response_seconds: 60,
            endpoint: "http://localhost:9000".to_string(),
            health_check_url: None,
            last_heartbeat: now,
            metrics: AgentMetrics::new(now),
        }
    }

    #[tokio::test]
    async fn double_registration_is_rejected() {
        let registry = AgentRegistry::new();
        registry.register(agent("a1")).await.unwrap();
        assert!(registry.register(agent("a1")).await.is_err());
    }

    #[tokio::test]
    async fn deregister_with_active_tasks_is_rejected() {
        let registry = AgentRegistry::new();
        let mut a = agent("a1");
        a.current_tasks = 1;
        registry.register(a).await.unwrap();
        assert!(registry.deregister("a1").await.is_err());
    }

    #[tokio::test]
    async fn deregister_then_get_returns_none() {
        let registry = AgentRegistry::new();
        registry.register(agent("a1")).await.unwrap();
        registry.deregister("a1").await.unwrap();
        assert!(registry.get("a1").await.is_none());
    }
}
