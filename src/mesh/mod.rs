//! Mesh Coordinator (C6, §4.1): agent registry, task queue, router,
//! executor dispatch, and governance, tied together as a single owned
//! service with dependency-injected ports.

mod agent_registry;
mod governance;
mod hooks;
pub mod monitors;
mod router;
mod status;
mod task_queue;

pub use agent_registry::AgentRegistry;
pub use governance::Governance;
pub use hooks::{MeshHooks, NoopHooks};
pub use status::{AgentDetails, HealthReport, MeshStatus};
pub use task_queue::TaskQueue;

use crate::config::MeshConfig;
use crate::error::{MeshError, Result};
use crate::executor::ExecutorDispatch;
use crate::models::{Agent, AgentStatus, Task, TaskState};
use crate::ports::{Clock, KvStore, ToolInvocationPort};
use crate::validation::{self, IdentifierValidator};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Maximum recent-task history retained per agent for `get_agent_details`'s
/// performance trend (§10.5).
const AGENT_TREND_WINDOW: usize = 10;

pub struct MeshCoordinator {
    registry: AgentRegistry,
    pending: TaskQueue,
    active: RwLock<HashMap<Uuid, Task>>,
    history: RwLock<VecDeque<Task>>,
    agent_recent_tasks: RwLock<HashMap<String, VecDeque<Task>>>,
    config: MeshConfig,
    clock: Arc<dyn Clock>,
    validator: IdentifierValidator,
    governance: Governance,
    executor: ExecutorDispatch,
    tool: Arc<dyn ToolInvocationPort>,
    hooks: Arc<dyn MeshHooks>,
}

impl MeshCoordinator {
    pub fn new(
        config: MeshConfig,
        clock: Arc<dyn Clock>,
        kv: Arc<dyn KvStore>,
        tool: Arc<dyn ToolInvocationPort>,
        skills: Arc<crate::skills::ProgressiveSkillsManager>,
        tracker: Arc<crate::tracker::TokenTracker>,
    ) -> Arc<Self> {
        Self::with_hooks(config, clock, kv, tool, skills, tracker, Arc::new(NoopHooks))
    }

    pub fn with_hooks(
        config: MeshConfig,
        clock: Arc<dyn Clock>,
        kv: Arc<dyn KvStore>,
        tool: Arc<dyn ToolInvocationPort>,
        skills: Arc<crate::skills::ProgressiveSkillsManager>,
        tracker: Arc<crate::tracker::TokenTracker>,
        hooks: Arc<dyn MeshHooks>,
    ) -> Arc<Self> {
        let governance = Governance::new(kv.clone(), clock.clone());
        let executor = ExecutorDispatch::new(skills, tracker, tool.clone());
        Arc::new(Self {
            registry: AgentRegistry::new(),
            pending: TaskQueue::new(10_000),
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            agent_recent_tasks: RwLock::new(HashMap::new()),
            config,
            clock,
            validator: IdentifierValidator::new().expect("identifier regex is a fixed valid pattern"),
            governance,
            executor,
            tool,
            hooks,
        })
    }

    /// Validates the agent, probes its health endpoint, and installs it
    /// (§4.1 `register_agent`).
    pub async fn register_agent(&self, agent: Agent) -> Result<()> {
        validation::validate_agent(&self.validator, &agent)?;
        self.probe_health(&agent).await?;
        self.registry.register(agent).await
    }

    pub async fn deregister_agent(&self, agent_id: &str) -> Result<()> {
        self.registry.deregister(agent_id).await
    }

    async fn probe_health(&self, agent: &Agent) -> Result<()> {
        let Some(url) = &agent.health_check_url else {
            return Ok(());
        };
        let client = reqwest::Client::new();
        let response = client
            .get(url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| MeshError::HealthFailure {
                agent_id: agent.agent_id.clone(),
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(MeshError::HealthFailure {
                agent_id: agent.agent_id.clone(),
                message: format!("health endpoint returned {}", response.status()),
            });
        }
        Ok(())
    }

    /// Validates, enforces quota/budget, enqueues, and spawns routing
    /// (§4.1 `submit_task`). Validation/Quota/Budget errors return
    /// synchronously to the caller (§7 Propagation).
    pub async fn submit_task(self: &Arc<Self>, mut task: Task) -> Result<Uuid> {
        validation::validate_task(&self.validator, &task)?;

        self.governance
            .check_and_record_quota(&task.requester_id, self.config.max_tasks_per_user_per_hour)
            .await?;

        let agents = self.registry.snapshot().await;
        let current_cost = self.governance.current_hour_cost(&agents);
        self.governance
            .check_budget(current_cost, task.max_cost, self.config.max_total_cost_per_hour)?;

        task.state = TaskState::Pending;
        let task_id = task.task_id;
        self.pending.enqueue(task).await?;

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.route_next().await;
        });

        Ok(task_id)
    }

    /// Pops the next pending task and attempts to route it. Never blocks on
    /// execution: a successful assignment spawns execution independently
    /// (§4.1 step 5, §5 "router... must not block on execution").
    async fn route_next(self: Arc<Self>) {
        let Some(mut task) = self.pending.dequeue_next().await else {
            return;
        };

        let agents = self.registry.snapshot().await;
        let now = self.clock.now();

        match router::choose_agent(&agents, &task, &self.config.routing_weights, now) {
            Some(agent_id) => {
                task.assigned_agent = Some(agent_id.clone());
                task.started_at = Some(now);
                task.state = TaskState::Active;
                let task_id = task.task_id;

                if let Some(mut agent) = self.registry.get(&agent_id).await {
                    agent.current_tasks += 1;
                    agent.status = if agent.current_tasks >= agent.max_concurrent_tasks {
                        AgentStatus::Busy
                    } else {
                        AgentStatus::Active
                    };
                    self.registry.update(agent).await;
                }

                self.active.write().await.insert(task_id, task);
                info!(task_id = %task_id, agent_id = %agent_id, "task assigned");

                let coordinator = self.clone();
                tokio::spawn(async move {
                    coordinator.execute_assigned(task_id).await;
                });
            }
            None => {
                warn!(task_id = %task.task_id, "no capable agents available");
                task.state = TaskState::Failed;
                task.error = Some("No capable agents available".to_string());
                task.completed_at = Some(now);
                self.history.write().await.push_back(task);
            }
        }
    }

    async fn execute_assigned(self: Arc<Self>, task_id: Uuid) {
        let Some(task) = self.active.read().await.get(&task_id).cloned() else {
            return;
        };
        let Some(agent_id) = task.assigned_agent.clone() else {
            return;
        };
        let Some(agent) = self.registry.get(&agent_id).await else {
            return;
        };

        let outcome = self.executor.execute(&agent, &task, self.clock.as_ref()).await;
        self.finish_task(task_id, &agent_id, outcome).await;
    }

    async fn finish_task(
        &self,
        task_id: Uuid,
        agent_id: &str,
        outcome: Result<crate::executor::ExecutionOutcome>,
    ) {
        let Some(mut task) = self.active.write().await.remove(&task_id) else {
            return;
        };
        let now = self.clock.now();
        task.completed_at = Some(now);

        let execution_seconds = task
            .execution_time()
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        match outcome {
            Ok(result) => {
                task.state = TaskState::Completed;
                task.result = Some(result.result);
                info!(task_id = %task_id, agent_id, "task completed");
                self.update_agent_metrics(agent_id, true, execution_seconds, result.tokens_used)
                    .await;
            }
            Err(e) => {
                task.state = TaskState::Failed;
                task.error = Some(e.to_string());
                error!(task_id = %task_id, agent_id, error = %e, "task failed");
                self.update_agent_metrics(agent_id, false, execution_seconds, None).await;
            }
        }

        self.record_agent_recent_task(agent_id, task.clone()).await;
        self.history.write().await.push_back(task);
        self.enforce_history_retention().await;
    }

    async fn update_agent_metrics(
        &self,
        agent_id: &str,
        success: bool,
        execution_seconds: f64,
        tokens_used: Option<u64>,
    ) {
        let Some(mut agent) = self.registry.get(agent_id).await else {
            return;
        };

        agent.metrics.total_tasks += 1;
        if success {
            agent.metrics.completed_tasks += 1;
        } else {
            agent.metrics.failed_tasks += 1;
        }
        let n = agent.metrics.total_tasks as f64;
        agent.metrics.average_response_time =
            ((agent.metrics.average_response_time * (n - 1.0)) + execution_seconds) / n;
        if let Some(tokens) = tokens_used {
            agent.metrics.tokens_used += tokens;
            agent.metrics.cost_incurred += tokens as f64 * agent.cost_per_token;
        }
        agent.metrics.last_activity = self.clock.now();

        agent.current_tasks = agent.current_tasks.saturating_sub(1);
        agent.status = if agent.current_tasks == 0 {
            AgentStatus::Idle
        } else {
            AgentStatus::Active
        };

        self.registry.update(agent).await;
    }

    async fn record_agent_recent_task(&self, agent_id: &str, task: Task) {
        let mut recent = self.agent_recent_tasks.write().await;
        let entry = recent.entry(agent_id.to_string()).or_default();
        entry.push_back(task);
        while entry.len() > AGENT_TREND_WINDOW {
            entry.pop_front();
        }
    }

    async fn enforce_history_retention(&self) {
        let now = self.clock.now();
        let cutoff = now - chrono::Duration::hours(self.config.history_retention_hours);
        let mut history = self.history.write().await;
        history.retain(|t| t.completed_at.map(|c| c >= cutoff).unwrap_or(true));
    }

    pub async fn get_mesh_status(&self) -> MeshStatus {
        let agents = self.registry.snapshot().await;
        let history = self.history.read().await;
        let now = self.clock.now();
        let today_start = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();

        let mut status = MeshStatus {
            total_agents: agents.len(),
            active_tasks: self.active.read().await.len(),
            current_hour_cost: self.governance.current_hour_cost(&agents),
            ..Default::default()
        };

        for agent in &agents {
            match agent.status {
                AgentStatus::Idle => status.idle_agents += 1,
                AgentStatus::Active => status.active_agents += 1,
                AgentStatus::Busy => status.busy_agents += 1,
                AgentStatus::Error => status.error_agents += 1,
                AgentStatus::Maintenance => status.maintenance_agents += 1,
            }
        }

        for task in history.iter() {
            if task.completed_at.map(|c| c >= today_start).unwrap_or(false) {
                match task.state {
                    TaskState::Completed => status.completed_today += 1,
                    TaskState::Failed => status.failed_today += 1,
                    _ => {}
                }
            }
        }

        status
    }

    pub async fn get_agent_details(&self, agent_id: &str) -> Option<AgentDetails> {
        let agent = self.registry.get(agent_id).await?;
        let recent_tasks: Vec<Task> = self
            .agent_recent_tasks
            .read()
            .await
            .get(agent_id)
            .map(|deque| deque.iter().cloned().collect())
            .unwrap_or_default();

        let performance_trend = recent_tasks
            .iter()
            .filter_map(|t| t.execution_time())
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .collect();

        Some(AgentDetails {
            agent,
            recent_tasks,
            performance_trend,
        })
    }

    pub async fn health_check(&self) -> Vec<HealthReport> {
        let agents = self.registry.snapshot().await;
        let mut reports = Vec::with_capacity(agents.len());
        for agent in agents {
            let result = self.probe_health(&agent).await;
            reports.push(HealthReport {
                agent_id: agent.agent_id.clone(),
                healthy: result.is_ok(),
                message: result.err().map(|e| e.to_string()),
            });
            if result.is_err() {
                self.mark_agent_error(&agent.agent_id).await;
            }
        }
        reports
    }

    async fn mark_agent_error(&self, agent_id: &str) {
        if let Some(mut agent) = self.registry.get(agent_id).await {
            agent.status = AgentStatus::Error;
            self.registry.update(agent).await;
        }
    }

    /// Cancels every Active task with `reason` as error, forces every agent
    /// to Maintenance, and zeroes in-flight counters (§4.1
    /// `emergency_shutdown`, §8 scenario 4 and invariant).
    pub async fn emergency_shutdown(&self, reason: &str) {
        error!(reason, "emergency shutdown triggered");
        self.hooks.on_emergency_alert(reason).await;
        let now = self.clock.now();

        let mut active = self.active.write().await;
        let mut history = self.history.write().await;
        for (_, mut task) in active.drain() {
            task.state = TaskState::Failed;
            task.error = Some(reason.to_string());
            task.completed_at = Some(now);
            history.push_back(task);
        }
        drop(active);
        drop(history);

        let agents = self.registry.snapshot().await;
        for mut agent in agents {
            agent.status = AgentStatus::Maintenance;
            agent.current_tasks = 0;
            self.registry.update(agent).await;
        }
    }

    pub fn tool_port(&self) -> Arc<dyn ToolInvocationPort> {
        self.tool.clone()
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub(crate) fn governance(&self) -> &Governance {
        &self.governance
    }

    pub(crate) async fn agents_snapshot(&self) -> Vec<Agent> {
        self.registry.snapshot().await
    }

    pub(crate) async fn active_tasks_snapshot(&self) -> Vec<Task> {
        self.active.read().await.values().cloned().collect()
    }

    pub(crate) fn hooks(&self) -> Arc<dyn MeshHooks> {
        self.hooks.clone()
    }

    pub(crate) async fn run_cleanup(&self) {
        self.enforce_history_retention().await;
    }

    /// Average wait between a task's `created_at` and its `started_at` over
    /// currently-active tasks, seconds (§4.1 Performance monitor).
    pub(crate) async fn average_queue_wait_seconds(&self) -> f64 {
        let active = self.active.read().await;
        let waits: Vec<f64> = active
            .values()
            .filter_map(|t| t.started_at.map(|s| (s - t.created_at).num_milliseconds() as f64 / 1000.0))
            .collect();
        if waits.is_empty() {
            0.0
        } else {
            waits.iter().sum::<f64>() / waits.len() as f64
        }
    }

    /// `max(load) - min(load)` across registered agents (§4.1 Performance monitor).
    pub(crate) async fn load_imbalance(&self) -> f64 {
        let agents = self.registry.snapshot().await;
        if agents.is_empty() {
            return 0.0;
        }
        let loads: Vec<f64> = agents.iter().map(Agent::load).collect();
        let max = loads.iter().cloned().fold(f64::MIN, f64::max);
        let min = loads.iter().cloned().fold(f64::MAX, f64::min);
        max - min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock::FrozenClock;
    use crate::ports::kv::InMemoryKv;
    use crate::ports::tool::FakeToolClient;
    use crate::skills::ProgressiveSkillsManager;
    use crate::tracker::TokenTracker;
    use chrono::Utc;
    use std::collections::HashSet;

    fn test_coordinator() -> Arc<MeshCoordinator> {
        let clock: Arc<dyn Clock> = Arc::new(FrozenClock(Utc::now()));
        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());
        let tool: Arc<dyn ToolInvocationPort> = Arc::new(FakeToolClient {
            response: Ok(serde_json::json!({"result": "ok", "tokens_used": 10})),
        });
        let tracker = Arc::new(TokenTracker::new(kv.clone(), clock.clone()));
        let skills = Arc::new(ProgressiveSkillsManager::new(
            std::path::Path::new("/nonexistent/registry.json"),
            tool.clone(),
            tracker.clone(),
        ));
        MeshCoordinator::new(MeshConfig::for_tests(), clock, kv, tool, skills, tracker)
    }

    fn agent(id: &str) -> Agent {
        let now = Utc::now();
        Agent {
            agent_id: id.to_string(),
            name: "mcp_qualifier".to_string(),
            capabilities: HashSet::from(["LeadQualification".to_string()]),
            status: AgentStatus::Idle,
            max_concurrent_tasks: 5,
            current_tasks: 0,
            priority_tier: 1,
            cost_per_token: 0.001,
            sla_response_seconds: 60,
            endpoint: "crm_server:lookup".to_string(),
            health_check_url: None,
            last_heartbeat: now,
            metrics: crate::models::AgentMetrics::new(now),
        }
    }

    #[tokio::test]
    async fn capability_mismatch_routes_to_history_as_no_candidates() {
        let coordinator = test_coordinator();
        let mut mismatched = agent("b1");
        mismatched.capabilities = HashSet::from(["PropertyMatching".to_string()]);
        coordinator.register_agent(mismatched).await.unwrap();

        let task = Task::new(
            "lead_qualification",
            crate::models::Priority::Normal,
            HashSet::from(["LeadQualification".to_string()]),
            serde_json::json!({}),
            "requester-1",
            Utc::now(),
        );
        coordinator.submit_task(task).await.unwrap();

        // Routing runs on a spawned task; drive the executor directly instead
        // of racing the scheduler in this synchronous-style test.
        coordinator.clone().route_next().await;

        let status = coordinator.get_mesh_status().await;
        assert_eq!(status.active_tasks, 0);
    }

    #[tokio::test]
    async fn deregister_unknown_agent_is_not_found() {
        let coordinator = test_coordinator();
        let result = coordinator.deregister_agent("missing").await;
        assert!(matches!(result, Err(MeshError::NotFound(_))));
    }

    #[tokio::test]
    async fn emergency_shutdown_clears_active_and_sets_maintenance() {
        let coordinator = test_coordinator();
        coordinator.register_agent(agent("a1")).await.unwrap();
        coordinator.emergency_shutdown("Cost threshold exceeded: $150").await;

        let agents = coordinator.agents_snapshot().await;
        assert!(agents.iter().all(|a| a.status == AgentStatus::Maintenance));
        assert_eq!(coordinator.active_tasks_snapshot().await.len(), 0);
    }
}
