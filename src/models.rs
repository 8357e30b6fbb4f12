use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Priority of a task. Ordering matches routing preference: `Emergency` tasks
/// are eligible for assignment ahead of everything queued before them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
    Emergency,
}

impl Priority {
    /// Score multiplier applied by the router (§4.1).
    pub fn score_multiplier(self) -> f64 {
        match self {
            Priority::Emergency => 1.5,
            Priority::Critical => 1.2,
            _ => 1.0,
        }
    }
}

/// Operational status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Idle,
    Active,
    Busy,
    Error,
    Maintenance,
}

/// A worker agent registered with the mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub name: String,
    pub capabilities: HashSet<String>,
    pub status: AgentStatus,
    pub max_concurrent_tasks: u32,
    pub current_tasks: u32,
    pub priority_tier: u8,
    pub cost_per_token: f64,
    pub sla_response_seconds: u64,
    pub endpoint: String,
    pub health_check_url: Option<String>,
    pub last_heartbeat: DateTime<Utc>,
    pub metrics: AgentMetrics,
}

/// Running performance counters for an agent, updated on every task
/// completion (§4.1 "Metrics update on completion").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub average_response_time: f64,
    pub tokens_used: u64,
    pub cost_incurred: f64,
    pub last_activity: DateTime<Utc>,
}

impl AgentMetrics {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            average_response_time: 0.0,
            tokens_used: 0,
            cost_incurred: 0.0,
            last_activity: now,
        }
    }

    /// `success_rate/100` form used directly by the scorer; defaults to 1.0
    /// (100%) at zero tasks so a fresh agent is not penalized before it has
    /// a track record.
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            1.0
        } else {
            self.completed_tasks as f64 / self.total_tasks as f64
        }
    }
}

impl Agent {
    /// `load = current/cap`.
    pub fn load(&self) -> f64 {
        if self.max_concurrent_tasks == 0 {
            1.0
        } else {
            self.current_tasks as f64 / self.max_concurrent_tasks as f64
        }
    }

    /// `is_available = status=Idle ∧ current<cap ∧ (now - last_heartbeat) ≤ 2 min`.
    ///
    /// Deliberately does not consider `Active` available for *new* routing
    /// even though an Active agent has spare capacity below cap; the system
    /// this behavior is distilled from only offers freshly-idle agents to
    /// the router, relying on the next routing pass to pick up an agent that
    /// drops back to Idle between tasks.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status == AgentStatus::Idle
            && self.current_tasks < self.max_concurrent_tasks
            && (now - self.last_heartbeat) <= chrono::Duration::minutes(2)
    }
}

/// Execution state of a task as it moves through the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Active,
    Completed,
    Failed,
}

/// A unit of work submitted to the mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub task_type: String,
    pub priority: Priority,
    pub capabilities_required: HashSet<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub max_cost: Option<f64>,
    pub requester_id: String,
    pub state: TaskState,
    pub assigned_agent: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(
        task_type: impl Into<String>,
        priority: Priority,
        capabilities_required: HashSet<String>,
        payload: serde_json::Value,
        requester_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            task_type: task_type.into(),
            priority,
            capabilities_required,
            payload,
            created_at: now,
            deadline: None,
            max_cost: None,
            requester_id: requester_id.into(),
            state: TaskState::Pending,
            assigned_agent: None,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Time remaining until `deadline`, or `None` if there is no deadline.
    /// Negative durations indicate the deadline has already passed.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.deadline.map(|d| d - now)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.time_remaining(now)
            .is_some_and(|d| d < chrono::Duration::zero())
    }

    pub fn execution_time(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Tier of a skill artifact within the progressive skills registry (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    Core,
    Extended,
    Fallback,
    Discovery,
}

/// Metadata describing a single entry in the skill registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub purpose: String,
    pub estimated_tokens: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub priority: u8,
}

fn default_confidence_threshold() -> f64 {
    0.7
}

/// A usage record produced by either a discovery call or a skill execution,
/// consumed by the Token/Cost Tracker (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub task_id: String,
    pub tokens: u64,
    pub task_type: String,
    pub user_id: String,
    pub model: String,
    pub approach: String,
    pub skill_name: Option<String>,
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub cost: f64,
}
