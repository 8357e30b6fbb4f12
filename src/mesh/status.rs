//! Status snapshot types returned by `get_mesh_status`, `get_agent_details`,
//! and `health_check` (§4.1).

use crate::models::{Agent, Task};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeshStatus {
    pub total_agents: usize,
    pub idle_agents: usize,
    pub active_agents: usize,
    pub busy_agents: usize,
    pub error_agents: usize,
    pub maintenance_agents: usize,
    pub active_tasks: usize,
    pub completed_today: usize,
    pub failed_today: usize,
    pub current_hour_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDetails {
    pub agent: Agent,
    /// Last N tasks assigned to this agent, most recent last.
    pub recent_tasks: Vec<Task>,
    /// Response-time trend over `recent_tasks`, oldest to newest, seconds.
    pub performance_trend: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub agent_id: String,
    pub healthy: bool,
    pub message: Option<String>,
}
