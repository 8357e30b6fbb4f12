//! Agent Executor adapters (C7, §4.4): translate a routed task into a tool
//! call, skill invocation, or HTTP call, dispatched by agent name
//! convention (`jorge_*` → skills, `mcp_*` → tool, else → HTTP).

use crate::error::{MeshError, Result};
use crate::models::{Agent, Task};
use crate::ports::{Clock, ToolInvocationPort};
use crate::skills::ProgressiveSkillsManager;
use crate::tracker::TokenTracker;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ExecutionOutcome {
    pub tokens_used: Option<u64>,
    pub result: Value,
}

#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<ExecutionOutcome>;
}

/// Flattens a JSON payload into a `{{key}}`-substitution context. Only
/// top-level scalar fields are flattened, matching the design note that
/// nested object access is out of scope for skill placeholder substitution.
fn flatten_payload(payload: &Value) -> HashMap<String, String> {
    let mut context = HashMap::new();
    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            context.insert(key.clone(), rendered);
        }
    }
    context
}

/// Dispatches to `ProgressiveSkillsManager.execute_skill`; after completion
/// records a second usage entry tagged `mesh_coordinated` (§4.4), distinct
/// from the skills manager's own `progressive`-tagged internal accounting.
pub struct SkillsAdapter {
    skills: Arc<ProgressiveSkillsManager>,
    tracker: Arc<TokenTracker>,
}

impl SkillsAdapter {
    pub fn new(skills: Arc<ProgressiveSkillsManager>, tracker: Arc<TokenTracker>) -> Self {
        Self { skills, tracker }
    }
}

#[async_trait]
impl AgentExecutor for SkillsAdapter {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<ExecutionOutcome> {
        let context = flatten_payload(&task.payload);
        let task_id = task.task_id.to_string();

        let discovery = self
            .skills
            .discover_skills(&context, &task.task_type, &task_id, &task.requester_id)
            .await;
        let skill_name = discovery
            .skills
            .first()
            .cloned()
            .unwrap_or_else(|| "generic_fallback".to_string());

        let outcome = self
            .skills
            .execute_skill(&skill_name, &context, &task_id, &task.requester_id, "claude-3-haiku")
            .await;

        self.tracker
            .record_usage(
                &task_id,
                outcome.estimated_tokens,
                &task.task_type,
                &task.requester_id,
                "claude-3-haiku",
                "mesh_coordinated",
                Some(&skill_name),
                Some(outcome.confidence),
            )
            .await?;

        if !outcome.ok {
            return Err(MeshError::TransportError(format!(
                "skill {agent_name}/{skill_name} execution failed",
                agent_name = agent.name
            )));
        }

        Ok(ExecutionOutcome {
            tokens_used: Some(outcome.estimated_tokens),
            result: serde_json::json!({
                "skill_used": outcome.skill_used,
                "response": outcome.response,
                "confidence": outcome.confidence,
            }),
        })
    }
}

/// Dispatches through the Tool-Invocation port. The agent's `endpoint` is
/// parsed as `server:tool` (§4.4).
pub struct ToolAdapter {
    tool: Arc<dyn ToolInvocationPort>,
}

impl ToolAdapter {
    pub fn new(tool: Arc<dyn ToolInvocationPort>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl AgentExecutor for ToolAdapter {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<ExecutionOutcome> {
        let (server, tool_name) = agent.endpoint.split_once(':').ok_or_else(|| {
            MeshError::Validation(format!(
                "tool adapter endpoint must be \"server:tool\", got {}",
                agent.endpoint
            ))
        })?;

        let value = self.tool.call_tool(server, tool_name, task.payload.clone()).await?;
        let tokens_used = value.get("tokens_used").and_then(Value::as_u64);
        Ok(ExecutionOutcome {
            tokens_used,
            result: value,
        })
    }
}

/// Generic HTTP adapter: POSTs the task payload to the agent's endpoint and
/// parses a JSON reply. Transport failures are typed as `TransportError`.
pub struct HttpAdapter {
    client: reqwest::Client,
}

impl HttpAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentExecutor for HttpAdapter {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<ExecutionOutcome> {
        let response = self
            .client
            .post(&agent.endpoint)
            .json(&task.payload)
            .send()
            .await
            .map_err(|e| MeshError::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MeshError::TransportError(format!(
                "agent {} endpoint returned status {}",
                agent.agent_id,
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| MeshError::TransportError(e.to_string()))?;
        let tokens_used = value.get("tokens_used").and_then(Value::as_u64);
        Ok(ExecutionOutcome {
            tokens_used,
            result: value,
        })
    }
}

/// Picks an adapter by agent name convention and enforces the task deadline
/// around whichever adapter is chosen (§4.4, §5 "Cancellation & timeouts").
pub struct ExecutorDispatch {
    skills: Arc<SkillsAdapter>,
    tool: Arc<ToolAdapter>,
    http: Arc<HttpAdapter>,
}

impl ExecutorDispatch {
    pub fn new(
        skills: Arc<ProgressiveSkillsManager>,
        tracker: Arc<TokenTracker>,
        tool_port: Arc<dyn ToolInvocationPort>,
    ) -> Self {
        Self {
            skills: Arc::new(SkillsAdapter::new(skills, tracker)),
            tool: Arc::new(ToolAdapter::new(tool_port)),
            http: Arc::new(HttpAdapter::new()),
        }
    }

    fn pick(&self, agent: &Agent) -> Arc<dyn AgentExecutor> {
        if agent.name.starts_with("jorge_") {
            self.skills.clone() as Arc<dyn AgentExecutor>
        } else if agent.name.starts_with("mcp_") {
            self.tool.clone() as Arc<dyn AgentExecutor>
        } else {
            self.http.clone() as Arc<dyn AgentExecutor>
        }
    }

    pub async fn execute(&self, agent: &Agent, task: &Task, clock: &dyn Clock) -> Result<ExecutionOutcome> {
        let adapter = self.pick(agent);
        let task_id = task.task_id.to_string();

        match task.time_remaining(clock.now()) {
            Some(remaining) if remaining > chrono::Duration::zero() => {
                let budget = remaining.to_std().unwrap_or(std::time::Duration::from_secs(0));
                tokio::time::timeout(budget, adapter.execute(agent, task))
                    .await
                    .unwrap_or(Err(MeshError::DeadlineExceeded { task_id }))
            }
            Some(_) => Err(MeshError::DeadlineExceeded { task_id }),
            None => adapter.execute(agent, task).await,
        }
    }
}
