/// 🛡️ STRUCTURAL VALIDATION: boundary checks for tasks and agents
/// DECISION ARCHAEOLOGY: every rule below replaces the weak `hasattr`-style
/// presence check the source performed with a typed, bounds-checked one.
use crate::models::{Agent, Task};
use crate::MeshError;
use html_escape::encode_text;
use regex::Regex;
use std::collections::HashSet;

/// 📏 MAX IDENTIFIER LENGTH: task_type/agent_id/requester_id/capability tags
/// are short opaque strings, not free text; 200 chars is generous headroom
/// over any realistic identifier while still bounding memory per task.
pub const MAX_IDENTIFIER_LENGTH: usize = 200;

/// 🔤 SAFE IDENTIFIER REGEX: identifiers flow into KV keys and log lines, so
/// they're held to a tighter allowlist than free-text payload content ever
/// needs (payload itself stays opaque per the coordinator's validation scope).
static SAFE_IDENTIFIER_REGEX: &str = r"^[a-zA-Z0-9_\-:.]+$";

static DANGEROUS_PATTERNS: &[&str] = &[
    "<script", "javascript:", "data:text/html", "vbscript:", "&&", "||", ";rm", ";del", "`rm",
    "`del", "$(rm", "$(del", "';", "\";", "union select", "drop table", "delete from", "../",
    "..\\", "file://", "/etc/passwd", "/etc/shadow",
];

#[derive(Debug, Clone)]
pub struct IdentifierValidator {
    safe_regex: Regex,
    dangerous_patterns: HashSet<String>,
}

impl IdentifierValidator {
    pub fn new() -> Result<Self, MeshError> {
        let safe_regex = Regex::new(SAFE_IDENTIFIER_REGEX)
            .map_err(|e| MeshError::Validation(format!("invalid identifier regex: {e}")))?;
        let dangerous_patterns = DANGEROUS_PATTERNS.iter().map(|s| s.to_lowercase()).collect();
        Ok(Self {
            safe_regex,
            dangerous_patterns,
        })
    }

    /// Validate and HTML-escape a short identifier (task_type, agent_id,
    /// requester_id, a capability tag). Does not touch the opaque JSON
    /// payload — that remains a schema-enforcement concern for adapters.
    pub fn validate_identifier(&self, field: &str, value: &str) -> Result<String, MeshError> {
        if value.is_empty() || value.len() > MAX_IDENTIFIER_LENGTH {
            return Err(MeshError::Validation(format!(
                "{field} must be non-empty and under {MAX_IDENTIFIER_LENGTH} characters"
            )));
        }

        let lower = value.to_lowercase();
        if self.dangerous_patterns.iter().any(|p| lower.contains(p)) {
            return Err(MeshError::Validation(format!(
                "{field} contains a disallowed pattern"
            )));
        }

        if !self.safe_regex.is_match(value) {
            return Err(MeshError::Validation(format!(
                "{field} contains characters outside the allowed identifier set"
            )));
        }

        Ok(encode_text(value).to_string())
    }

    /// Validate and HTML-escape a human-readable display name (an agent's
    /// `name`). Unlike `validate_identifier`, this does not hold the value to
    /// the machine-identifier allowlist — a "human name" (§3) realistically
    /// contains spaces and punctuation the identifier regex forbids — but it
    /// still enforces the length bound and the dangerous-pattern scan.
    pub fn validate_display_name(&self, field: &str, value: &str) -> Result<String, MeshError> {
        if value.is_empty() || value.len() > MAX_IDENTIFIER_LENGTH {
            return Err(MeshError::Validation(format!(
                "{field} must be non-empty and under {MAX_IDENTIFIER_LENGTH} characters"
            )));
        }

        let lower = value.to_lowercase();
        if self.dangerous_patterns.iter().any(|p| lower.contains(p)) {
            return Err(MeshError::Validation(format!(
                "{field} contains a disallowed pattern"
            )));
        }

        Ok(encode_text(value).to_string())
    }
}

impl Default for IdentifierValidator {
    fn default() -> Self {
        Self::new().expect("identifier regex is a fixed valid pattern")
    }
}

/// Structural validation of a submitted task (§4.1 `submit_task`,
/// §9 Open Question on `_validate_agent`'s weak check). The type system
/// already guarantees field presence and type; this adds the bounds checks
/// the source's `hasattr`-equivalent probe could not express.
pub fn validate_task(validator: &IdentifierValidator, task: &Task) -> Result<(), MeshError> {
    validator.validate_identifier("task_type", &task.task_type)?;
    validator.validate_identifier("requester_id", &task.requester_id)?;

    for capability in &task.capabilities_required {
        validator.validate_identifier("capabilities_required", capability)?;
    }

    if let Some(max_cost) = task.max_cost {
        if max_cost < 0.0 {
            return Err(MeshError::Validation(
                "max_cost must not be negative".to_string(),
            ));
        }
    }

    if let Some(deadline) = task.deadline {
        if deadline < task.created_at {
            return Err(MeshError::Validation(
                "deadline must not precede created_at".to_string(),
            ));
        }
    }

    Ok(())
}

/// Structural validation of a registering agent. Bounds beyond field
/// presence: capacity must be positive, cost/SLA must be sane.
pub fn validate_agent(validator: &IdentifierValidator, agent: &Agent) -> Result<(), MeshError> {
    validator.validate_identifier("agent_id", &agent.agent_id)?;
    validator.validate_display_name("name", &agent.name)?;

    for capability in &agent.capabilities {
        validator.validate_identifier("capabilities", capability)?;
    }

    if agent.max_concurrent_tasks == 0 {
        return Err(MeshError::Validation(
            "max_concurrent_tasks must be greater than zero".to_string(),
        ));
    }

    if agent.cost_per_token < 0.0 {
        return Err(MeshError::Validation(
            "cost_per_token must not be negative".to_string(),
        ));
    }

    if agent.sla_response_seconds == 0 {
        return Err(MeshError::Validation(
            "sla_response_seconds must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMetrics, AgentStatus, Priority, TaskState};
    use chrono::Utc;
    use std::collections::HashSet as Set;

    fn make_task() -> Task {
        Task {
            task_id: uuid::Uuid::new_v4(),
            task_type: "lead_qualification".to_string(),
            priority: Priority::Normal,
            capabilities_required: Set::from(["LeadQualification".to_string()]),
            payload: serde_json::json!({"any": "shape, <script>ignored</script> included"}),
            created_at: Utc::now(),
            deadline: None,
            max_cost: Some(0.5),
            requester_id: "requester-1".to_string(),
            state: TaskState::Pending,
            assigned_agent: None,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    fn make_agent() -> Agent {
        Agent {
            agent_id: "agent-a".to_string(),
            name: "Agent A".to_string(),
            capabilities: Set::from(["LeadQualification".to_string()]),
            status: AgentStatus::Idle,
            max_concurrent_tasks: 5,
            current_tasks: 0,
            priority_tier: 1,
            cost_per_token: 0.001,
            sla_response_seconds: 60,
            endpoint: "http://localhost:9000".to_string(),
            health_check_url: None,
            last_heartbeat: Utc::now(),
            metrics: AgentMetrics::new(Utc::now()),
        }
    }

    #[test]
    fn payload_content_is_not_scanned() {
        let validator = IdentifierValidator::new().unwrap();
        // Dangerous-looking strings inside the opaque payload must not fail
        // validation; only identifiers are scanned.
        assert!(validate_task(&validator, &make_task()).is_ok());
    }

    #[test]
    fn dangerous_task_type_is_rejected() {
        let validator = IdentifierValidator::new().unwrap();
        let mut task = make_task();
        task.task_type = "../etc/passwd".to_string();
        assert!(validate_task(&validator, &task).is_err());
    }

    #[test]
    fn negative_max_cost_is_rejected() {
        let validator = IdentifierValidator::new().unwrap();
        let mut task = make_task();
        task.max_cost = Some(-1.0);
        assert!(validate_task(&validator, &task).is_err());
    }

    #[test]
    fn zero_capacity_agent_is_rejected() {
        let validator = IdentifierValidator::new().unwrap();
        let mut agent = make_agent();
        agent.max_concurrent_tasks = 0;
        assert!(validate_agent(&validator, &agent).is_err());
    }

    #[test]
    fn zero_sla_agent_is_rejected() {
        let validator = IdentifierValidator::new().unwrap();
        let mut agent = make_agent();
        agent.sla_response_seconds = 0;
        assert!(validate_agent(&validator, &agent).is_err());
    }

    #[test]
    fn valid_agent_passes() {
        let validator = IdentifierValidator::new().unwrap();
        assert!(validate_agent(&validator, &make_agent()).is_ok());
    }

    #[test]
    fn human_name_with_spaces_is_accepted() {
        let validator = IdentifierValidator::new().unwrap();
        let mut agent = make_agent();
        agent.name = "Jorge Seller Bot, MCP-Enhanced".to_string();
        assert!(validate_agent(&validator, &agent).is_ok());
    }

    #[test]
    fn dangerous_display_name_is_still_rejected() {
        let validator = IdentifierValidator::new().unwrap();
        let mut agent = make_agent();
        agent.name = "<script>alert(1)</script>".to_string();
        assert!(validate_agent(&validator, &agent).is_err());
    }
}
