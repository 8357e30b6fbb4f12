use thiserror::Error;

/// Convenience type alias for Results with MeshError
pub type Result<T> = std::result::Result<T, MeshError>;

/// Main error type for the mesh coordination engine.
///
/// One variant per semantic error kind the coordinator, skills manager,
/// and token tracker can raise, plus the transport/config/serialization
/// failures the ambient stack needs to wrap. Callers match on kind, not
/// on message text.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("quota exceeded for requester {requester_id}: {limit} tasks/hour")]
    Quota { requester_id: String, limit: u32 },

    #[error("budget exceeded: current-hour cost {current:.4} + max_cost {requested:.4} > ceiling {ceiling:.4}")]
    Budget {
        current: f64,
        requested: f64,
        ceiling: f64,
    },

    #[error("no capable agents available for task {task_id}")]
    NoCandidates { task_id: String },

    #[error("deadline exceeded for task {task_id}")]
    DeadlineExceeded { task_id: String },

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("tool error: {server}:{tool} - {message}")]
    ToolError {
        server: String,
        tool: String,
        message: String,
    },

    #[error("agent health check failed for {agent_id}: {message}")]
    HealthFailure { agent_id: String, message: String },

    #[error("registry error: {0}")]
    RegistryError(String),

    #[error("fatal invariant violation: {0}")]
    Fatal(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("KV store error: {0}")]
    Kv(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MeshError {
    /// Whether this error should be returned synchronously to the submitter
    /// of `submit_task`, as opposed to being stored on the task and routed
    /// through history.
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            MeshError::Validation(_) | MeshError::Quota { .. } | MeshError::Budget { .. }
        )
    }
}
