#[cfg(test)]
mod tests;

use crate::constants::*;
use crate::{MeshError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Top-level configuration, loaded once at startup (§6 "Mesh-config JSON
/// mirrors the above as the authoritative deployment-time configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mesh: MeshConfig,
    pub api: ApiConfig,
}

/// Governance, routing, and storage configuration for the coordinator.
/// Every field has a sane default so the service boots with zero
/// environment configuration, matching the source deployment's story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    pub max_total_cost_per_hour: f64,
    pub emergency_shutdown_threshold: f64,
    pub max_tasks_per_user_per_hour: u32,
    pub health_check_interval_secs: u64,
    pub cost_monitor_interval_secs: u64,
    pub performance_monitor_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub history_retention_hours: i64,
    pub routing_weights: RoutingWeights,
    pub skills_registry_path: String,
    /// `None` selects the in-memory KV adapter; `Some(url)` connects to Redis.
    pub kv_url: Option<String>,
    /// MCP/tool server name → base URL, consumed by the HTTP tool-invocation
    /// adapter (§6 "Tool-invocation port").
    pub tool_servers: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingWeights {
    pub performance: f64,
    pub availability: f64,
    pub cost: f64,
    pub response_time: f64,
}

impl Default for RoutingWeights {
    fn default() -> Self {
        Self {
            performance: ROUTING_WEIGHT_PERFORMANCE,
            availability: ROUTING_WEIGHT_AVAILABILITY,
            cost: ROUTING_WEIGHT_COST,
            response_time: ROUTING_WEIGHT_RESPONSE_TIME,
        }
    }
}

/// Configuration for the (optional, thin) task-submission HTTP binding.
/// The HTTP/WebSocket edge itself is an external collaborator; this struct
/// only configures the narrow `submit_task` port the edge calls into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub enable_auth: bool,
    pub allowed_origins: Vec<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse `TOOL_SERVERS` into the MCP/tool server name → base URL map (§6).
/// Format is a comma-separated list of `name=url` pairs, e.g.
/// `TOOL_SERVERS=jorge_crm=http://localhost:8100,mcp_search=http://localhost:8200`.
/// Malformed entries (missing `=`, blank name or url) are logged and skipped
/// rather than failing the whole boot.
fn parse_tool_servers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|pair| match pair.split_once('=') {
            Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                Some((name.trim().to_string(), url.trim().to_string()))
            }
            _ => {
                tracing::warn!("Ignoring malformed TOOL_SERVERS entry: {pair:?}");
                None
            }
        })
        .collect()
}

impl Config {
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded .env file from: {:?}", path),
            Err(e) => tracing::debug!("No .env file loaded: {}", e),
        }

        let mesh = MeshConfig {
            max_total_cost_per_hour: env_parse(
                "MAX_TOTAL_COST_PER_HOUR",
                DEFAULT_MAX_TOTAL_COST_PER_HOUR,
            ),
            emergency_shutdown_threshold: env_parse(
                "EMERGENCY_SHUTDOWN_THRESHOLD",
                DEFAULT_EMERGENCY_SHUTDOWN_THRESHOLD,
            ),
            max_tasks_per_user_per_hour: env_parse(
                "MAX_TASKS_PER_USER_PER_HOUR",
                DEFAULT_MAX_TASKS_PER_USER_PER_HOUR,
            ),
            health_check_interval_secs: env_parse(
                "HEALTH_CHECK_INTERVAL_SECS",
                HEALTH_CHECK_INTERVAL_SECS,
            ),
            cost_monitor_interval_secs: env_parse(
                "COST_MONITOR_INTERVAL_SECS",
                COST_MONITOR_INTERVAL_SECS,
            ),
            performance_monitor_interval_secs: env_parse(
                "PERFORMANCE_MONITOR_INTERVAL_SECS",
                PERFORMANCE_MONITOR_INTERVAL_SECS,
            ),
            cleanup_interval_secs: env_parse("CLEANUP_INTERVAL_SECS", CLEANUP_INTERVAL_SECS),
            history_retention_hours: env_parse(
                "HISTORY_RETENTION_HOURS",
                HISTORY_RETENTION_HOURS,
            ),
            routing_weights: RoutingWeights::default(),
            skills_registry_path: env_or("SKILLS_REGISTRY_PATH", "skills/registry.json"),
            kv_url: env::var("KV_URL").ok().filter(|s| !s.trim().is_empty()),
            tool_servers: env::var("TOOL_SERVERS")
                .ok()
                .map(|raw| parse_tool_servers(&raw))
                .unwrap_or_default(),
        };

        // SECURITY: Authentication is enforced whenever an API key is configured.
        let api_key = env::var("API_KEY").ok();
        let enable_auth = match &api_key {
            Some(key) if key.trim().is_empty() => {
                return Err(MeshError::Config(config::ConfigError::Message(
                    "API_KEY is set but blank".to_string(),
                )));
            }
            Some(key) if key.len() < 32 => {
                return Err(MeshError::Config(config::ConfigError::Message(
                    "API_KEY must be at least 32 characters for security".to_string(),
                )));
            }
            Some(_) => true,
            None => {
                tracing::warn!(
                    "No API_KEY configured; the submission port binding runs unauthenticated"
                );
                false
            }
        };

        let allowed_origins = env_or(
            "ALLOWED_ORIGINS",
            "http://localhost:3000,http://127.0.0.1:3000",
        )
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

        let api = ApiConfig {
            host: env_or("API_HOST", "127.0.0.1"),
            port: env_parse("API_PORT", 3000),
            api_key,
            enable_auth,
            allowed_origins,
        };

        Ok(Config { mesh, api })
    }
}

#[cfg(test)]
impl MeshConfig {
    /// Deterministic defaults for unit tests that construct a
    /// `MeshCoordinator` directly, bypassing `Config::load`'s environment
    /// parsing.
    pub fn for_tests() -> Self {
        Self {
            max_total_cost_per_hour: DEFAULT_MAX_TOTAL_COST_PER_HOUR,
            emergency_shutdown_threshold: DEFAULT_EMERGENCY_SHUTDOWN_THRESHOLD,
            max_tasks_per_user_per_hour: DEFAULT_MAX_TASKS_PER_USER_PER_HOUR,
            health_check_interval_secs: HEALTH_CHECK_INTERVAL_SECS,
            cost_monitor_interval_secs: COST_MONITOR_INTERVAL_SECS,
            performance_monitor_interval_secs: PERFORMANCE_MONITOR_INTERVAL_SECS,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
            history_retention_hours: HISTORY_RETENTION_HOURS,
            routing_weights: RoutingWeights::default(),
            skills_registry_path: "skills/registry.json".to_string(),
            kv_url: None,
            tool_servers: HashMap::new(),
        }
    }
}
