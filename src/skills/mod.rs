//! Progressive Skills Manager (C5, §4.2): two-phase skill selection that
//! substitutes a compact discovery call for loading every skill's full
//! prompt on every task.

mod registry;

pub use registry::SkillRegistry;

use crate::constants::{DISCOVERY_FALLBACK_CONFIDENCE, DISCOVERY_FALLBACK_TOKENS};
use crate::models::SkillMetadata;
use crate::ports::ToolInvocationPort;
use crate::tracker::TokenTracker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub skills: Vec<String>,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub detected_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillExecutionResult {
    pub skill_used: String,
    pub response: String,
    pub confidence: f64,
    pub estimated_tokens: u64,
    pub ok: bool,
}

#[derive(Debug, Default)]
pub struct UsageStatistics {
    pub discoveries: u64,
    pub executions: u64,
    pub fallback_discoveries: u64,
}

/// Keyword hints scanned over lowercased raw LLM text when the discovery
/// response cannot be parsed as JSON (§4.2 "Discovery parsing").
const KEYWORD_HINTS: &[(&str, &str)] = &[
    ("stall", "stall_handling"),
    ("disqualif", "disqualification"),
    ("confrontational", "confrontational_handling"),
];

pub struct ProgressiveSkillsManager {
    registry: RwLock<SkillRegistry>,
    skills_dir: PathBuf,
    cache: RwLock<HashMap<String, String>>,
    tool: Arc<dyn ToolInvocationPort>,
    tracker: Arc<TokenTracker>,
    discoveries: AtomicU64,
    executions: AtomicU64,
    fallback_discoveries: AtomicU64,
}

impl ProgressiveSkillsManager {
    pub fn new(
        registry_path: &Path,
        tool: Arc<dyn ToolInvocationPort>,
        tracker: Arc<TokenTracker>,
    ) -> Self {
        let registry = SkillRegistry::load(registry_path);
        let skills_dir = registry_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            registry: RwLock::new(registry),
            skills_dir,
            cache: RwLock::new(HashMap::new()),
            tool,
            tracker,
            discoveries: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            fallback_discoveries: AtomicU64::new(0),
        }
    }

    fn parse_first_json_object(text: &str) -> Option<serde_json::Value> {
        let start = text.find('{')?;
        let bytes = text.as_bytes();
        let mut depth = 0i32;
        for (offset, byte) in bytes[start..].iter().enumerate() {
            match byte {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset + 1;
                        return serde_json::from_str(&text[start..end]).ok();
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn keyword_fallback(&self, text: &str, registry: &SkillRegistry) -> Option<(String, String)> {
        let lower = text.to_lowercase();
        KEYWORD_HINTS.iter().find_map(|(keyword, skill)| {
            if lower.contains(keyword) && registry.contains(skill) {
                Some((skill.to_string(), keyword.to_string()))
            } else {
                None
            }
        })
    }

    /// Runs the router skill against a compact `context` and resolves a
    /// skill selection for `task_type`. Any discovery failure degrades to
    /// the configured fallback skill at confidence 0.5 (§4.2, §8 scenario 5).
    pub async fn discover_skills(
        &self,
        context: &HashMap<String, String>,
        task_type: &str,
        task_id: &str,
        user_id: &str,
    ) -> DiscoveryResult {
        let registry = self.registry.read().await;
        let args = serde_json::json!({ "context": context, "task_type": task_type });

        let outcome = self.tool.call_tool("router", "discover_skills", args).await;
        self.discoveries.fetch_add(1, Ordering::Relaxed);

        let result = match outcome {
            Ok(value) => {
                if let (Some(skills), Some(confidence)) = (
                    value.get("skills").and_then(|v| v.as_array()),
                    value.get("confidence").and_then(|v| v.as_f64()),
                ) {
                    DiscoveryResult {
                        skills: skills
                            .iter()
                            .filter_map(|s| s.as_str().map(str::to_string))
                            .collect(),
                        confidence,
                        reasoning: value
                            .get("reasoning")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        detected_pattern: value
                            .get("detected_pattern")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                    }
                } else if let Some(text) = value.get("text").and_then(|v| v.as_str()) {
                    if let Some(parsed) = Self::parse_first_json_object(text) {
                        DiscoveryResult {
                            skills: parsed
                                .get("skills")
                                .and_then(|v| v.as_array())
                                .map(|arr| {
                                    arr.iter().filter_map(|s| s.as_str().map(str::to_string)).collect()
                                })
                                .unwrap_or_default(),
                            confidence: parsed.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5),
                            reasoning: parsed
                                .get("reasoning")
                                .and_then(|v| v.as_str())
                                .map(str::to_string),
                            detected_pattern: parsed
                                .get("detected_pattern")
                                .and_then(|v| v.as_str())
                                .map(str::to_string),
                        }
                    } else if let Some((skill, keyword)) = self.keyword_fallback(text, &registry) {
                        DiscoveryResult {
                            skills: vec![skill],
                            confidence: DISCOVERY_FALLBACK_CONFIDENCE,
                            reasoning: Some(format!("keyword match: {keyword}")),
                            detected_pattern: Some(keyword),
                        }
                    } else {
                        self.fallback_discoveries.fetch_add(1, Ordering::Relaxed);
                        DiscoveryResult {
                            skills: vec![registry.fallback_skill.clone()],
                            confidence: DISCOVERY_FALLBACK_CONFIDENCE,
                            reasoning: Some("Fallback due to discovery failure".to_string()),
                            detected_pattern: Some("fallback".to_string()),
                        }
                    }
                } else {
                    self.fallback_discoveries.fetch_add(1, Ordering::Relaxed);
                    DiscoveryResult {
                        skills: vec![registry.fallback_skill.clone()],
                        confidence: DISCOVERY_FALLBACK_CONFIDENCE,
                        reasoning: Some("Fallback due to discovery failure".to_string()),
                        detected_pattern: Some("fallback".to_string()),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "skill discovery call failed");
                self.fallback_discoveries.fetch_add(1, Ordering::Relaxed);
                DiscoveryResult {
                    skills: vec![registry.fallback_skill.clone()],
                    confidence: DISCOVERY_FALLBACK_CONFIDENCE,
                    reasoning: Some("Fallback due to discovery failure".to_string()),
                    detected_pattern: Some("fallback".to_string()),
                }
            }
        };

        let tokens = if result.detected_pattern.as_deref() == Some("fallback") {
            DISCOVERY_FALLBACK_TOKENS
        } else {
            200
        };
        if let Err(e) = self
            .tracker
            .record_usage(
                task_id,
                tokens,
                task_type,
                user_id,
                "router-skill",
                "discovery",
                result.skills.first().map(String::as_str),
                Some(result.confidence),
            )
            .await
        {
            warn!(error = %e, "discovery usage recording failed");
        }

        result
    }

    /// Resolves skill text: in-memory cache first, then `core/`, then
    /// `extended/`, finally the configured fallback (§4.2).
    pub async fn load_skill(&self, skill_name: &str) -> String {
        if let Some(cached) = self.cache.read().await.get(skill_name) {
            return cached.clone();
        }

        let registry = self.registry.read().await;
        let subdir = if registry.is_core(skill_name) {
            "core"
        } else {
            "extended"
        };
        let path = self.skills_dir.join(subdir).join(format!("{skill_name}.md"));

        let text = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skill file unreadable, using fallback text");
                format!("# {}\n\nFallback skill: no content available.", registry.fallback_skill)
            }
        };

        self.cache
            .write()
            .await
            .insert(skill_name.to_string(), text.clone());
        text
    }

    fn substitute(template: &str, context: &HashMap<String, String>) -> String {
        let mut out = template.to_string();
        for (key, value) in context {
            out = out.replace(&format!("{{{{{key}}}}}"), value);
        }
        out
    }

    /// Loads `skill_name`, substitutes `{{key}}` placeholders with flat
    /// `context` values, and invokes the model through the tool-invocation
    /// port. Transport failure yields a safe fallback response, `ok=false`.
    pub async fn execute_skill(
        &self,
        skill_name: &str,
        context: &HashMap<String, String>,
        task_id: &str,
        user_id: &str,
        model: &str,
    ) -> SkillExecutionResult {
        let template = self.load_skill(skill_name).await;
        let prompt = Self::substitute(&template, context);
        self.executions.fetch_add(1, Ordering::Relaxed);

        let metadata = self.registry.read().await.metadata(skill_name).cloned();
        let default_confidence = metadata
            .as_ref()
            .map(|m| m.confidence_threshold)
            .unwrap_or(0.7);
        let default_tokens = metadata.as_ref().map(|m| m.estimated_tokens as u64).unwrap_or(500);

        match self
            .tool
            .call_tool("llm", "generate", serde_json::json!({ "prompt": prompt }))
            .await
        {
            Ok(value) => {
                let response = value
                    .get("response")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let tokens = value
                    .get("tokens_used")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(default_tokens);
                let confidence = value
                    .get("confidence")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(default_confidence);

                if let Err(e) = self
                    .tracker
                    .record_usage(
                        task_id,
                        tokens,
                        skill_name,
                        user_id,
                        model,
                        "progressive",
                        Some(skill_name),
                        Some(confidence),
                    )
                    .await
                {
                    warn!(error = %e, "execution usage recording failed");
                }

                debug!(skill_name, tokens, "skill executed");
                SkillExecutionResult {
                    skill_used: skill_name.to_string(),
                    response,
                    confidence,
                    estimated_tokens: tokens,
                    ok: true,
                }
            }
            Err(e) => {
                warn!(skill_name, error = %e, "skill execution transport failure");
                SkillExecutionResult {
                    skill_used: skill_name.to_string(),
                    response: "Unable to process request at this time.".to_string(),
                    confidence: 0.0,
                    estimated_tokens: 0,
                    ok: false,
                }
            }
        }
    }

    pub async fn get_skill_metadata(&self, skill_name: &str) -> Option<SkillMetadata> {
        self.registry.read().await.metadata(skill_name).cloned()
    }

    pub fn get_usage_statistics(&self) -> UsageStatistics {
        UsageStatistics {
            discoveries: self.discoveries.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            fallback_discoveries: self.fallback_discoveries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock::FrozenClock;
    use crate::ports::kv::InMemoryKv;
    use crate::ports::tool::FakeToolClient;
    use chrono::Utc;

    fn tracker() -> Arc<TokenTracker> {
        Arc::new(TokenTracker::new(
            Arc::new(InMemoryKv::new()),
            Arc::new(FrozenClock(Utc::now())),
        ))
    }

    #[tokio::test]
    async fn discovery_failure_falls_back_with_declared_confidence() {
        let tool = Arc::new(FakeToolClient {
            response: Err(crate::error::MeshError::TransportError("down".into())),
        });
        let manager = ProgressiveSkillsManager::new(
            Path::new("/nonexistent/registry.json"),
            tool,
            tracker(),
        );

        let result = manager
            .discover_skills(&HashMap::new(), "jorge_seller_qualification", "t1", "u1")
            .await;

        assert_eq!(result.confidence, DISCOVERY_FALLBACK_CONFIDENCE);
        assert_eq!(result.detected_pattern.as_deref(), Some("fallback"));
        assert_eq!(result.skills, vec!["generic_fallback".to_string()]);
    }

    #[tokio::test]
    async fn structured_discovery_response_is_used_directly() {
        let tool = Arc::new(FakeToolClient {
            response: Ok(serde_json::json!({
                "skills": ["stall_handling"],
                "confidence": 0.92,
                "reasoning": "detected stall language",
                "detected_pattern": "stall"
            })),
        });
        let manager = ProgressiveSkillsManager::new(
            Path::new("/nonexistent/registry.json"),
            tool,
            tracker(),
        );

        let result = manager
            .discover_skills(&HashMap::new(), "jorge_seller_qualification", "t1", "u1")
            .await;

        assert_eq!(result.skills, vec!["stall_handling".to_string()]);
        assert!((result.confidence - 0.92).abs() < 1e-9);
    }

    #[tokio::test]
    async fn placeholder_substitution_is_flat_textual_replace() {
        let template = "Hello {{name}}, your task is {{task}}.";
        let mut ctx = HashMap::new();
        ctx.insert("name".to_string(), "Agent".to_string());
        ctx.insert("task".to_string(), "qualification".to_string());
        let out = ProgressiveSkillsManager::substitute(template, &ctx);
        assert_eq!(out, "Hello Agent, your task is qualification.");
    }

    #[tokio::test]
    async fn execute_skill_transport_failure_returns_safe_fallback() {
        let tool = Arc::new(FakeToolClient {
            response: Err(crate::error::MeshError::TransportError("down".into())),
        });
        let manager = ProgressiveSkillsManager::new(
            Path::new("/nonexistent/registry.json"),
            tool,
            tracker(),
        );

        let result = manager
            .execute_skill("generic_fallback", &HashMap::new(), "t1", "u1", "claude-3-haiku")
            .await;

        assert!(!result.ok);
        assert_eq!(result.estimated_tokens, 0);
    }
}
