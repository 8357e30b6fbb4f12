//! Skill registry (§4.2 "Registry format"): a JSON document describing the
//! core/extended skill maps, the fallback skill, and mesh-wide expected
//! token-reduction figures.

use crate::models::SkillMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillRegistry {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub core_skills: HashMap<String, SkillMetadata>,
    #[serde(default)]
    pub extended_skills: HashMap<String, SkillMetadata>,
    pub fallback_skill: String,
    #[serde(default)]
    pub expected_reduction: f64,
    #[serde(default)]
    pub baseline_tokens: u32,
    #[serde(default)]
    pub target_tokens: u32,
}

fn default_version() -> String {
    "0".to_string()
}

impl SkillRegistry {
    /// A registry loaded from disk or malformed falls back to this: no
    /// named skills, but a fallback that always resolves, matching "missing
    /// or malformed registry degrades to a safe empty registry that always
    /// returns the fallback" (§4.2).
    pub fn empty_with_fallback(fallback: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            core_skills: HashMap::new(),
            extended_skills: HashMap::new(),
            fallback_skill: fallback.into(),
            expected_reduction: 0.0,
            baseline_tokens: 0,
            target_tokens: 0,
        }
    }

    /// Loads the registry JSON at `path`. Any read or parse failure degrades
    /// to [`SkillRegistry::empty_with_fallback`] rather than propagating, per
    /// §4.2 — a broken registry file must not prevent the mesh from booting.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skill registry unreadable, using empty fallback registry");
                return Self::empty_with_fallback("generic_fallback");
            }
        };

        match serde_json::from_str::<SkillRegistry>(&content) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skill registry malformed, using empty fallback registry");
                Self::empty_with_fallback("generic_fallback")
            }
        }
    }

    pub fn metadata(&self, skill_name: &str) -> Option<&SkillMetadata> {
        self.core_skills
            .get(skill_name)
            .or_else(|| self.extended_skills.get(skill_name))
    }

    pub fn contains(&self, skill_name: &str) -> bool {
        self.core_skills.contains_key(skill_name) || self.extended_skills.contains_key(skill_name)
    }

    pub fn is_core(&self, skill_name: &str) -> bool {
        self.core_skills.contains_key(skill_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_degrades_to_fallback() {
        let registry = SkillRegistry::load(Path::new("/nonexistent/registry.json"));
        assert_eq!(registry.fallback_skill, "generic_fallback");
        assert!(registry.core_skills.is_empty());
    }

    #[test]
    fn metadata_checks_core_then_extended() {
        let mut registry = SkillRegistry::empty_with_fallback("fallback");
        registry.extended_skills.insert(
            "stall_handling".to_string(),
            SkillMetadata {
                purpose: "handle stalls".to_string(),
                estimated_tokens: 400,
                confidence_threshold: 0.7,
                priority: 1,
            },
        );
        assert!(registry.metadata("stall_handling").is_some());
        assert!(registry.metadata("missing").is_none());
        assert!(!registry.is_core("stall_handling"));
    }
}
