//! Governance checks (§4.1 `submit_task`, §9 Open Questions): per-requester
//! hourly quota and hourly budget-fit enforcement.

use crate::error::{MeshError, Result};
use crate::models::Agent;
use crate::ports::{Clock, KvStore};
use std::sync::Arc;

pub struct Governance {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl Governance {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { kv, clock }
    }

    fn quota_key(&self, requester_id: &str) -> String {
        format!(
            "quota:{requester_id}:{}",
            self.clock.now().format("%Y-%m-%dT%H")
        )
    }

    /// Checks the requester's current-hour task count against `limit` and,
    /// if under, atomically records this submission. The hour is baked into
    /// the key itself, so the bucket rolls over without an explicit TTL.
    pub async fn check_and_record_quota(&self, requester_id: &str, limit: u32) -> Result<()> {
        let key = self.quota_key(requester_id);
        let current: u32 = self
            .kv
            .get(&key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        if current >= limit {
            return Err(MeshError::Quota {
                requester_id: requester_id.to_string(),
                limit,
            });
        }

        self.kv.incr(&key, 1).await?;
        Ok(())
    }

    /// Linear approximation of the current hour's realized cost:
    /// `sum(cost_incurred / total_tasks * current_tasks)` over every agent.
    /// Matches the source's `_calculate_current_hour_cost` exactly (§9 Open
    /// Question) rather than a rolling-window accounting — an
    /// under-approximation for burst workloads, by design.
    pub fn current_hour_cost(&self, agents: &[Agent]) -> f64 {
        agents
            .iter()
            .map(|agent| {
                if agent.metrics.total_tasks == 0 {
                    0.0
                } else {
                    (agent.metrics.cost_incurred / agent.metrics.total_tasks as f64)
                        * agent.current_tasks as f64
                }
            })
            .sum()
    }

    /// `current_hour_cost + max_cost ≤ ceiling` (§4.1 `submit_task`).
    pub fn check_budget(&self, current_hour_cost: f64, max_cost: Option<f64>, ceiling: f64) -> Result<()> {
        let requested = max_cost.unwrap_or(0.0);
        if current_hour_cost + requested > ceiling {
            return Err(MeshError::Budget {
                current: current_hour_cost,
                requested,
                ceiling,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMetrics, AgentStatus};
    use crate::ports::clock::FrozenClock;
    use crate::ports::kv::InMemoryKv;
    use chrono::Utc;
    use std::collections::HashSet;

    fn governance() -> Governance {
        Governance::new(Arc::new(InMemoryKv::new()), Arc::new(FrozenClock(Utc::now())))
    }

    #[tokio::test]
    async fn quota_allows_up_to_limit_then_rejects() {
        let gov = governance();
        for _ in 0..20 {
            gov.check_and_record_quota("r1", 20).await.unwrap();
        }
        assert!(matches!(
            gov.check_and_record_quota("r1", 20).await,
            Err(MeshError::Quota { .. })
        ));
    }

    #[test]
    fn budget_rejects_when_projection_exceeds_ceiling() {
        let gov = governance();
        assert!(gov.check_budget(40.0, Some(20.0), 50.0).is_err());
        assert!(gov.check_budget(10.0, Some(20.0), 50.0).is_ok());
    }

    #[test]
    fn current_hour_cost_uses_linear_approximation() {
        let gov = governance();
        let now = Utc::now();
        let mut metrics = AgentMetrics::new(now);
        metrics.total_tasks = 10;
        metrics.cost_incurred = 5.0;
        let agent = Agent {
            agent_id: "a1".to_string(),
            name: "jorge_seller".to_string(),
            capabilities: HashSet::new(),
            status: AgentStatus::Active,
            max_concurrent_tasks: 5,
            current_tasks: 2,
            priority_tier: 1,
            cost_per_token: 0.001,
            sla_response_seconds: 60,
            endpoint: "http://localhost".to_string(),
            health_check_url: None,
            last_heartbeat: now,
            metrics,
        };
        // 5.0 / 10 * 2 = 1.0
        assert_eq!(gov.current_hour_cost(&[agent]), 1.0);
    }
}
