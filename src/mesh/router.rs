//! Routing algorithm (§4.1): candidate filter, weighted scoring, and a
//! deterministic tie-break. Pure functions over a mesh snapshot so the
//! scoring is unit-testable without any coordinator state.

use crate::config::RoutingWeights;
use crate::constants::COST_PREFILTER_ASSUMED_TOKENS;
use crate::models::{Agent, Priority, Task};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Keeps agents that are available, capability-complete, within the task's
/// cost pre-filter, and able to meet the deadline's SLA window (§4.1 step 1).
pub fn filter_candidates<'a>(agents: &'a [Agent], task: &Task, now: DateTime<Utc>) -> Vec<&'a Agent> {
    agents
        .iter()
        .filter(|agent| {
            agent.is_available(now)
                && task
                    .capabilities_required
                    .iter()
                    .all(|cap| agent.capabilities.contains(cap))
                && task
                    .max_cost
                    .map_or(true, |max| agent.cost_per_token * COST_PREFILTER_ASSUMED_TOKENS <= max)
                && task.time_remaining(now).map_or(true, |remaining| {
                    remaining >= chrono::Duration::seconds(agent.sla_response_seconds as i64)
                })
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Weighted score for one candidate against the full mesh's cost/response
/// means (§4.1 step 2), multiplied by the priority boost (§4.1 step 2 final
/// bullet; see `Priority::score_multiplier`).
pub fn score_agent(
    agent: &Agent,
    mesh_mean_cost: f64,
    mesh_mean_response_time: f64,
    weights: &RoutingWeights,
    priority: Priority,
) -> f64 {
    let performance = agent.metrics.success_rate();
    let availability = 1.0 - agent.load();
    let cost_efficiency = if mesh_mean_cost > 0.0 {
        1.0 - agent.cost_per_token / mesh_mean_cost
    } else {
        1.0
    };
    let response_time = if mesh_mean_response_time > 0.0 {
        1.0 - agent.metrics.average_response_time / mesh_mean_response_time
    } else {
        0.0
    };

    let base = weights.performance * performance
        + weights.availability * availability
        + weights.cost * cost_efficiency
        + weights.response_time * response_time;

    base * priority.score_multiplier()
}

/// Runs the full routing pipeline and returns the chosen agent's id, or
/// `None` if no candidate survives the filter (§4.1 step 6, `NoCandidates`).
/// Ties are broken by ascending `agent_id` (§4.1 step 3, §8 scenario 3).
pub fn choose_agent(
    agents: &[Agent],
    task: &Task,
    weights: &RoutingWeights,
    now: DateTime<Utc>,
) -> Option<String> {
    let candidates = filter_candidates(agents, task, now);
    if candidates.is_empty() {
        return None;
    }

    let mesh_mean_cost = mean(agents.iter().map(|a| a.cost_per_token));
    let mesh_mean_response_time = mean(agents.iter().map(|a| a.metrics.average_response_time));

    candidates
        .into_iter()
        .map(|agent| {
            let score = score_agent(agent, mesh_mean_cost, mesh_mean_response_time, weights, task.priority);
            (agent.agent_id.clone(), score)
        })
        .max_by(|(id_a, score_a), (id_b, score_b)| {
            score_a
                .partial_cmp(score_b)
                .unwrap_or(Ordering::Equal)
                .then_with(|| id_b.cmp(id_a))
        })
        .map(|(agent_id, _)| agent_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentMetrics, AgentStatus};
    use std::collections::HashSet;

    fn agent(id: &str, cost: f64, avg_response: f64, success: f64) -> Agent {
        let now = Utc::now();
        let mut metrics = AgentMetrics::new(now);
        if success < 1.0 {
            metrics.total_tasks = 10;
            metrics.completed_tasks = (success * 10.0) as u64;
        }
        metrics.average_response_time = avg_response;
        Agent {
            agent_id: id.to_string(),
            name: "jorge_seller".to_string(),
            capabilities: HashSet::from(["LeadQualification".to_string()]),
            status: AgentStatus::Idle,
            max_concurrent_tasks: 5,
            current_tasks: 0,
            priority_tier: 1,
            cost_per_token: cost,
            sla_response_seconds: 60,
            endpoint: "http://localhost:9000".to_string(),
            health_check_url: None,
            last_heartbeat: now,
            metrics,
        }
    }

    fn task(priority: Priority) -> Task {
        Task::new(
            "lead_qualification",
            priority,
            HashSet::from(["LeadQualification".to_string()]),
            serde_json::json!({}),
            "requester-1",
            Utc::now(),
        )
    }

    #[test]
    fn capability_mismatch_yields_no_candidates() {
        let agents = vec![agent("b", 0.001, 1.0, 1.0)];
        let mut t = task(Priority::Normal);
        t.capabilities_required = HashSet::from(["PropertyMatching".to_string()]);
        let candidates = filter_candidates(&agents, &t, Utc::now());
        assert!(candidates.is_empty());
    }

    #[test]
    fn tie_breaks_lexicographically_ascending() {
        let agents = vec![agent("a2", 0.001, 1.0, 1.0), agent("a1", 0.001, 1.0, 1.0)];
        let chosen = choose_agent(&agents, &task(Priority::Emergency), &RoutingWeights::default(), Utc::now());
        assert_eq!(chosen.as_deref(), Some("a1"));
    }

    #[test]
    fn cheaper_agent_scores_higher_all_else_equal() {
        let agents = vec![agent("expensive", 0.01, 1.0, 1.0), agent("cheap", 0.001, 1.0, 1.0)];
        let chosen = choose_agent(&agents, &task(Priority::Normal), &RoutingWeights::default(), Utc::now());
        assert_eq!(chosen.as_deref(), Some("cheap"));
    }

    #[test]
    fn stale_heartbeat_excludes_agent() {
        let mut stale = agent("stale", 0.001, 1.0, 1.0);
        stale.last_heartbeat = Utc::now() - chrono::Duration::minutes(5);
        let candidates = filter_candidates(&[stale], &task(Priority::Normal), Utc::now());
        assert!(candidates.is_empty());
    }
}
