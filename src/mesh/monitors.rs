//! Background governance monitors (§4.1 "Background monitors", §5 "each own
//! an independent periodic timer and post their findings to the coordinator
//! via the same serialization point"). Each tick calls back into
//! `MeshCoordinator`'s own locked state rather than mutating anything
//! directly, so monitors never race the router or the executor.

use super::MeshCoordinator;
use crate::constants::{LOAD_IMBALANCE_ALARM, QUEUE_WAIT_ALARM_SECS};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Runs all four monitors on their configured intervals until the process
/// exits. Intended to be spawned once at startup and raced against the
/// submission-port binding via `tokio::select!` in `main`.
pub async fn run(coordinator: Arc<MeshCoordinator>) {
    let cfg = coordinator.config();
    let mut health_tick = interval(Duration::from_secs(cfg.health_check_interval_secs));
    let mut cost_tick = interval(Duration::from_secs(cfg.cost_monitor_interval_secs));
    let mut performance_tick = interval(Duration::from_secs(cfg.performance_monitor_interval_secs));
    let mut cleanup_tick = interval(Duration::from_secs(cfg.cleanup_interval_secs));

    loop {
        tokio::select! {
            _ = health_tick.tick() => health_monitor(&coordinator).await,
            _ = cost_tick.tick() => cost_monitor(&coordinator).await,
            _ = performance_tick.tick() => performance_monitor(&coordinator).await,
            _ = cleanup_tick.tick() => cleanup_monitor(&coordinator).await,
        }
    }
}

async fn health_monitor(coordinator: &Arc<MeshCoordinator>) {
    let reports = coordinator.health_check().await;
    let failed = reports.iter().filter(|r| !r.healthy).count();
    if failed > 0 {
        warn!(failed, total = reports.len(), "health monitor found failing agents");
    } else {
        debug!(total = reports.len(), "health monitor tick: all agents healthy");
    }
}

async fn cost_monitor(coordinator: &Arc<MeshCoordinator>) {
    let agents = coordinator.agents_snapshot().await;
    let current_cost = coordinator.governance().current_hour_cost(&agents);
    let cfg = coordinator.config();

    if current_cost > cfg.emergency_shutdown_threshold {
        let reason = format!("Cost threshold exceeded: ${current_cost:.2}");
        coordinator.emergency_shutdown(&reason).await;
    } else if current_cost > cfg.max_total_cost_per_hour {
        warn!(current_cost, ceiling = cfg.max_total_cost_per_hour, "hourly cost over budget");
        coordinator.hooks().on_activity_reduction(current_cost).await;
    } else {
        debug!(current_cost, "cost monitor tick");
    }
}

async fn performance_monitor(coordinator: &Arc<MeshCoordinator>) {
    let queue_wait = coordinator.average_queue_wait_seconds().await;
    if queue_wait > QUEUE_WAIT_ALARM_SECS {
        info!(queue_wait, "queue wait alarm, invoking auto-scale hook");
        coordinator.hooks().on_auto_scale(queue_wait).await;
    }

    let imbalance = coordinator.load_imbalance().await;
    if imbalance > LOAD_IMBALANCE_ALARM {
        info!(imbalance, "load imbalance alarm, invoking rebalance hook");
        coordinator.hooks().on_rebalance(imbalance).await;
    }

    debug!(queue_wait, imbalance, "performance monitor tick");
}

async fn cleanup_monitor(coordinator: &Arc<MeshCoordinator>) {
    coordinator.run_cleanup().await;
    debug!("cleanup monitor tick");
}
