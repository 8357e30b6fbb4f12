//! Capability interfaces for the background monitors' hooks (§4.1 "Hooks
//! ... are specified as capability interfaces; the core provides no-op
//! defaults."). A deployment wires a real implementation (paging,
//! autoscaler API calls, ...) by supplying its own `MeshHooks`.

use async_trait::async_trait;

#[async_trait]
pub trait MeshHooks: Send + Sync {
    async fn on_auto_scale(&self, _queue_wait_secs: f64) {}
    async fn on_rebalance(&self, _load_imbalance: f64) {}
    async fn on_activity_reduction(&self, _current_hour_cost: f64) {}
    async fn on_emergency_alert(&self, _reason: &str) {}
}

#[derive(Default)]
pub struct NoopHooks;

impl MeshHooks for NoopHooks {}
