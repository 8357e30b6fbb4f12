//! # Mesh Core
//!
//! Mesh Core is the orchestration engine of a multi-agent mesh: a central
//! coordinator that accepts heterogeneous work tasks, routes them to
//! eligible worker agents under cost, SLA, and quota constraints, executes
//! them via pluggable transports, and enforces continuous governance
//! (health, budget, performance).
//!
//! ## Architecture
//!
//! - **Mesh Coordinator** (`mesh`): agent registry, task queue, router,
//!   governance, and background monitors.
//! - **Progressive Skills Manager** (`skills`): two-phase skill discovery
//!   and execution that trades a generic prompt for a compact discovery
//!   call.
//! - **Token/Cost Tracker** (`tracker`): per-task usage recording, daily
//!   rollups, and efficiency reporting.
//! - **Agent Executor adapters** (`executor`): translate a routed task into
//!   a tool call, skill invocation, or HTTP call.
//! - **Ports** (`ports`): the narrow external seams (clock, KV/cache,
//!   tool-invocation) the core depends on, so tests can swap in fakes.
//!
//! The HTTP/WebSocket submission edge, CRM/MLS connectors, dashboards, and
//! business-specific agent policies are external collaborators and out of
//! scope for this crate.

/// System configuration
pub mod config;
/// System-wide constants
pub mod constants;
/// Error types and handling
pub mod error;
/// Agent Executor adapters: dispatch a routed task to its adapter
pub mod executor;
/// Mesh Coordinator: registry, queue, router, governance, monitors
pub mod mesh;
/// Core data models
pub mod models;
/// External ports: clock, KV/cache, tool-invocation
pub mod ports;
/// Progressive Skills Manager: discovery and execution
pub mod skills;
/// Token/Cost Tracker: usage recording and efficiency reporting
pub mod tracker;
/// Input validation and sanitization
pub mod validation;

pub use error::{MeshError, Result};
