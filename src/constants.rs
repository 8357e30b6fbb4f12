//! 🎯 MESH CORE CONSTANTS: System-wide configuration values
//! DECISION ARCHAEOLOGY: Each constant includes reasoning for its specific value
//! AUDIT: Verify these values align with deployment constraints and routing expectations

// 🧭 ROUTING WEIGHTS
/// ⚖️ PERFORMANCE WEIGHT: Dominant scoring factor
/// Why: 0.40 rewards agents with a proven completion record above raw availability
/// Alternative: equal weighting (rejected: lets a fast-but-flaky agent win routinely)
pub const ROUTING_WEIGHT_PERFORMANCE: f64 = 0.40;

/// ⚖️ AVAILABILITY WEIGHT: Second scoring factor
/// Why: 0.25 favors lightly-loaded agents without overriding track record
pub const ROUTING_WEIGHT_AVAILABILITY: f64 = 0.25;

/// ⚖️ COST-EFFICIENCY WEIGHT: Third scoring factor
/// Why: 0.20 nudges routing toward cheaper agents once performance/availability are close
pub const ROUTING_WEIGHT_COST: f64 = 0.20;

/// ⚖️ RESPONSE-TIME WEIGHT: Remaining scoring factor, weights sum to 1.0
pub const ROUTING_WEIGHT_RESPONSE_TIME: f64 = 0.15;

/// 🚨 EMERGENCY PRIORITY MULTIPLIER: Applied to the final score
/// Why: 1.5x is enough to overcome a moderate performance deficit without
/// letting a terrible agent jump the queue purely on priority
pub const EMERGENCY_SCORE_MULTIPLIER: f64 = 1.5;

/// 🚨 CRITICAL PRIORITY MULTIPLIER: Smaller boost than Emergency
pub const CRITICAL_SCORE_MULTIPLIER: f64 = 1.2;

/// 💰 COST PRE-FILTER HEURISTIC: Assumed tokens-per-task used only to
/// pre-filter candidates before the authoritative budget check
/// Why: 1000 tokens approximates a typical task; this is a filter, not a bill
pub const COST_PREFILTER_ASSUMED_TOKENS: f64 = 1000.0;

// ⏱️ BACKGROUND MONITOR INTERVALS
/// 🩺 HEALTH CHECK INTERVAL: Frequent enough to catch outages without
/// hammering agent health endpoints
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// 💵 COST MONITOR INTERVAL: 5 minutes balances budget responsiveness
/// against the cost of recomputing the current-hour projection
pub const COST_MONITOR_INTERVAL_SECS: u64 = 300;

/// 📈 PERFORMANCE MONITOR INTERVAL: 2 minutes, fast enough to catch
/// queue-wait regressions within a single operator shift
pub const PERFORMANCE_MONITOR_INTERVAL_SECS: u64 = 120;

/// 🧹 CLEANUP INTERVAL: Hourly sweep of history older than the retention window
pub const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// 📚 HISTORY RETENTION: Completed/failed tasks older than this are dropped
/// from in-memory history by the cleanup monitor
pub const HISTORY_RETENTION_HOURS: i64 = 24;

/// ⏳ AGENT HEARTBEAT STALENESS THRESHOLD: An agent not heard from in this
/// window is excluded from routing regardless of its reported status
pub const HEARTBEAT_STALENESS_MINUTES: i64 = 2;

// 📈 PERFORMANCE MONITOR THRESHOLDS
/// 🚦 QUEUE WAIT ALARM: Average queue wait above this triggers the
/// auto-scale hook
pub const QUEUE_WAIT_ALARM_SECS: f64 = 30.0;

/// ⚖️ LOAD IMBALANCE ALARM: Spread between the busiest and idlest agent's
/// load above this triggers the rebalance hook
pub const LOAD_IMBALANCE_ALARM: f64 = 0.3;

// 💰 GOVERNANCE DEFAULTS
/// 🏦 DEFAULT HOURLY BUDGET CEILING: Conservative default for a fresh deployment
pub const DEFAULT_MAX_TOTAL_COST_PER_HOUR: f64 = 50.0;

/// 🚨 DEFAULT EMERGENCY SHUTDOWN THRESHOLD: 3x the default hourly ceiling —
/// a burst this far over budget indicates a runaway loop, not normal load
pub const DEFAULT_EMERGENCY_SHUTDOWN_THRESHOLD: f64 = 150.0;

/// 🧮 DEFAULT REQUESTER QUOTA: Tasks per requester per rolling hour
pub const DEFAULT_MAX_TASKS_PER_USER_PER_HOUR: u32 = 20;

// 📦 RETENTION & TTLS
/// 🗃️ TASK RECORD TTL: Analytics retention independent of in-memory history
pub const TASK_RECORD_TTL_DAYS: i64 = 7;

/// 🗃️ DAILY ROLLUP TTL: Aggregates survive long enough for the 30-day
/// efficiency report window
pub const DAILY_ROLLUP_TTL_DAYS: i64 = 30;

// 🎯 PROGRESSIVE SKILLS DEFAULTS
/// 🛟 DISCOVERY FALLBACK CONFIDENCE: Confidence assigned when discovery fails
/// and the configured fallback skill is used instead
pub const DISCOVERY_FALLBACK_CONFIDENCE: f64 = 0.5;

/// 🛟 DISCOVERY FALLBACK TOKEN ESTIMATE: Token count recorded for a fallback
/// discovery usage entry; carried over from the source's validated figure
pub const DISCOVERY_FALLBACK_TOKENS: u64 = 103;

/// 🎯 VALIDATED EFFICIENCY TARGET: The reduction the efficiency report
/// validates progressive usage against
pub const EFFICIENCY_TARGET_REDUCTION: f64 = 0.681;

// 💵 PRICING DEFAULTS
/// ✂️ INPUT/OUTPUT TOKEN SPLIT: Approximation used when the caller does not
/// separately report input vs. output tokens
pub const DEFAULT_INPUT_TOKEN_FRACTION: f64 = 0.8;
pub const DEFAULT_OUTPUT_TOKEN_FRACTION: f64 = 0.2;
