//! Telemetry metric name constants.
//!
//! Centralised metric names for cache lifecycle operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mimir_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache`: cache name
//! - `operation`: "initialize", "refresh" or "scheduled"
//! - `status`: outcome: "ok" or "error"

/// Total source loads attempted.
///
/// Labels: `cache`, `operation`, `status` ("ok" | "error").
pub const LOADS_TOTAL: &str = "mimir_loads_total";

/// Source load duration in seconds.
///
/// Labels: `cache`, `operation`.
pub const LOAD_DURATION_SECONDS: &str = "mimir_load_duration_seconds";

/// Refresh requests that were satisfied by a concurrent refresh.
///
/// Labels: `cache`.
pub const REFRESH_SKIPPED_TOTAL: &str = "mimir_refresh_skipped_total";

/// Lifecycle listeners that returned an error.
///
/// Labels: `cache`, `kind` ("INIT" | "REFRESH").
pub const LISTENER_FAILURES_TOTAL: &str = "mimir_listener_failures_total";
