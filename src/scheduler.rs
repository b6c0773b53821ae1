//! Background refresh scheduling.
//!
//! One tokio task per cache calls [`ManagedCache::check_refresh()`] on a
//! fixed delay: the next tick is scheduled only after the previous check
//! (and any refresh it triggered) has finished. Whether a tick actually
//! reloads is decided by the cache's expiration, not by the scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ManagedCache;

/// Default delay between expiry checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Scheduler timing.
///
/// ```rust
/// # use mimir::SchedulerConfig;
/// # use std::time::Duration;
/// let config = SchedulerConfig::new()
///     .interval(Duration::from_secs(30))
///     .initial_delay(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between the end of one check and the start of the next.
    /// Default: 5 minutes.
    pub interval: Duration,
    /// Delay before the first check. Default: one `interval`.
    pub initial_delay: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            initial_delay: None,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }
}

/// Handle to a cache's refresh task. Dropping it stops the task.
#[derive(Debug)]
pub struct RefreshScheduler {
    cache: String,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start checking `cache` for expiry. Must be called within a tokio
    /// runtime.
    pub fn spawn(cache: Arc<dyn ManagedCache>, config: &SchedulerConfig) -> Self {
        let name = cache.name().to_string();
        let interval = config.interval;
        let initial_delay = config.initial_delay.unwrap_or(interval);

        info!(cache = %name, interval_secs = interval.as_secs_f64(), "refresh scheduler started");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                if cache.check_refresh().await {
                    debug!(cache = cache.name(), "scheduled refresh completed");
                }
                tokio::time::sleep(interval).await;
            }
        });

        Self { cache: name, handle }
    }

    /// Name of the scheduled cache.
    pub fn cache_name(&self) -> &str {
        &self.cache
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the task. An in-flight refresh is cancelled at its next await
    /// point and the cache keeps its previous data.
    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(cache = %self.cache, "refresh scheduler stopped");
    }
}
