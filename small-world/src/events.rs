//! Observational hooks: latency, batch-progress, and external-cache-hit callbacks.
//!
//! A plain trait rather than a hard dependency on any specific metrics or progress-bar crate;
//! `progress_bar::IndicatifReporting` below is one implementation of it, kept behind the
//! optional `progress` feature.

use std::time::Duration;

/// A sink for observational events emitted by [`crate::facade::SmallWorld`]. All methods are
/// no-ops by default; implement only the hooks you care about.
///
/// The core never caches query results itself; `on_cache_event` exists purely so a caller
/// layering an external cache on top of `SmallWorld` can report hits/misses through the same
/// reporting channel as everything else.
pub trait EventReporting: Send + Sync {
    /// Called once per public API call (an insert batch, a remove, a search) with the elapsed
    /// wall-clock time for that call.
    fn on_latency(&self, operation: &str, elapsed: Duration) {
        let _ = (operation, elapsed);
    }

    /// Called during a batch insert, throttled by the caller so it doesn't dominate a tight
    /// per-item loop. `done` and `total` are both counts of items, not bytes.
    fn on_progress(&self, done: usize, total: usize) {
        let _ = (done, total);
    }

    /// Reported by a caller-side cache wrapping `SmallWorld`; the core itself never calls this
    /// with a real cache hit since it has no cache of its own.
    fn on_cache_event(&self, hit: bool) {
        let _ = hit;
    }
}

/// The default sink: observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporting;

impl EventReporting for NoopReporting {}

#[cfg(feature = "progress")]
pub mod progress_bar {
    //! Adapter translating [`EventReporting::on_progress`] calls into ticks on an
    //! `indicatif::ProgressBar`.

    use super::EventReporting;
    use indicatif::ProgressBar;

    pub struct IndicatifReporting {
        bar: ProgressBar,
    }

    impl IndicatifReporting {
        pub fn new(total: u64) -> Self {
            Self {
                bar: ProgressBar::new(total),
            }
        }
    }

    impl EventReporting for IndicatifReporting {
        fn on_progress(&self, done: usize, total: usize) {
            self.bar.set_length(total as u64);
            self.bar.set_position(done as u64);
            if done >= total {
                self.bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporting_accepts_all_hooks_without_panicking() {
        let sink = NoopReporting;
        sink.on_latency("insert", Duration::from_millis(1));
        sink.on_progress(5, 10);
        sink.on_cache_event(true);
    }
}
