use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::Rank;

/// Counters scoped to one dispatch engine.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total publish calls
    pub publishes_total: AtomicU64,

    /// Publish verdicts by rank
    pub verdicts_none: AtomicU64,
    pub verdicts_record: AtomicU64,
    pub verdicts_block: AtomicU64,
    pub verdicts_redirect: AtomicU64,

    /// Publish latency buckets (microseconds)
    pub latency_under_100us: AtomicU64,
    pub latency_100_500us: AtomicU64,
    pub latency_500us_1ms: AtomicU64,
    pub latency_1_10ms: AtomicU64,
    pub latency_over_10ms: AtomicU64,

    /// Inspector calls
    pub inspector_calls_total: AtomicU64,
    pub inspector_failures_total: AtomicU64,
    pub inspector_timeouts_total: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        EngineMetrics::default()
    }

    /// Record the verdict of one publish call.
    pub fn record_verdict(&self, rank: Rank) {
        self.publishes_total.fetch_add(1, Ordering::Relaxed);

        let counter = match rank {
            Rank::None => &self.verdicts_none,
            Rank::Record => &self.verdicts_record,
            Rank::Block => &self.verdicts_block,
            Rank::Redirect => &self.verdicts_redirect,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record publish latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 100 {
            self.latency_under_100us.fetch_add(1, Ordering::Relaxed);
        } else if micros < 500 {
            self.latency_100_500us.fetch_add(1, Ordering::Relaxed);
        } else if micros < 1000 {
            self.latency_500us_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_1_10ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_10ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one inspector call and how it ended.
    pub fn record_inspector_call(&self, failed: bool, timed_out: bool) {
        self.inspector_calls_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.inspector_failures_total.fetch_add(1, Ordering::Relaxed);
        }
        if timed_out {
            self.inspector_timeouts_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP appsec_publishes_total Total number of publish calls
# TYPE appsec_publishes_total counter
appsec_publishes_total {}

# HELP appsec_verdicts Publish verdicts by rank
# TYPE appsec_verdicts counter
appsec_verdicts{{rank="none"}} {}
appsec_verdicts{{rank="record"}} {}
appsec_verdicts{{rank="block"}} {}
appsec_verdicts{{rank="redirect"}} {}

# HELP appsec_publish_latency_bucket Publish latency histogram
# TYPE appsec_publish_latency_bucket counter
appsec_publish_latency_bucket{{le="0.0001"}} {}
appsec_publish_latency_bucket{{le="0.0005"}} {}
appsec_publish_latency_bucket{{le="0.001"}} {}
appsec_publish_latency_bucket{{le="0.01"}} {}
appsec_publish_latency_bucket{{le="+Inf"}} {}

# HELP appsec_inspector_calls_total Total inspector calls
# TYPE appsec_inspector_calls_total counter
appsec_inspector_calls_total {}

# HELP appsec_inspector_failures_total Inspector calls that failed
# TYPE appsec_inspector_failures_total counter
appsec_inspector_failures_total {}

# HELP appsec_inspector_timeouts_total Inspector calls that exceeded their budget
# TYPE appsec_inspector_timeouts_total counter
appsec_inspector_timeouts_total {}
"#,
            self.publishes_total.load(Ordering::Relaxed),
            self.verdicts_none.load(Ordering::Relaxed),
            self.verdicts_record.load(Ordering::Relaxed),
            self.verdicts_block.load(Ordering::Relaxed),
            self.verdicts_redirect.load(Ordering::Relaxed),
            self.latency_under_100us.load(Ordering::Relaxed),
            self.latency_100_500us.load(Ordering::Relaxed),
            self.latency_500us_1ms.load(Ordering::Relaxed),
            self.latency_1_10ms.load(Ordering::Relaxed),
            self.latency_over_10ms.load(Ordering::Relaxed),
            self.inspector_calls_total.load(Ordering::Relaxed),
            self.inspector_failures_total.load(Ordering::Relaxed),
            self.inspector_timeouts_total.load(Ordering::Relaxed),
        )
    }
}

/// Records publish latency when dropped.
pub struct TimingGuard<'a> {
    metrics: &'a EngineMetrics,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(metrics: &'a EngineMetrics) -> Self {
        TimingGuard {
            metrics,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.metrics.record_latency(self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_verdict() {
        let metrics = EngineMetrics::new();

        metrics.record_verdict(Rank::None);
        metrics.record_verdict(Rank::None);
        metrics.record_verdict(Rank::Block);

        assert_eq!(metrics.publishes_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.verdicts_none.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.verdicts_block.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_timing_guard_records_latency() {
        let metrics = EngineMetrics::new();
        {
            let _guard = TimingGuard::new(&metrics);
        }

        let total = metrics.latency_under_100us.load(Ordering::Relaxed)
            + metrics.latency_100_500us.load(Ordering::Relaxed)
            + metrics.latency_500us_1ms.load(Ordering::Relaxed)
            + metrics.latency_1_10ms.load(Ordering::Relaxed)
            + metrics.latency_over_10ms.load(Ordering::Relaxed);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_inspector_calls() {
        let metrics = EngineMetrics::new();
        metrics.record_inspector_call(false, false);
        metrics.record_inspector_call(true, true);

        assert_eq!(metrics.inspector_calls_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.inspector_failures_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.inspector_timeouts_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = EngineMetrics::new();
        metrics.record_verdict(Rank::Record);

        let output = metrics.to_prometheus();

        assert!(output.contains("appsec_publishes_total 1"));
        assert!(output.contains("appsec_verdicts{rank=\"record\"} 1"));
    }
}
