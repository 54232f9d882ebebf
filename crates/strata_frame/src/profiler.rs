//! # Scope Profiler
//!
//! RAII timers that fold elapsed time into named per-phase metrics.
//!
//! ```rust
//! use strata_frame::{ProfileReport, ScopeTimer};
//!
//! let mut report = ProfileReport::new();
//! {
//!     let _timer = ScopeTimer::start(report.phase_mut("pool.alloc"));
//!     // ... work ...
//! }
//! assert_eq!(report.phase("pool.alloc").map(|m| m.samples()), Some(1));
//! ```

use std::time::{Duration, Instant};

/// Timing statistics for one named phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileMetrics {
    name: String,
    samples: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl ProfileMetrics {
    /// Creates empty metrics for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    /// Adds one sample.
    pub fn record(&mut self, elapsed: Duration) {
        self.samples += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    /// Phase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of recorded samples.
    #[inline]
    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Sum of all samples.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> Duration {
        self.total
    }

    /// Shortest sample, zero if nothing was recorded.
    #[must_use]
    pub fn min(&self) -> Duration {
        if self.samples == 0 {
            Duration::ZERO
        } else {
            self.min
        }
    }

    /// Longest sample.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Mean sample, zero if nothing was recorded.
    #[must_use]
    pub fn average(&self) -> Duration {
        if self.samples == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.samples);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Measures a scope and records it into a [`ProfileMetrics`] when dropped.
#[must_use = "the timer records when it is dropped"]
pub struct ScopeTimer<'a> {
    sink: &'a mut ProfileMetrics,
    start: Instant,
}

impl<'a> ScopeTimer<'a> {
    /// Starts timing now.
    pub fn start(sink: &'a mut ProfileMetrics) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopeTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::trace!(
            phase = %self.sink.name,
            micros = elapsed.as_micros() as u64,
            "scope finished"
        );
        self.sink.record(elapsed);
    }
}

/// Metrics for every phase seen so far, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileReport {
    phases: Vec<ProfileMetrics>,
}

impl ProfileReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self { phases: Vec::new() }
    }

    /// Metrics for `name`, if that phase has been seen.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&ProfileMetrics> {
        self.phases.iter().find(|metrics| metrics.name == name)
    }

    /// Metrics for `name`, created empty on first use.
    pub fn phase_mut(&mut self, name: &str) -> &mut ProfileMetrics {
        let index = match self.phases.iter().position(|metrics| metrics.name == name) {
            Some(index) => index,
            None => {
                self.phases.push(ProfileMetrics::new(name));
                self.phases.len() - 1
            }
        };
        &mut self.phases[index]
    }

    /// Iterates over all phases.
    pub fn iter(&self) -> impl Iterator<Item = &ProfileMetrics> {
        self.phases.iter()
    }

    /// Number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Returns true if no phase was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Emits one `info` event per phase.
    pub fn log_summary(&self) {
        for metrics in &self.phases {
            tracing::info!(
                phase = %metrics.name,
                samples = metrics.samples,
                avg_us = metrics.average().as_micros() as u64,
                min_us = metrics.min().as_micros() as u64,
                max_us = metrics.max.as_micros() as u64,
                "profile"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_aggregate() {
        let mut metrics = ProfileMetrics::new("phase");
        metrics.record(Duration::from_micros(10));
        metrics.record(Duration::from_micros(30));
        metrics.record(Duration::from_micros(20));

        assert_eq!(metrics.samples(), 3);
        assert_eq!(metrics.total(), Duration::from_micros(60));
        assert_eq!(metrics.min(), Duration::from_micros(10));
        assert_eq!(metrics.max(), Duration::from_micros(30));
        assert_eq!(metrics.average(), Duration::from_micros(20));
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = ProfileMetrics::new("idle");
        assert_eq!(metrics.average(), Duration::ZERO);
        assert_eq!(metrics.min(), Duration::ZERO);
    }

    #[test]
    fn test_scope_timer_records_on_drop() {
        let mut report = ProfileReport::new();
        for _ in 0..4 {
            let _timer = ScopeTimer::start(report.phase_mut("work"));
            std::thread::sleep(Duration::from_millis(1));
        }
        let work = report.phase("work").unwrap();
        assert_eq!(work.samples(), 4);
        assert!(work.min() >= Duration::from_millis(1));
    }

    #[test]
    fn test_phase_order_is_first_seen() {
        let mut report = ProfileReport::new();
        report.phase_mut("b").record(Duration::ZERO);
        report.phase_mut("a").record(Duration::ZERO);
        report.phase_mut("b").record(Duration::ZERO);

        let names: Vec<_> = report.iter().map(ProfileMetrics::name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(report.phase("b").unwrap().samples(), 2);
        assert!(report.phase("c").is_none());
    }
}
