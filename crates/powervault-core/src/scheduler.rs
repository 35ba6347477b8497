//! Periodic refresh of the registry from `SMcli`.
//!
//! Each tick runs the three passes strictly one after another. A failed pass
//! is logged and leaves its gauges at their previous values; the next tick
//! retries it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::command::{CommandError, ReportSource};
use crate::mapper;
use crate::query::QueryKind;
use crate::registry::{Metric, MetricRegistry};
use crate::report::{self, ParseError};

/// Failure that aborts a whole pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// What a successful pass wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub kind: QueryKind,
    /// Samples stored in the registry.
    pub samples: usize,
    /// Rows dropped because they could not be parsed or mapped.
    pub rows_skipped: usize,
    /// Rows that carried no metric (headers, totals).
    pub rows_ignored: usize,
}

/// Outcome of one pass within a tick.
#[derive(Debug)]
pub struct PassOutcome {
    pub kind: QueryKind,
    pub duration: Duration,
    pub result: Result<PassReport, PassError>,
}

/// Drives collection passes against a [`ReportSource`].
pub struct Scheduler<S> {
    source: S,
    registry: Arc<MetricRegistry>,
    interval: Duration,
}

impl<S: ReportSource> Scheduler<S> {
    pub fn new(source: S, registry: Arc<MetricRegistry>, interval: Duration) -> Self {
        Self {
            source,
            registry,
            interval,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch, parse, map and store one report.
    pub async fn run_pass(&self, kind: QueryKind) -> Result<PassReport, PassError> {
        let raw = self.source.fetch(kind).await?;
        let parsed = report::parse(kind, &raw.output)?;
        let mapped = mapper::map_rows(kind, &parsed.rows);

        for e in parsed.rejected.iter().chain(&mapped.rejected) {
            warn!(query = %kind, error = %e, "skipping row");
        }

        let mut samples = 0;
        for sample in &mapped.samples {
            match self.registry.apply(sample) {
                Ok(()) => samples += 1,
                Err(e) => error!(
                    query = %kind,
                    metric = sample.metric.name(),
                    error = %e,
                    "failed to store sample"
                ),
            }
        }

        Ok(PassReport {
            kind,
            samples,
            rows_skipped: parsed.rejected.len() + mapped.rejected.len(),
            rows_ignored: mapped.ignored,
        })
    }

    /// Runs every pass once, in collection order.
    pub async fn run_tick(&self) -> Vec<PassOutcome> {
        let mut outcomes = Vec::with_capacity(QueryKind::ALL.len());

        for kind in QueryKind::ALL {
            let t0 = Instant::now();
            let result = self.run_pass(kind).await;
            let duration = t0.elapsed();

            match &result {
                Ok(report) => {
                    debug!(
                        query = %kind,
                        samples = report.samples,
                        rows_skipped = report.rows_skipped,
                        duration_ms = duration.as_millis() as u64,
                        "pass completed"
                    );
                    self.record(kind, Metric::ScrapeSuccess, 1.0);
                    self.record(kind, Metric::ScrapeRowsSkipped, report.rows_skipped as f64);
                }
                Err(e) => {
                    warn!(
                        query = %kind,
                        error = %e,
                        duration_ms = duration.as_millis() as u64,
                        "pass failed, keeping previous values"
                    );
                    self.record(kind, Metric::ScrapeSuccess, 0.0);
                }
            }
            self.record(kind, Metric::ScrapeDurationSeconds, duration.as_secs_f64());

            outcomes.push(PassOutcome {
                kind,
                duration,
                result,
            });
        }

        outcomes
    }

    /// Ticks forever. Ticks that fall behind a slow pass are skipped.
    pub async fn run(&self) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick_count: u64 = 0;

        loop {
            tick.tick().await;

            let t0 = Instant::now();
            let outcomes = self.run_tick().await;
            let elapsed = t0.elapsed();
            tick_count += 1;

            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            let samples: usize = outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().ok())
                .map(|r| r.samples)
                .sum();

            if tick_count == 1 {
                info!(
                    duration_ms = elapsed.as_millis() as u64,
                    samples, failed, "first collection completed"
                );
            } else {
                debug!(
                    duration_ms = elapsed.as_millis() as u64,
                    samples, failed, tick_count, "tick completed"
                );
            }

            if elapsed > self.interval / 2 {
                warn!(
                    duration_ms = elapsed.as_millis() as u64,
                    interval_ms = self.interval.as_millis() as u64,
                    "tick exceeded 50% of interval"
                );
            }
        }
    }

    fn record(&self, kind: QueryKind, metric: Metric, value: f64) {
        if let Err(e) = self.registry.set(metric, &[kind.as_str()], value) {
            error!(
                query = %kind,
                metric = metric.name(),
                error = %e,
                "failed to store self-metric"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSource, PHYSICAL_PERFORMANCE_REPORT, PHYSICAL_SUMMARY_REPORT};
    use crate::registry::GaugeSample;

    fn scheduler(source: MockSource) -> Scheduler<MockSource> {
        Scheduler::new(
            source,
            Arc::new(MetricRegistry::new().unwrap()),
            Duration::from_secs(30),
        )
    }

    fn disk_samples(registry: &MetricRegistry) -> Vec<GaugeSample> {
        registry
            .snapshot()
            .into_iter()
            .filter(|s| {
                !matches!(
                    s.metric,
                    Metric::ScrapeSuccess
                        | Metric::ScrapeDurationSeconds
                        | Metric::ScrapeRowsSkipped
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_tick_runs_passes_in_order() {
        let s = scheduler(MockSource::typical_array());
        let outcomes = s.run_tick().await;
        let kinds: Vec<QueryKind> = outcomes.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, QueryKind::ALL.to_vec());
        assert_eq!(s.source().calls(), QueryKind::ALL.to_vec());
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
    }

    #[tokio::test]
    async fn test_pass_reports_counts() {
        let s = scheduler(MockSource::typical_array());
        let report = s.run_pass(QueryKind::VirtualPerformance).await.unwrap();
        // two virtual disks, three samples each
        assert_eq!(report.samples, 6);
        assert_eq!(report.rows_skipped, 0);
        assert_eq!(report.rows_ignored, 2);
        assert_eq!(
            s.registry.value(Metric::VirtualDiskSpeed, &["RAID10", "12"]),
            Some(90.5)
        );
    }

    #[tokio::test]
    async fn test_repeated_tick_is_idempotent() {
        let s = scheduler(MockSource::typical_array());
        s.run_tick().await;
        let first = disk_samples(&s.registry);
        s.run_tick().await;
        assert_eq!(disk_samples(&s.registry), first);
        // 3 latency + 3 status + 2 * 3 virtual
        assert_eq!(first.len(), 12);
    }

    #[tokio::test]
    async fn test_failed_pass_keeps_stale_values() {
        let s = scheduler(MockSource::typical_array());
        s.run_tick().await;
        let before = disk_samples(&s.registry);

        for kind in QueryKind::ALL {
            s.source().fail(kind, 1);
        }
        let outcomes = s.run_tick().await;
        assert!(outcomes.iter().all(|o| matches!(o.result, Err(PassError::Command(_)))));
        assert_eq!(disk_samples(&s.registry), before);
        assert_eq!(
            s.registry.value(Metric::ScrapeSuccess, &["physical_summary"]),
            Some(0.0)
        );
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_only_that_pass() {
        let source = MockSource::typical_array();
        source.respond(QueryKind::PhysicalSummary, "banner\ncount: unknown\n");
        let s = scheduler(source);
        let outcomes = s.run_tick().await;
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_ok());
        assert!(matches!(
            outcomes[2].result,
            Err(PassError::Parse(ParseError::MalformedCount(_)))
        ));
        assert_eq!(
            s.registry.value(Metric::PhysicalDiskStatus, &["0", "0", "0"]),
            None
        );
    }

    #[tokio::test]
    async fn test_bad_row_is_skipped() {
        let source = MockSource::typical_array();
        let report = PHYSICAL_PERFORMANCE_REPORT.replace("\"0.75\"", "\"--\"");
        source.respond(QueryKind::PhysicalPerformance, report);
        let s = scheduler(source);

        let report = s.run_pass(QueryKind::PhysicalPerformance).await.unwrap();
        assert_eq!(report.samples, 2);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(
            s.registry.value(Metric::PhysicalDiskLatency, &["0", "0", "0"]),
            Some(1.25)
        );
        assert_eq!(
            s.registry.value(Metric::PhysicalDiskLatency, &["0", "0", "1"]),
            None
        );
    }

    #[tokio::test]
    async fn test_summary_status_values() {
        let source = MockSource::new();
        source.respond(QueryKind::PhysicalSummary, PHYSICAL_SUMMARY_REPORT);
        let s = scheduler(source);
        s.run_pass(QueryKind::PhysicalSummary).await.unwrap();
        assert_eq!(
            s.registry.value(Metric::PhysicalDiskStatus, &["0", "0", "1"]),
            Some(1.0)
        );
        assert_eq!(
            s.registry.value(Metric::PhysicalDiskStatus, &["0", "1", "0"]),
            Some(-1.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_on_interval() {
        let s = Arc::new(scheduler(MockSource::typical_array()));
        let runner = s.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        // first tick fires immediately, the next after one interval
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(s.source().calls().len(), 3);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(s.source().calls().len(), 6);

        handle.abort();
    }
}
