//! Gauge registry shared between the scheduler and the scrape endpoint.
//!
//! All gauge vectors are registered once in [`MetricRegistry::new`]. Values
//! are overwritten in place and never removed, so an identity keeps its last
//! value until a later pass replaces it.

use std::collections::HashMap;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::mapper::Sample;

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "dell_powervault_md_exporter";

const DISK_LOCATION_LABELS: &[&str] = &["Enclosure", "Drawer", "Slot"];
const VIRTUAL_DISK_LABELS: &[&str] = &["Type", "Index"];
const QUERY_LABELS: &[&str] = &["query"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{metric} expects {expected} label values, got {got}")]
    LabelArity {
        metric: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("exposition is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Every gauge vector the exporter publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    PhysicalDiskLatency,
    PhysicalDiskStatus,
    VirtualDiskLatency,
    VirtualDiskIo,
    VirtualDiskSpeed,
    ScrapeSuccess,
    ScrapeDurationSeconds,
    ScrapeRowsSkipped,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::PhysicalDiskLatency,
        Metric::PhysicalDiskStatus,
        Metric::VirtualDiskLatency,
        Metric::VirtualDiskIo,
        Metric::VirtualDiskSpeed,
        Metric::ScrapeSuccess,
        Metric::ScrapeDurationSeconds,
        Metric::ScrapeRowsSkipped,
    ];

    /// Name without the namespace prefix.
    pub fn name(self) -> &'static str {
        match self {
            Metric::PhysicalDiskLatency => "Physical_Disk_Latency",
            Metric::PhysicalDiskStatus => "Physical_Disk_Status",
            Metric::VirtualDiskLatency => "Virtual_Disk_Latency",
            Metric::VirtualDiskIo => "Virtual_Disk_IO",
            Metric::VirtualDiskSpeed => "Virtual_Disk_Speed",
            Metric::ScrapeSuccess => "scrape_success",
            Metric::ScrapeDurationSeconds => "scrape_duration_seconds",
            Metric::ScrapeRowsSkipped => "scrape_rows_skipped",
        }
    }

    /// Fully qualified name as exposed to Prometheus.
    pub fn fq_name(self) -> String {
        format!("{NAMESPACE}_{}", self.name())
    }

    pub fn help(self) -> &'static str {
        match self {
            Metric::PhysicalDiskLatency => "Delay from input into a system to desired outcome.",
            Metric::PhysicalDiskStatus => "Physical disk status (1 = Optimal, -1 = any other).",
            Metric::VirtualDiskLatency => "Delay from input into a system to desired outcome.",
            Metric::VirtualDiskIo => "Input/Output operations on a virtual disk.",
            Metric::VirtualDiskSpeed => "Speed at which the virtual disk transfers data.",
            Metric::ScrapeSuccess => "Whether the last SMcli pass succeeded (1) or failed (0).",
            Metric::ScrapeDurationSeconds => "Duration of the last SMcli pass in seconds.",
            Metric::ScrapeRowsSkipped => "Rows skipped in the last SMcli pass due to parse errors.",
        }
    }

    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            Metric::PhysicalDiskLatency | Metric::PhysicalDiskStatus => DISK_LOCATION_LABELS,
            Metric::VirtualDiskLatency | Metric::VirtualDiskIo | Metric::VirtualDiskSpeed => {
                VIRTUAL_DISK_LABELS
            }
            Metric::ScrapeSuccess | Metric::ScrapeDurationSeconds | Metric::ScrapeRowsSkipped => {
                QUERY_LABELS
            }
        }
    }
}

/// Current value of one metric identity.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSample {
    pub metric: Metric,
    /// Values in the metric's label-name order.
    pub labels: Vec<String>,
    pub value: f64,
}

/// Owns the Prometheus registry and one gauge vector per [`Metric`].
///
/// Cheap to share behind an `Arc`: gauge vectors synchronize internally, so
/// concurrent `set` and `snapshot`/`encode` calls need no outer lock.
pub struct MetricRegistry {
    registry: Registry,
    gauges: HashMap<Metric, GaugeVec>,
}

impl MetricRegistry {
    pub fn new() -> Result<Self, RegistryError> {
        let registry = Registry::new();
        let mut gauges = HashMap::with_capacity(Metric::ALL.len());

        for metric in Metric::ALL {
            let gauge = GaugeVec::new(
                Opts::new(metric.name(), metric.help()).namespace(NAMESPACE),
                metric.label_names(),
            )?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.insert(metric, gauge);
        }

        Ok(Self { registry, gauges })
    }

    /// Stores `value` under `(metric, labels)`, replacing any previous value.
    pub fn set(&self, metric: Metric, labels: &[&str], value: f64) -> Result<(), RegistryError> {
        let expected = metric.label_names().len();
        if labels.len() != expected {
            return Err(RegistryError::LabelArity {
                metric: metric.name(),
                expected,
                got: labels.len(),
            });
        }
        // every Metric is registered in new()
        if let Some(gauge) = self.gauges.get(&metric) {
            gauge.get_metric_with_label_values(labels)?.set(value);
        }
        Ok(())
    }

    pub fn apply(&self, sample: &Sample) -> Result<(), RegistryError> {
        let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
        self.set(sample.metric, &labels, sample.value)
    }

    /// Copy of every identity currently held, ordered by metric then labels.
    pub fn snapshot(&self) -> Vec<GaugeSample> {
        let mut samples = Vec::new();

        for family in self.registry.gather() {
            let Some(metric) = Metric::ALL
                .into_iter()
                .find(|m| m.fq_name() == family.get_name())
            else {
                continue;
            };

            for m in family.get_metric() {
                let pairs = m.get_label();
                let labels = metric
                    .label_names()
                    .iter()
                    .map(|name| {
                        pairs
                            .iter()
                            .find(|p| p.get_name() == *name)
                            .map(|p| p.get_value().to_string())
                            .unwrap_or_default()
                    })
                    .collect();
                samples.push(GaugeSample {
                    metric,
                    labels,
                    value: m.get_gauge().get_value(),
                });
            }
        }

        samples.sort_by(|a, b| a.metric.cmp(&b.metric).then_with(|| a.labels.cmp(&b.labels)));
        samples
    }

    /// Value of one identity, if it has ever been set.
    pub fn value(&self, metric: Metric, labels: &[&str]) -> Option<f64> {
        self.snapshot()
            .into_iter()
            .find(|s| {
                s.metric == metric && s.labels.iter().map(String::as_str).eq(labels.iter().copied())
            })
            .map(|s| s.value)
    }

    /// Renders the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, RegistryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
