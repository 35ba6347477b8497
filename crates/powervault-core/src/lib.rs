//! powervault-core - collection pipeline of the Dell PowerVault MD exporter.
//!
//! Provides:
//! - `command` - `SMcli` invocation behind the `ReportSource` trait
//! - `report` - parsers for the CSV and summary report formats
//! - `mapper` - row classification into metric samples
//! - `registry` - gauge vectors and Prometheus text exposition
//! - `scheduler` - periodic, sequential collection passes
//! - `config` - target set and validated collector settings
//! - `mock` - canned reports for tests
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use powervault_core::mock::MockSource;
//! use powervault_core::{MetricRegistry, Scheduler};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let registry = Arc::new(MetricRegistry::new().unwrap());
//! let scheduler = Scheduler::new(MockSource::typical_array(), registry.clone(), Duration::from_secs(30));
//! scheduler.run_tick().await;
//! assert!(registry.encode().unwrap().contains("Physical_Disk_Status"));
//! # });
//! ```

pub mod command;
pub mod config;
pub mod mapper;
pub mod mock;
pub mod numeral;
pub mod query;
pub mod registry;
pub mod report;
pub mod scheduler;

pub use command::{CommandError, RawReport, ReportSource, SmCli};
pub use config::{ConfigError, ExporterConfig, TargetSet};
pub use query::QueryKind;
pub use registry::{Metric, MetricRegistry, RegistryError};
pub use report::ParseError;
pub use scheduler::{PassError, PassOutcome, PassReport, Scheduler};

/// Crate version with the source revision it was built from.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("PVMD_BUILD_REV"), ")");
