//! The fixed set of reports requested from `SMcli`.

use std::fmt;

/// One of the three reports issued to the management tool on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    PhysicalPerformance,
    VirtualPerformance,
    PhysicalSummary,
}

/// Text grammar of a report's standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Banner line followed by comma-separated records.
    Csv,
    /// Disk count on a header line followed by whitespace-aligned columns.
    Summary,
}

impl QueryKind {
    /// Collection order within a tick.
    pub const ALL: [QueryKind; 3] = [
        QueryKind::PhysicalPerformance,
        QueryKind::VirtualPerformance,
        QueryKind::PhysicalSummary,
    ];

    /// Script passed to `SMcli -c`.
    pub fn script(self) -> &'static str {
        match self {
            QueryKind::PhysicalPerformance => "show allphysicaldisks performancestats;",
            QueryKind::VirtualPerformance => "show allvirtualdisks performancestats;",
            QueryKind::PhysicalSummary => "show allphysicaldisks summary;",
        }
    }

    pub fn format(self) -> ReportFormat {
        match self {
            QueryKind::PhysicalPerformance | QueryKind::VirtualPerformance => ReportFormat::Csv,
            QueryKind::PhysicalSummary => ReportFormat::Summary,
        }
    }

    /// Short name used in logs and in the `query` label of self-metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::PhysicalPerformance => "physical_performance",
            QueryKind::VirtualPerformance => "virtual_performance",
            QueryKind::PhysicalSummary => "physical_summary",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
