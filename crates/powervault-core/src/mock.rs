//! In-memory report source for tests and local runs without an array.
//!
//! `MockSource` answers each [`QueryKind`] with a configured report or
//! failure and records the order in which queries were issued.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::command::{CommandError, RawReport, ReportSource};
use crate::query::QueryKind;

/// `show allphysicaldisks performancestats` for a three-disk enclosure.
pub const PHYSICAL_PERFORMANCE_REPORT: &str = "\
Performance Monitor Statistics for Storage Array: md3460 - Date/Time: 10/14/26 09:12:44 AM - Polling interval in seconds: 5
\"Objects\",\"Current Latency\",\"Maximum Latency\",\"Current IOs/sec\"
\"Storage Subsystem Totals\",\"0.0\",\"0.0\",\"412.0\"
\"Expansion Enclosure 0, Drawer 0, Slot 0\",\"1.25\",\"9.5\",\"140.0\"
\"Expansion Enclosure 0, Drawer 0, Slot 1\",\"0.75\",\"7.0\",\"131.0\"
\"Expansion Enclosure 0, Drawer 1, Slot 0\",\"2.5\",\"12.0\",\"141.0\"
";

/// `show allvirtualdisks performancestats` for two virtual disks.
pub const VIRTUAL_PERFORMANCE_REPORT: &str = "\
Performance Monitor Statistics for Storage Array: md3460 - Date/Time: 10/14/26 09:12:49 AM - Polling interval in seconds: 5
\"Objects\",\"Total IOs\",\"Read %\",\"Primary Read Cache Hit %\",\"Primary Write Cache Hit %\",\"SSD Cache Hit %\",\"Current MBs/sec\",\"Maximum MBs/sec\",\"Current IOs/sec\",\"Maximum IOs/sec\",\"Minimum IOs/sec\",\"Average IOs/sec\",\"Minimum MBs/sec\",\"Average MBs/sec\",\"Current IO Latency\"
\"Storage Subsystem Totals\",\"5120.0\",\"61.0\",\"88.0\",\"100.0\",\"0.0\",\"210.0\",\"300.0\",\"412.0\",\"600.0\",\"12.0\",\"400.0\",\"1.0\",\"190.0\",\"1.9\"
\"Virtual Disk VirtualDisk_RAID5_III\",\"2048.0\",\"70.0\",\"90.0\",\"100.0\",\"0.0\",\"120\",\"180.0\",\"45\",\"300.0\",\"2.0\",\"40.0\",\"0.5\",\"110.0\",\"2.3\"
\"Virtual Disk VirtualDisk_RAID10_XII\",\"3072.0\",\"52.0\",\"85.0\",\"100.0\",\"0.0\",\"90.5\",\"120.0\",\"367.0\",\"300.0\",\"10.0\",\"360.0\",\"0.5\",\"80.0\",\"0.8\"
";

/// `show allphysicaldisks summary` for the same three disks.
pub const PHYSICAL_SUMMARY_REPORT: &str = "\
PHYSICAL DISKS------------------------------
Number of physical disks in storage array: 3
   Enclosure  Drawer  Slot  Status     Capacity     Media Type
   0          0       0     Optimal    558.406 GB   Physical Disk
   0          0       1     Optimal    558.406 GB   Physical Disk
   0          1       0     Failed     558.406 GB   Physical Disk
";

/// Scripted answer for one query.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Output(String),
    /// Non-zero exit with the given code.
    Exit(i32),
    Empty,
}

/// Report source serving fixed responses.
#[derive(Debug, Default)]
pub struct MockSource {
    responses: Mutex<HashMap<QueryKind, MockResponse>>,
    calls: Mutex<Vec<QueryKind>>,
}

impl MockSource {
    /// Creates a source with no responses; every query fails as empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source answering all three queries with the bundled fixtures.
    pub fn typical_array() -> Self {
        let source = Self::new();
        source.respond(QueryKind::PhysicalPerformance, PHYSICAL_PERFORMANCE_REPORT);
        source.respond(QueryKind::VirtualPerformance, VIRTUAL_PERFORMANCE_REPORT);
        source.respond(QueryKind::PhysicalSummary, PHYSICAL_SUMMARY_REPORT);
        source
    }

    pub fn respond(&self, kind: QueryKind, output: impl Into<String>) {
        self.set(kind, MockResponse::Output(output.into()));
    }

    pub fn fail(&self, kind: QueryKind, code: i32) {
        self.set(kind, MockResponse::Exit(code));
    }

    pub fn set(&self, kind: QueryKind, response: MockResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(kind, response);
        }
    }

    /// Queries issued so far, in order.
    pub fn calls(&self) -> Vec<QueryKind> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn answer(&self, kind: QueryKind) -> Result<RawReport, CommandError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(kind);
        }
        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(&kind).cloned())
            .unwrap_or(MockResponse::Empty);

        match response {
            MockResponse::Output(output) => Ok(RawReport { kind, output }),
            MockResponse::Exit(code) => Err(CommandError::ExitStatus {
                code: Some(code),
                stderr: "mock failure".to_string(),
            }),
            MockResponse::Empty => Err(CommandError::EmptyOutput),
        }
    }
}

impl ReportSource for MockSource {
    async fn fetch(&self, kind: QueryKind) -> Result<RawReport, CommandError> {
        self.answer(kind)
    }
}
