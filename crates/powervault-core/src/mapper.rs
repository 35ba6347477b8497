//! Classification of parsed report rows into metric samples.
//!
//! Field positions are vendor output layout, kept per report in one place.

use crate::numeral;
use crate::query::QueryKind;
use crate::registry::Metric;
use crate::report::{ParseError, ParsedRow};

/// Column layout of `show allphysicaldisks performancestats`.
mod physical_performance {
    pub const OBJECT_TYPE: &str = "Expansion";
    /// Tokens of `Expansion Enclosure 0, Drawer 0, Slot 1`.
    pub const ENCLOSURE_TOKEN: usize = 2;
    pub const DRAWER_TOKEN: usize = 4;
    pub const SLOT_TOKEN: usize = 6;
    pub const LATENCY_COLUMN: usize = 1;
}

/// Column layout of `show allvirtualdisks performancestats`.
mod virtual_performance {
    pub const OBJECT_TYPE: &str = "Virtual";
    /// Token holding `<prefix>_<type>_<ordinal>`.
    pub const NAME_TOKEN: usize = 2;
    pub const SPEED_COLUMN: usize = 6;
    pub const IO_COLUMN: usize = 8;
    pub const LATENCY_COLUMN: usize = 14;
}

/// Column layout of one disk line in `show allphysicaldisks summary`.
mod physical_summary {
    pub const ENCLOSURE_COLUMN: usize = 0;
    pub const DRAWER_COLUMN: usize = 1;
    pub const SLOT_COLUMN: usize = 2;
    pub const STATUS_COLUMN: usize = 3;
    pub const HEALTHY_STATUS: &str = "Optimal";
    pub const HEALTHY: f64 = 1.0;
    pub const UNHEALTHY: f64 = -1.0;
}

/// CSV column that names the reported object.
const OBJECT_COLUMN: usize = 0;

/// One value destined for a gauge, identified by metric and label values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: Metric,
    /// Values in the metric's label-name order.
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(metric: Metric, labels: Vec<String>, value: f64) -> Self {
        Self {
            metric,
            labels,
            value,
        }
    }
}

/// Result of mapping all rows of one report.
#[derive(Debug, Clone, Default)]
pub struct MappedRows {
    pub samples: Vec<Sample>,
    /// Rows that were relevant but could not be mapped.
    pub rejected: Vec<ParseError>,
    /// Rows that do not describe a metric of this report (headers, totals).
    pub ignored: usize,
}

/// Maps every row, collecting row-level failures instead of stopping.
pub fn map_rows(kind: QueryKind, rows: &[ParsedRow]) -> MappedRows {
    let mut mapped = MappedRows::default();
    for row in rows {
        match map_row(kind, row) {
            Ok(samples) if samples.is_empty() => mapped.ignored += 1,
            Ok(samples) => mapped.samples.extend(samples),
            Err(e) => mapped.rejected.push(e),
        }
    }
    mapped
}

/// Maps one row. Rows not relevant to `kind` yield no samples.
pub fn map_row(kind: QueryKind, row: &ParsedRow) -> Result<Vec<Sample>, ParseError> {
    match kind {
        QueryKind::PhysicalPerformance => map_physical_performance(row),
        QueryKind::VirtualPerformance => map_virtual_performance(row),
        QueryKind::PhysicalSummary => map_physical_summary(row).map(|s| vec![s]),
    }
}

fn map_physical_performance(row: &ParsedRow) -> Result<Vec<Sample>, ParseError> {
    use physical_performance::*;

    let tokens = object_tokens(row);
    if tokens.first() != Some(&OBJECT_TYPE) {
        return Ok(Vec::new());
    }

    let enclosure = location_token(row, &tokens, ENCLOSURE_TOKEN, "enclosure")?;
    let drawer = location_token(row, &tokens, DRAWER_TOKEN, "drawer")?;
    let slot = location_token(row, &tokens, SLOT_TOKEN, "slot")?;
    let latency = numeric_column(row, LATENCY_COLUMN, "latency")?;

    Ok(vec![Sample::new(
        Metric::PhysicalDiskLatency,
        vec![enclosure, drawer, slot],
        latency,
    )])
}

fn map_virtual_performance(row: &ParsedRow) -> Result<Vec<Sample>, ParseError> {
    use virtual_performance::*;

    let tokens = object_tokens(row);
    if tokens.first() != Some(&OBJECT_TYPE) {
        return Ok(Vec::new());
    }

    let name = tokens
        .get(NAME_TOKEN)
        .ok_or_else(|| malformed(row, "missing virtual disk name"))?;
    let [_, disk_type, ordinal] = name.split('_').collect::<Vec<_>>()[..] else {
        return Err(malformed(
            row,
            format!("virtual disk name {name:?} is not <prefix>_<type>_<ordinal>"),
        ));
    };
    let index = numeral::decode(ordinal)?;

    let speed = numeric_column(row, SPEED_COLUMN, "speed")?;
    let io = numeric_column(row, IO_COLUMN, "io")?;
    let latency = numeric_column(row, LATENCY_COLUMN, "latency")?;

    let labels = vec![disk_type.to_string(), index];
    Ok(vec![
        Sample::new(Metric::VirtualDiskSpeed, labels.clone(), speed),
        Sample::new(Metric::VirtualDiskIo, labels.clone(), io),
        Sample::new(Metric::VirtualDiskLatency, labels, latency),
    ])
}

fn map_physical_summary(row: &ParsedRow) -> Result<Sample, ParseError> {
    use physical_summary::*;

    let column = |idx: usize, name: &str| {
        row.field(idx)
            .map(str::to_string)
            .ok_or_else(|| malformed(row, format!("missing {name} column")))
    };

    let enclosure = column(ENCLOSURE_COLUMN, "enclosure")?;
    let drawer = column(DRAWER_COLUMN, "drawer")?;
    let slot = column(SLOT_COLUMN, "slot")?;
    let status = column(STATUS_COLUMN, "status")?;

    let value = if status == HEALTHY_STATUS {
        HEALTHY
    } else {
        UNHEALTHY
    };
    Ok(Sample::new(
        Metric::PhysicalDiskStatus,
        vec![enclosure, drawer, slot],
        value,
    ))
}

/// Single-space tokens of the object column.
fn object_tokens(row: &ParsedRow) -> Vec<&str> {
    row.field(OBJECT_COLUMN)
        .map(|object| object.split(' ').collect())
        .unwrap_or_default()
}

/// Location token with its trailing comma removed (`"12,"` -> `"12"`).
fn location_token(
    row: &ParsedRow,
    tokens: &[&str],
    idx: usize,
    name: &str,
) -> Result<String, ParseError> {
    tokens
        .get(idx)
        .map(|t| t.replace(',', ""))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed(row, format!("missing {name} in object name")))
}

fn numeric_column(row: &ParsedRow, idx: usize, field: &'static str) -> Result<f64, ParseError> {
    let raw = row
        .field(idx)
        .ok_or_else(|| malformed(row, format!("missing {field} column {idx}")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ParseError::NumericFormat {
            line: row.line,
            field,
            value: raw.to_string(),
        })
}

fn malformed(row: &ParsedRow, reason: impl Into<String>) -> ParseError {
    ParseError::MalformedRow {
        line: row.line,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> ParsedRow {
        ParsedRow::new(7, fields.iter().map(|s| s.to_string()).collect())
    }

    fn virtual_row(name: &str, speed: &str, io: &str, latency: &str) -> ParsedRow {
        let object = format!("Virtual Disk {name}");
        let mut fields = vec!["0"; 15];
        fields[0] = object.as_str();
        fields[6] = speed;
        fields[8] = io;
        fields[14] = latency;
        row(&fields)
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_physical_latency() {
        let samples = map_row(
            QueryKind::PhysicalPerformance,
            &row(&["Expansion Enclosure 12, Drawer 3, Slot 5", "0.25", "9.0"]),
        )
        .unwrap();
        assert_eq!(
            samples,
            vec![Sample::new(
                Metric::PhysicalDiskLatency,
                labels(&["12", "3", "5"]),
                0.25
            )]
        );
    }

    #[test]
    fn test_physical_ignores_other_objects() {
        for fields in [
            &["Objects", "Current IOs/sec"][..],
            &["Storage Subsystem Totals", "1.0"][..],
            &[][..],
        ] {
            assert!(
                map_row(QueryKind::PhysicalPerformance, &row(fields))
                    .unwrap()
                    .is_empty()
            );
        }
    }

    #[test]
    fn test_physical_bad_number() {
        let err = map_row(
            QueryKind::PhysicalPerformance,
            &row(&["Expansion Enclosure 0, Drawer 0, Slot 1", "n/a"]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParseError::NumericFormat {
                line: 7,
                field: "latency",
                value: "n/a".to_string()
            }
        );
    }

    #[test]
    fn test_physical_short_object_name() {
        let err = map_row(
            QueryKind::PhysicalPerformance,
            &row(&["Expansion Enclosure 0", "1.0"]),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MalformedRow { line: 7, .. }));
    }

    #[test]
    fn test_virtual_three_metrics() {
        let samples = map_row(
            QueryKind::VirtualPerformance,
            &virtual_row("VirtualDisk_RAID5_III", "120", "45", "2.3"),
        )
        .unwrap();
        let l = labels(&["RAID5", "3"]);
        assert_eq!(
            samples,
            vec![
                Sample::new(Metric::VirtualDiskSpeed, l.clone(), 120.0),
                Sample::new(Metric::VirtualDiskIo, l.clone(), 45.0),
                Sample::new(Metric::VirtualDiskLatency, l, 2.3),
            ]
        );
    }

    #[test]
    fn test_virtual_unknown_ordinal() {
        let err = map_row(
            QueryKind::VirtualPerformance,
            &virtual_row("VirtualDisk_RAID5_XXX", "1", "2", "3"),
        )
        .unwrap_err();
        assert_eq!(err, ParseError::UnknownOrdinal("XXX".to_string()));
    }

    #[test]
    fn test_virtual_bad_name() {
        let err = map_row(
            QueryKind::VirtualPerformance,
            &virtual_row("Data", "1", "2", "3"),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MalformedRow { .. }));
    }

    #[test]
    fn test_virtual_missing_columns() {
        let err = map_row(
            QueryKind::VirtualPerformance,
            &row(&["Virtual Disk VirtualDisk_R1_I", "1", "2"]),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MalformedRow { .. }));
    }

    #[test]
    fn test_summary_status() {
        let ok = map_row(
            QueryKind::PhysicalSummary,
            &row(&["12", "3", "5", "Optimal"]),
        )
        .unwrap();
        assert_eq!(
            ok,
            vec![Sample::new(
                Metric::PhysicalDiskStatus,
                labels(&["12", "3", "5"]),
                1.0
            )]
        );

        for status in ["Failed", "Replaced", "optimal", "Unassigned"] {
            let samples =
                map_row(QueryKind::PhysicalSummary, &row(&["12", "3", "5", status])).unwrap();
            assert_eq!(samples[0].value, -1.0, "status {status}");
        }
    }

    #[test]
    fn test_summary_short_row() {
        let err = map_row(QueryKind::PhysicalSummary, &row(&["12", "3"])).unwrap_err();
        assert!(matches!(err, ParseError::MalformedRow { .. }));
    }

    #[test]
    fn test_map_rows_skips_only_bad_rows() {
        let rows = vec![
            row(&["Objects", "Current"]),
            row(&["Expansion Enclosure 0, Drawer 0, Slot 1", "1.5"]),
            row(&["Expansion Enclosure 0, Drawer 0, Slot 2", "garbage"]),
            row(&["Expansion Enclosure 0, Drawer 0, Slot 3", "2.5"]),
        ];
        let mapped = map_rows(QueryKind::PhysicalPerformance, &rows);
        assert_eq!(mapped.ignored, 1);
        assert_eq!(mapped.rejected.len(), 1);
        let slots: Vec<&str> = mapped
            .samples
            .iter()
            .map(|s| s.labels[2].as_str())
            .collect();
        assert_eq!(slots, vec!["1", "3"]);
    }
}
