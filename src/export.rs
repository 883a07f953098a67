//! Flat CSV export of the result log.
//!
//! Header: `test_type,success,duration,accuracy,timestamp`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::interaction::{TestKind, TestResult};

/// One exported row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Human readable kind label.
    pub test_type: String,
    pub success: bool,
    pub duration: f64,
    pub accuracy: f64,
    pub timestamp: f64,
}

impl ResultRow {
    /// Parsed kind, if the label is recognised.
    pub fn kind(&self) -> Option<TestKind> {
        TestKind::from_str(&self.test_type)
    }
}

impl From<&TestResult> for ResultRow {
    fn from(result: &TestResult) -> Self {
        Self {
            test_type: result.kind.label().to_string(),
            success: result.success,
            duration: result.duration_s,
            accuracy: result.accuracy,
            timestamp: result.timestamp_s,
        }
    }
}

/// Serialize rows (header first) to any writer.
pub fn write_to<W: Write>(writer: W, rows: &[ResultRow]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        // serde only emits the header alongside the first record.
        out.write_record(["test_type", "success", "duration", "accuracy", "timestamp"])?;
    }
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

/// Parse rows from any reader.
pub fn read_from<R: Read>(reader: R) -> Result<Vec<ResultRow>> {
    let mut input = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in input.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn write_results(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let file = File::create(path)?;
    write_to(file, rows)?;
    info!("Exported {} result(s) to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRow>> {
    read_from(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: TestKind, success: bool, duration: f64, accuracy: f64) -> ResultRow {
        ResultRow {
            test_type: kind.label().to_string(),
            success,
            duration,
            accuracy,
            timestamp: 1_700_000_000.123_456,
        }
    }

    #[test]
    fn test_header_and_booleans() {
        let mut buf = Vec::new();
        write_to(&mut buf, &[row(TestKind::Dwell, true, 2.5, 1.0)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("test_type,success,duration,accuracy,timestamp"));
        let line = lines.next().unwrap();
        assert!(line.starts_with("Region Dwell Test,true,2.5,1.0,"));
    }

    #[test]
    fn test_empty_log_writes_header_only() {
        let mut buf = Vec::new();
        write_to(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.trim_end(), "test_type,success,duration,accuracy,timestamp");
        assert!(read_from(text.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_full_precision_floats() {
        let original = row(TestKind::Sequence, false, 0.1 + 0.2, 2.0 / 3.0);
        let mut buf = Vec::new();
        write_to(&mut buf, &[original.clone()]).unwrap();
        let back = read_from(buf.as_slice()).unwrap();
        assert_eq!(back, vec![original]);
        assert_eq!(back[0].kind(), Some(TestKind::Sequence));
    }
}
