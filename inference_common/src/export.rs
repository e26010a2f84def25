//! Downloadable tables of frame records.
//!
//! Both formats carry `timestamp_sec`, `bike_count` and the derived `minute`
//! column. Floats are written in their shortest round-trip form, so parsing
//! an export gives back the exact records.

use std::fmt::Write as _;

use anyhow::{bail, Context};

use crate::frame_record::{ExportRow, FrameRecord};

pub const CSV_HEADER: &str = "timestamp_sec,bike_count,minute";

pub fn rows(records: &[FrameRecord]) -> Vec<ExportRow> {
    records.iter().map(ExportRow::from).collect()
}

/// Json array of row objects.
pub fn to_json(records: &[FrameRecord]) -> serde_json::Result<String> {
    serde_json::to_string(&rows(records))
}

pub fn from_json(json: &str) -> serde_json::Result<Vec<FrameRecord>> {
    let rows: Vec<ExportRow> = serde_json::from_str(json)?;
    Ok(rows.into_iter().map(FrameRecord::from).collect())
}

pub fn to_csv(records: &[FrameRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 32 + CSV_HEADER.len() + 1);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for row in rows(records) {
        // `{:?}` keeps the trailing `.0` on whole floats
        let _ = writeln!(
            out,
            "{:?},{},{:?}",
            row.timestamp_sec, row.bike_count, row.minute
        );
    }
    out
}

pub fn parse_csv(csv: &str) -> anyhow::Result<Vec<FrameRecord>> {
    let mut lines = csv.lines();
    let header = lines.next().context("Empty csv")?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let ts_col = column(&columns, "timestamp_sec")?;
    let count_col = column(&columns, "bike_count")?;

    let mut records = Vec::new();
    for (i, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.len() {
            bail!(
                "Line {}: expected {} fields, found {}",
                i + 2,
                columns.len(),
                fields.len()
            );
        }
        let timestamp_sec = fields[ts_col]
            .parse::<f64>()
            .with_context(|| format!("Line {}: bad timestamp_sec", i + 2))?;
        let bike_count = fields[count_col]
            .parse::<u32>()
            .with_context(|| format!("Line {}: bad bike_count", i + 2))?;
        records.push(FrameRecord {
            timestamp_sec,
            bike_count,
        });
    }
    Ok(records)
}

fn column(columns: &[&str], name: &str) -> anyhow::Result<usize> {
    columns
        .iter()
        .position(|c| *c == name)
        .with_context(|| format!("Missing csv column {name:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FrameRecord> {
        (0..5)
            .map(|i| FrameRecord::new(i * 1000, 29.97, (i % 3) as u32))
            .collect()
    }

    #[test]
    fn csv_layout() {
        let csv = to_csv(&[FrameRecord::new(0, 30.0, 2), FrameRecord::new(1800, 30.0, 4)]);
        assert_eq!(
            csv,
            "timestamp_sec,bike_count,minute\n0.0,2,0.0\n60.0,4,1.0\n"
        );
    }

    #[test]
    fn csv_parses_back() {
        let records = sample();
        let parsed = parse_csv(&to_csv(&records)).unwrap();
        assert_eq!(parsed.len(), records.len());
        for (a, b) in records.iter().zip(&parsed) {
            assert!((a.timestamp_sec - b.timestamp_sec).abs() < 1e-6);
            assert_eq!(a.bike_count, b.bike_count);
        }
    }

    #[test]
    fn json_parses_back() {
        let records = sample();
        let json = to_json(&records).unwrap();
        assert!(json.starts_with(r#"[{"timestamp_sec":0.0,"bike_count":0,"minute":0.0}"#));
        let parsed = from_json(&json).unwrap();
        assert_eq!(parsed.len(), records.len());
        for (a, b) in records.iter().zip(&parsed) {
            assert!((a.timestamp_sec - b.timestamp_sec).abs() < 1e-6);
            assert_eq!(a.bike_count, b.bike_count);
        }
    }

    #[test]
    fn csv_errors() {
        assert!(parse_csv("").is_err());
        assert!(parse_csv("timestamp_sec,minute\n0.0,0.0\n").is_err());
        assert!(parse_csv("timestamp_sec,bike_count,minute\n0.0,x,0.0\n").is_err());
        assert!(parse_csv("timestamp_sec,bike_count,minute\n0.0,1\n").is_err());
    }
}
