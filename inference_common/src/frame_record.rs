use serde::{Deserialize, Serialize};

/// Count of objects seen in one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// `frame_index / fps`.
    pub timestamp_sec: f64,
    pub bike_count: u32,
}

impl FrameRecord {
    pub fn new(frame_index: u64, fps: f64, bike_count: u32) -> Self {
        Self {
            timestamp_sec: frame_index as f64 / fps,
            bike_count,
        }
    }

    /// Whole minute of the video this frame falls in.
    pub fn minute(&self) -> f64 {
        (self.timestamp_sec / 60.0).floor()
    }
}

/// Row of the downloadable json/csv tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub timestamp_sec: f64,
    pub bike_count: u32,
    pub minute: f64,
}

impl From<&FrameRecord> for ExportRow {
    fn from(record: &FrameRecord) -> Self {
        Self {
            timestamp_sec: record.timestamp_sec,
            bike_count: record.bike_count,
            minute: record.minute(),
        }
    }
}

impl From<ExportRow> for FrameRecord {
    fn from(row: ExportRow) -> Self {
        Self {
            timestamp_sec: row.timestamp_sec,
            bike_count: row.bike_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_index_over_fps() {
        let record = FrameRecord::new(45, 30.0, 2);
        assert!((record.timestamp_sec - 1.5).abs() < 1e-9);
        assert_eq!(record.minute(), 0.0);
    }

    #[test]
    fn minute_floors() {
        let record = FrameRecord::new(3630, 30.0, 0);
        assert_eq!(record.minute(), 2.0);
        let row = ExportRow::from(&record);
        assert_eq!(row.minute, 2.0);
        assert_eq!(FrameRecord::from(row), record);
    }
}
