pub mod aggregator;
pub mod bbox;
pub mod coco_classes;
pub mod detection;
pub mod error;
pub mod export;
pub mod frame_record;
pub mod frame_source;
pub mod frame_times;
pub mod snapshot;
pub mod tally;
pub mod video_meta;

pub use aggregator::{count_frames, CountConfig, CountSummary, Extremum, FrameCounter, Progress};
pub use detection::{Detection, Detector};
pub use error::CountError;
pub use frame_record::FrameRecord;
pub use frame_source::FrameSource;
