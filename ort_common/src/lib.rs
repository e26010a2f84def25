pub mod session;
pub mod yolov8;

pub use session::load_session;
pub use yolov8::{DecodeParams, YoloV8Detector};
