pub mod backend;
pub mod capture;

pub use backend::{AudioFrame, CaptureBackend, CaptureConfig};
pub use capture::CpalCapture;
