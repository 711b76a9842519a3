//! Append-only capture of report artifacts extracted from intercepted deliveries.

pub mod codec;
mod store;

use relay_protocol::CapturedRecord;
use thiserror::Error;

pub use store::{
    resolve_capture_path, CaptureConfig, CaptureStore, CAPTURE_FILE_NAME, CAPTURE_PATH_ENV,
};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture lock poisoned")]
    Poisoned,
    #[error("write failure for {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for captured records. Implementations absorb their own failures.
pub trait CaptureSink: Send + Sync {
    fn record(&self, record: &CapturedRecord);
}

#[derive(Clone, Debug, Default)]
pub struct NoopCaptureSink;

impl CaptureSink for NoopCaptureSink {
    fn record(&self, _record: &CapturedRecord) {}
}
