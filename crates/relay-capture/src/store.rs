use std::env;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::Local;
use relay_protocol::CapturedRecord;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{codec, CaptureError, CaptureSink};

/// Environment variable naming the capture file.
pub const CAPTURE_PATH_ENV: &str = "RELAY_REPORT_CAPTURE";
pub const CAPTURE_FILE_NAME: &str = "BlueprintRelayReports.jsonl";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CaptureConfig {
    #[serde(default)]
    pub capture_path: Option<String>,
}

impl CaptureConfig {
    pub fn from_env() -> Self {
        Self {
            capture_path: env::var(CAPTURE_PATH_ENV).ok(),
        }
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            capture_path: Some(path.into()),
        }
    }
}

/// Resolves the capture file location.
///
/// A blank or missing setting falls back to [`CAPTURE_FILE_NAME`] under `home`
/// (or the current directory). When the parent directory cannot be created the
/// file lands in the current directory instead.
pub fn resolve_capture_path(configured: Option<&str>, home: Option<&Path>) -> PathBuf {
    let candidate = match configured.map(str::trim).filter(|path| !path.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => home.unwrap_or(Path::new(".")).join(CAPTURE_FILE_NAME),
    };
    let resolved = absolute(&candidate);

    if let Some(parent) = resolved.parent() {
        if !parent.exists() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(
                    "capture directory {} unavailable ({err}); using working directory",
                    parent.display()
                );
                return absolute(Path::new(CAPTURE_FILE_NAME));
            }
        }
    }
    resolved
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Process-shareable JSONL sink.
///
/// One lock covers lazy path resolution and every append, so concurrent
/// writers never interleave within a line. The file is reopened per record.
#[derive(Debug)]
pub struct CaptureStore {
    config: CaptureConfig,
    path: Mutex<Option<PathBuf>>,
}

impl CaptureStore {
    /// A store with its own lock. Writers are only serialized against each
    /// other when they share the same instance; [`CaptureStore::global`] is
    /// the one every default proxy uses.
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            path: Mutex::new(None),
        }
    }

    /// The process-wide store, configured from [`CAPTURE_PATH_ENV`] on first use.
    pub fn global() -> Arc<CaptureStore> {
        static STORE: OnceLock<Arc<CaptureStore>> = OnceLock::new();
        STORE
            .get_or_init(|| Arc::new(CaptureStore::new(CaptureConfig::from_env())))
            .clone()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn resolved_path(&self) -> Result<PathBuf, CaptureError> {
        let mut slot = self.path.lock().map_err(|_| CaptureError::Poisoned)?;
        Ok(self.resolve_locked(&mut slot).to_path_buf())
    }

    /// Stamps the record and appends it as one line. Records without any
    /// field value are skipped.
    pub fn append(&self, record: &CapturedRecord) -> Result<(), CaptureError> {
        if !record.has_values() {
            return Ok(());
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut entries = vec![("timestamp", Some(timestamp.as_str()))];
        entries.extend(record.entries());
        let mut line = codec::encode(entries);
        line.push('\n');

        let mut slot = self.path.lock().map_err(|_| CaptureError::Poisoned)?;
        let path = self.resolve_locked(&mut slot);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|source| CaptureError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    fn resolve_locked<'a>(&self, slot: &'a mut Option<PathBuf>) -> &'a Path {
        slot.get_or_insert_with(|| {
            let home = dirs::home_dir();
            let path = resolve_capture_path(self.config.capture_path.as_deref(), home.as_deref());
            debug!("report capture path resolved to {}", path.display());
            path
        })
        .as_path()
    }
}

impl CaptureSink for CaptureStore {
    fn record(&self, record: &CapturedRecord) {
        if let Err(err) = self.append(record) {
            warn!("failed to write report capture: {err}");
        }
    }
}
