use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use relay_capture::{codec, CaptureConfig, CaptureStore};
use relay_protocol::{Arg, Fault, RecordKind};
use relay_proxy::{ListenerProxy, ListenerTarget, MessageListener, TruncatingSummarizer};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
struct CliConfig {
    #[serde(flatten)]
    capture: CaptureConfig,
    #[serde(default)]
    log_filter: Option<String>,
}

impl CliConfig {
    fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// `--capture` beats the config file, which beats the environment.
    fn capture_config(&self, flag: Option<&str>) -> CaptureConfig {
        match flag.or(self.capture.capture_path.as_deref()) {
            Some(path) => CaptureConfig::with_path(path),
            None => CaptureConfig::from_env(),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "relay-cli")]
#[command(about = "Relay interception and report capture tooling")]
struct Cli {
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long, global = true)]
    capture: Option<String>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Clone, Debug, Subcommand)]
enum CliCommand {
    /// Deliver each payload line through a proxied listener.
    Replay {
        #[arg(long)]
        payload_file: PathBuf,
    },
    /// Scrape report artifacts out of a relay log into JSONL.
    Extract {
        #[arg(long)]
        relay_log: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// List unique S3 pointers from a capture file.
    Pointers {
        #[arg(long)]
        capture_file: Option<PathBuf>,
    },
}

#[derive(Debug, Default)]
struct CountingListener {
    delivered: AtomicUsize,
}

impl MessageListener for CountingListener {
    fn on_message(&self, _message: &Arg) -> Result<(), Fault> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn init_tracing(filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(ToOwned::to_owned)
        .collect())
}

fn run_replay(payload_file: &Path, capture: CaptureConfig) -> anyhow::Result<()> {
    let payloads = fs::read_to_string(payload_file)
        .with_context(|| format!("failed to read payload file {}", payload_file.display()))?;
    let store = Arc::new(CaptureStore::new(capture));
    let proxy = ListenerProxy::wrap_with(
        ListenerTarget::new(CountingListener::default()),
        store.clone(),
        Arc::new(TruncatingSummarizer::default()),
    )
    .map_err(|_| anyhow!("listener exposes no interfaces"))?;

    for line in payloads.lines().filter(|line| !line.trim().is_empty()) {
        if let Err(fault) = proxy.on_message(&Arg::from(line)) {
            warn!("delivery failed: {fault}");
        }
    }

    let delivered = proxy.target().listener().delivered.load(Ordering::Relaxed);
    println!("Delivered {delivered} messages");
    let path = store
        .resolved_path()
        .context("failed to resolve capture path")?;
    println!("capture file: {}", path.display());
    Ok(())
}

fn run_extract(relay_log: &Path, out: &Path) -> anyhow::Result<()> {
    let mut body = String::new();
    let mut count = 0usize;
    for line in read_lines(relay_log)? {
        let responses = relay_extract::extract_text(&line)
            .into_iter()
            .filter(|record| record.kind() != RecordKind::S3Pointer);
        for record in relay_extract::scan_s3_pointers(&line)
            .into_iter()
            .chain(responses)
        {
            body.push_str(&codec::encode(record.entries()));
            body.push('\n');
            count += 1;
        }
    }

    if let Some(parent) = out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(out, body).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Wrote {count} entries to {}", out.display());
    Ok(())
}

fn s3_pointers(lines: &[String]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut pointers = Vec::new();
    for line in lines.iter().filter(|line| !line.trim().is_empty()) {
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if record.get("type").and_then(Value::as_str) != Some("s3Pointer") {
            continue;
        }
        let bucket = record.get("bucket").and_then(Value::as_str).unwrap_or_default();
        let key = record.get("key").and_then(Value::as_str).unwrap_or_default();
        if bucket.is_empty() || key.is_empty() {
            continue;
        }
        let pointer = (bucket.to_string(), key.to_string());
        if seen.insert(pointer.clone()) {
            pointers.push(pointer);
        }
    }
    pointers
}

fn run_pointers(capture_file: Option<PathBuf>, capture: CaptureConfig) -> anyhow::Result<()> {
    let path = match capture_file {
        Some(path) => path,
        None => CaptureStore::new(capture)
            .resolved_path()
            .context("failed to resolve capture path")?,
    };
    for (bucket, key) in s3_pointers(&read_lines(&path)?) {
        println!("s3://{bucket}/{key}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = CliConfig::load(cli.config_path.as_deref())?;
    init_tracing(cfg.log_filter.as_deref());
    let capture = cfg.capture_config(cli.capture.as_deref());

    match cli.command {
        CliCommand::Replay { payload_file } => run_replay(&payload_file, capture),
        CliCommand::Extract { relay_log, out } => run_extract(&relay_log, &out),
        CliCommand::Pointers { capture_file } => run_pointers(capture_file, capture),
    }
}
