//! Log sinks and the signing writer.
//!
//! Sink selection precedence: signed CloudWatch, then plain CloudWatch,
//! then signed local file, then stdout. Log-write and signing failures are
//! fail-open — credential issuance never blocks on logging — but every
//! failure is reported on stderr.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use sentinel_core::error::SentinelError;
use sentinel_crypto::LogSigner;

use crate::entry::{DecisionLogEntry, SignedEntry};

/// Appends one rendered JSON line to wherever the log lives.
#[async_trait]
pub trait DecisionLogSink: Send + Sync {
    async fn append(&self, line: &str) -> Result<(), SentinelError>;
}

/// The CloudWatch Logs surface the sink adapter needs; the concrete client
/// lives outside the core.
#[async_trait]
pub trait CloudWatchLogs: Send + Sync {
    async fn put_log_line(&self, line: &str) -> Result<(), SentinelError>;
}

// ── Concrete sinks ───────────────────────────────────────────────────────────

pub struct CloudWatchSink {
    client: Arc<dyn CloudWatchLogs>,
}

impl CloudWatchSink {
    pub fn new(client: Arc<dyn CloudWatchLogs>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DecisionLogSink for CloudWatchSink {
    async fn append(&self, line: &str) -> Result<(), SentinelError> {
        self.client.put_log_line(line).await
    }
}

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DecisionLogSink for FileSink {
    async fn append(&self, line: &str) -> Result<(), SentinelError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SentinelError::Storage(format!("opening decision log: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| SentinelError::Storage(format!("writing decision log: {e}")))
    }
}

pub struct StdoutSink;

#[async_trait]
impl DecisionLogSink for StdoutSink {
    async fn append(&self, line: &str) -> Result<(), SentinelError> {
        println!("{line}");
        Ok(())
    }
}

// ── The decision log ─────────────────────────────────────────────────────────

/// Renders, optionally signs, and appends decision-log entries.
pub struct DecisionLog {
    sink: Arc<dyn DecisionLogSink>,
    signer: Option<LogSigner>,
}

impl DecisionLog {
    pub fn new(sink: Arc<dyn DecisionLogSink>, signer: Option<LogSigner>) -> Self {
        Self { sink, signer }
    }

    /// Append one entry. Never fails the caller: a signing failure falls
    /// back to writing the unsigned entry, a sink failure is reported and
    /// swallowed.
    pub async fn record(&self, entry: &DecisionLogEntry) {
        let entry_json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("decision log: failed to render entry: {e}");
                return;
            }
        };
        let line = match &self.signer {
            None => entry_json,
            Some(signer) => {
                let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
                let sig = signer.sign(entry_json.as_bytes(), &ts);
                let signed = SignedEntry {
                    entry: entry.clone(),
                    ts,
                    key_id: signer.key_id().to_string(),
                    sig,
                };
                match serde_json::to_string(&signed) {
                    Ok(line) => line,
                    Err(e) => {
                        eprintln!("decision log: signing failed, writing unsigned entry: {e}");
                        entry_json
                    }
                }
            }
        };
        if let Err(e) = self.sink.append(&line).await {
            error!(error = %e, "decision log append failed");
            eprintln!("decision log: append failed: {e}");
        }
    }
}

/// Build the log per the sink precedence: signed CloudWatch > plain
/// CloudWatch > signed local file > stdout.
pub fn select_sink(
    cloudwatch: Option<Arc<dyn CloudWatchLogs>>,
    file_path: Option<PathBuf>,
    signer: Option<LogSigner>,
) -> DecisionLog {
    match (cloudwatch, signer) {
        (Some(client), signer) => {
            DecisionLog::new(Arc::new(CloudWatchSink::new(client)), signer)
        }
        (None, Some(signer)) => match file_path {
            Some(path) => DecisionLog::new(Arc::new(FileSink::new(path)), Some(signer)),
            None => DecisionLog::new(Arc::new(StdoutSink), None),
        },
        (None, None) => DecisionLog::new(Arc::new(StdoutSink), None),
    }
}
