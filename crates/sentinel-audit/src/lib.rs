//! sentinel-audit
//!
//! The tamper-evident decision log and the session registry. Every decision
//! becomes a JSON line, HMAC-signed when a key is configured; a separate
//! verification pass replays the stream and reports any line that fails.
//! Session records back real-time revocation of issued credentials.

pub mod entry;
pub mod registry;
pub mod sink;
pub mod verify;

pub use entry::{DecisionLogEntry, SignedEntry};
pub use registry::{IssuedSession, SessionRegistry};
pub use sink::{
    select_sink, CloudWatchLogs, CloudWatchSink, DecisionLog, DecisionLogSink, FileSink,
    StdoutSink,
};
pub use verify::{verify_stream, VerifyReport};
