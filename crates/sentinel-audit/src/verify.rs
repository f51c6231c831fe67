//! Offline verification of a signed decision-log stream.

use std::io::BufRead;

use sentinel_core::error::SentinelError;
use sentinel_crypto::LogSigner;

use crate::entry::SignedEntry;

/// Outcome of verifying one stream.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub lines: usize,
    /// (1-based line number, reason) for every line that failed.
    pub failures: Vec<(usize, String)>,
}

impl VerifyReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Verify every line of a signed JSON-lines stream. Blank lines are
/// skipped; anything else must parse as a `SignedEntry` and carry a valid
/// signature over the canonical entry bytes.
pub fn verify_stream(
    reader: impl BufRead,
    signer: &LogSigner,
) -> Result<VerifyReport, SentinelError> {
    let mut report = VerifyReport::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SentinelError::Storage(format!("reading log: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        report.lines += 1;
        let line_no = idx + 1;

        let signed: SignedEntry = match serde_json::from_str(&line) {
            Ok(signed) => signed,
            Err(e) => {
                report.failures.push((line_no, format!("unparseable: {e}")));
                continue;
            }
        };
        let entry_json = match serde_json::to_string(&signed.entry) {
            Ok(json) => json,
            Err(e) => {
                report
                    .failures
                    .push((line_no, format!("entry re-serialization failed: {e}")));
                continue;
            }
        };
        if signed.key_id != signer.key_id() {
            report
                .failures
                .push((line_no, format!("unknown key id {}", signed.key_id)));
            continue;
        }
        if !signer.verify(entry_json.as_bytes(), &signed.ts, &signed.sig) {
            report
                .failures
                .push((line_no, "signature mismatch".to_string()));
        }
    }
    Ok(report)
}
