//! sentinel-verify-logs — offline verification of a signed decision log.
//!
//! Reads a JSON-lines stream (file or stdin), checks every line's HMAC, and
//! exits 0 only when the whole stream verifies. Any parse or signature
//! failure prints a per-line diagnostic and exits 1.

use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use sentinel_audit::verify_stream;
use sentinel_crypto::LogSigner;

#[derive(Parser, Debug)]
#[command(
    name = "sentinel-verify-logs",
    version,
    about = "Verify the HMAC signatures on a Sentinel decision-log stream"
)]
struct Args {
    /// Decision-log file to verify; reads stdin when omitted.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Signing key as hex (at least 32 bytes).
    #[arg(long)]
    key_hex: String,

    /// Key id the stream was signed under.
    #[arg(long, default_value = "sentinel-audit")]
    key_id: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".parse().expect("static filter parses")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> anyhow::Result<bool> {
    let key = hex::decode(args.key_hex.trim()).context("decoding --key-hex")?;
    let signer = LogSigner::new(key, args.key_id).context("constructing signer")?;

    let report = match &args.log_file {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            verify_stream(BufReader::new(file), &signer)?
        }
        None => verify_stream(BufReader::new(std::io::stdin().lock()), &signer)?,
    };

    for (line, reason) in &report.failures {
        eprintln!("line {line}: {reason}");
    }
    info!(
        lines = report.lines,
        failures = report.failures.len(),
        "verification finished"
    );
    if report.ok() {
        println!("ok: {} lines verified", report.lines);
    } else {
        println!(
            "FAILED: {} of {} lines did not verify",
            report.failures.len(),
            report.lines
        );
    }
    Ok(report.ok())
}
