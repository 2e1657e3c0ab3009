// src/bin/verify_snapshot.rs

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use ticketprep::{process, PipelineConfig};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cfg_path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = PipelineConfig::load(cfg_path.as_deref()).context("loading config")?;
    let snapshot = cfg.snapshot_path();

    let report = process::verify_snapshot(&cfg, &process::Identity)
        .with_context(|| format!("verifying {}", snapshot.display()))?;

    println!("{: <12} {}", "Source", cfg.input.display());
    println!("{: <12} {}", "Snapshot", snapshot.display());
    println!("{: <12} {}", "Rows", report.rows);
    println!("{:-<55}", "");

    if report.is_clean() {
        println!("✅ snapshot matches source");
        return Ok(());
    }

    for m in report.mismatches.iter().take(20) {
        println!("✗ {}", m);
    }
    if report.mismatches.len() > 20 {
        println!("… and {} more", report.mismatches.len() - 20);
    }
    bail!("{} mismatches in {}", report.mismatches.len(), snapshot.display())
}
