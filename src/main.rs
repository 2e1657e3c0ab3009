use anyhow::{Context, Result};
use std::path::PathBuf;
use ticketprep::{process, PipelineConfig};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ticketprep=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) configure paths ──────────────────────────────────────────
    // optional YAML config; defaults are data/raw → data/processed
    let cfg_path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = PipelineConfig::load(cfg_path.as_deref()).context("loading config")?;
    info!(input = %cfg.input.display(), output_dir = %cfg.output_dir.display(), version = %cfg.version, "configured");

    // ─── 3) load → derive → snapshot ────────────────────────────────
    let report = process::run(&cfg)
        .with_context(|| format!("snapshotting {}", cfg.input.display()))?;

    println!("Snapshot saved to {}", report.path.display());
    Ok(())
}
