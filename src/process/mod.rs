// src/process/mod.rs
//! Load → derive → snapshot for support-ticket tables.

pub mod load;
pub mod snapshot;
pub mod transform;
pub mod verify;

use std::time::Instant;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::Result;

pub use load::load_table;
pub use snapshot::{write_snapshot, SnapshotReport};
pub use transform::{apply_normalizer, derive_text_norm_v1, Identity, TextNormalizer};
pub use verify::{verify_snapshot, Mismatch, VerifyReport};

/// Run the whole pipeline with the identity rule.
pub fn run(cfg: &PipelineConfig) -> Result<SnapshotReport> {
    run_with(cfg, &Identity)
}

/// Run the whole pipeline, deriving `cfg.target_column` with `normalizer`.
///
/// Nothing is written unless load and transform both succeed.
#[tracing::instrument(level = "info", skip(cfg, normalizer), fields(input = %cfg.input.display(), normalizer = normalizer.name()))]
pub fn run_with(cfg: &PipelineConfig, normalizer: &dyn TextNormalizer) -> Result<SnapshotReport> {
    let start = Instant::now();

    let result = load_table(&cfg.input)
        .and_then(|table| {
            apply_normalizer(&table, &cfg.source_column, &cfg.target_column, normalizer)
        })
        .and_then(|table| write_snapshot(&table, cfg));

    match &result {
        Ok(report) => info!(
            path = %report.path.display(),
            rows = report.rows,
            elapsed = ?start.elapsed(),
            "pipeline done"
        ),
        Err(e) => error!(stage = e.stage(), "pipeline failed: {}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotFormat;
    use crate::error::PipelineError;
    use anyhow::Result;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,ticketprep::process=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    /// Temp workspace with `raw/tickets_dataset.csv` holding `content`.
    fn workspace(content: &str) -> Result<(TempDir, PipelineConfig)> {
        let dir = tempdir()?;
        let raw = dir.path().join("raw");
        fs::create_dir_all(&raw)?;
        let input = raw.join("tickets_dataset.csv");
        fs::write(&input, content)?;
        let cfg = PipelineConfig::new(input, dir.path().join("processed"));
        Ok((dir, cfg))
    }

    const TICKETS: &str = "id,ticket_text\n1,\"Cannot connect to wifi\"\n2,\"\"\n3,\n";

    #[test]
    fn snapshot_mirrors_ticket_text() -> Result<()> {
        init_test_logging();
        let (_dir, cfg) = workspace(TICKETS)?;

        let report = run(&cfg)?;
        assert_eq!(
            report.path,
            cfg.output_dir.join("v1_tickets_snapshot.csv")
        );
        assert_eq!(report.rows, 3);

        let written = fs::read_to_string(&report.path)?;
        assert_eq!(
            written,
            "id,ticket_text,text_norm_v1\n\
             1,Cannot connect to wifi,Cannot connect to wifi\n\
             2,,\n\
             3,,\n"
        );
        Ok(())
    }

    #[test]
    fn header_only_input_gives_header_only_snapshot() -> Result<()> {
        init_test_logging();
        let (_dir, cfg) = workspace("id,ticket_text\n")?;

        let report = run(&cfg)?;
        assert_eq!(report.rows, 0);
        assert_eq!(
            fs::read_to_string(&report.path)?,
            "id,ticket_text,text_norm_v1\n"
        );
        Ok(())
    }

    #[test]
    fn reruns_are_byte_identical() -> Result<()> {
        init_test_logging();
        let (_dir, cfg) = workspace(
            "id,ticket_text,channel\n\
             7,\"Line 1\nLine 2\",email\n\
             8,\"She said \"\"hi\"\"\",chat\n\
             9,plain,\n",
        )?;

        let first = fs::read(run(&cfg)?.path)?;
        let second = fs::read(run(&cfg)?.path)?;
        assert_eq!(first, second);

        // and the snapshot reloads to the same derived values
        let report = verify_snapshot(&cfg, &Identity)?;
        assert!(report.is_clean(), "{:?}", report.mismatches);
        assert_eq!(report.rows, 3);
        Ok(())
    }

    #[test]
    fn missing_ticket_text_writes_nothing() -> Result<()> {
        init_test_logging();
        let (_dir, cfg) = workspace("id,body\n1,hello\n")?;

        let err = run(&cfg).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }), "{err}");
        assert!(!cfg.snapshot_path().exists());
        assert!(!cfg.output_dir.exists());
        Ok(())
    }

    #[test]
    fn missing_input_writes_nothing() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let cfg = PipelineConfig::new(dir.path().join("nope.csv"), dir.path().join("out"));

        let err = run(&cfg).unwrap_err();
        assert!(matches!(err, PipelineError::FileAccess { .. }), "{err}");
        assert!(!Path::new(&cfg.output_dir).exists());
        Ok(())
    }

    #[test]
    fn parquet_snapshot_verifies() -> Result<()> {
        init_test_logging();
        let (_dir, mut cfg) = workspace(TICKETS)?;
        cfg.format = SnapshotFormat::Parquet;

        let report = run(&cfg)?;
        assert_eq!(
            report.path.extension().and_then(|e| e.to_str()),
            Some("parquet")
        );

        let check = verify_snapshot(&cfg, &Identity)?;
        assert!(check.is_clean(), "{:?}", check.mismatches);
        assert_eq!(check.rows, 3);
        Ok(())
    }

    #[test]
    fn verify_flags_a_hand_edited_snapshot() -> Result<()> {
        init_test_logging();
        let (_dir, cfg) = workspace(TICKETS)?;
        let report = run(&cfg)?;

        let edited = fs::read_to_string(&report.path)?.replace(
            "1,Cannot connect to wifi,Cannot connect to wifi",
            "1,Cannot connect to wifi,cannot connect to wifi",
        );
        fs::write(&report.path, edited)?;

        let check = verify_snapshot(&cfg, &Identity)?;
        assert_eq!(
            check.mismatches,
            vec![Mismatch::Value {
                column: "text_norm_v1".into(),
                row: 0,
                expected: Some("Cannot connect to wifi".into()),
                found: Some("cannot connect to wifi".into()),
            }]
        );
        Ok(())
    }
}
