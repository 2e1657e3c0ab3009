use arrow::{csv::WriterBuilder, error::ArrowError, record_batch::RecordBatch};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::config::{PipelineConfig, SnapshotFormat};
use crate::error::{PipelineError, Result};

/// What a successful snapshot wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotReport {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

fn write_csv(batch: &RecordBatch, out: &mut File) -> std::result::Result<(), ArrowError> {
    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(out));
    writer.write(batch)?;
    writer.into_inner().flush()?;
    Ok(())
}

fn write_parquet(
    batch: &RecordBatch,
    out: &mut File,
) -> std::result::Result<(), parquet::errors::ParquetError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(out, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `batch` to `path` in `format`, replacing any existing file atomically.
///
/// The bytes go to a hidden temp file next to `path` which is renamed over it
/// once complete, so readers never see a half-written snapshot and a failed
/// write leaves the previous one in place.
pub fn write_table(batch: &RecordBatch, path: &Path, format: SnapshotFormat) -> Result<u64> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".into());

    let prefix = format!(".{}.", file_name);
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    let mut tmp = builder
        .tempfile_in(&dir)
        .map_err(|e| PipelineError::write(path, e))?;
    debug!(tmp = %tmp.path().display(), "staging snapshot");

    match format {
        SnapshotFormat::Csv => {
            write_csv(batch, tmp.as_file_mut()).map_err(|e| PipelineError::write(path, e))?
        }
        SnapshotFormat::Parquet => {
            write_parquet(batch, tmp.as_file_mut()).map_err(|e| PipelineError::write(path, e))?
        }
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| PipelineError::write(path, e))?;

    // an error here drops the temp file, which deletes it
    tmp.persist(path)
        .map_err(|e| PipelineError::write(path, e.error))?;

    let bytes = fs::metadata(path)
        .map_err(|e| PipelineError::write(path, e))?
        .len();
    Ok(bytes)
}

/// Write the versioned snapshot for `cfg` and report where it landed.
#[tracing::instrument(level = "info", skip(batch, cfg), fields(version = %cfg.version))]
pub fn write_snapshot(batch: &RecordBatch, cfg: &PipelineConfig) -> Result<SnapshotReport> {
    let path = cfg.snapshot_path();
    let bytes = write_table(batch, &path, cfg.format)?;

    info!(
        path = %path.display(),
        rows = batch.num_rows(),
        bytes,
        "snapshot written"
    );
    Ok(SnapshotReport {
        path,
        rows: batch.num_rows(),
        bytes,
    })
}
