use arrow::{
    array::{Array, StringArray},
    compute::{cast, concat_batches},
    datatypes::DataType,
    error::ArrowError,
    record_batch::RecordBatch,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{fmt, fs::File, path::Path};
use tracing::{info, warn};

use crate::config::{PipelineConfig, SnapshotFormat};
use crate::error::{PipelineError, Result};
use crate::process::{
    load::{load_table, BATCH_SIZE},
    transform::{apply_normalizer, TextNormalizer},
};

/// One way a snapshot disagrees with its source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
    RowCount { expected: usize, found: usize },
    MissingColumn(String),
    Value {
        column: String,
        row: usize,
        expected: Option<String>,
        found: Option<String>,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::RowCount { expected, found } => {
                write!(f, "row count: expected {}, found {}", expected, found)
            }
            Mismatch::MissingColumn(c) => write!(f, "column `{}` missing from snapshot", c),
            Mismatch::Value {
                column,
                row,
                expected,
                found,
            } => write!(
                f,
                "`{}` row {}: expected {:?}, found {:?}",
                column, row, expected, found
            ),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    pub rows: usize,
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path).map_err(|source| PipelineError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| PipelineError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let external =
        |e: parquet::errors::ParquetError| parse_err(ArrowError::ExternalError(Box::new(e)));

    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(external)?;
    let schema = builder.schema().clone();
    let reader = builder.with_batch_size(BATCH_SIZE).build().map_err(external)?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(parse_err)?);
    }
    concat_batches(&schema, &batches).map_err(parse_err)
}

/// Load a snapshot written in `format`.
pub fn read_snapshot(path: &Path, format: SnapshotFormat) -> Result<RecordBatch> {
    match format {
        SnapshotFormat::Csv => load_table(path),
        SnapshotFormat::Parquet => read_parquet(path),
    }
}

fn text_column(batch: &RecordBatch, name: &str) -> Option<StringArray> {
    let col = batch.column_by_name(name)?;
    let col = if col.data_type() == &DataType::Utf8 {
        col.clone()
    } else {
        cast(col, &DataType::Utf8).ok()?
    };
    col.as_any().downcast_ref::<StringArray>().cloned()
}

fn value(arr: &StringArray, row: usize) -> Option<String> {
    if arr.is_null(row) {
        None
    } else {
        Some(arr.value(row).to_string())
    }
}

/// Compare `snapshot` with what the pipeline should have produced from `source`.
pub fn compare(
    source: &RecordBatch,
    snapshot: &RecordBatch,
    cfg: &PipelineConfig,
    normalizer: &dyn TextNormalizer,
) -> Result<VerifyReport> {
    let expected = apply_normalizer(source, &cfg.source_column, &cfg.target_column, normalizer)?;
    let mut report = VerifyReport {
        rows: snapshot.num_rows(),
        mismatches: Vec::new(),
    };

    if expected.num_rows() != snapshot.num_rows() {
        report.mismatches.push(Mismatch::RowCount {
            expected: expected.num_rows(),
            found: snapshot.num_rows(),
        });
        return Ok(report);
    }

    for field in expected.schema().fields() {
        let name = field.name();
        let (want, got) = match (text_column(&expected, name), text_column(snapshot, name)) {
            (Some(w), Some(g)) => (w, g),
            _ => {
                report.mismatches.push(Mismatch::MissingColumn(name.clone()));
                continue;
            }
        };
        for row in 0..want.len() {
            let (e, f) = (value(&want, row), value(&got, row));
            if e != f {
                report.mismatches.push(Mismatch::Value {
                    column: name.clone(),
                    row,
                    expected: e,
                    found: f,
                });
            }
        }
    }
    Ok(report)
}

/// Re-read the source and the snapshot named by `cfg` and check they agree.
#[tracing::instrument(level = "info", skip(cfg, normalizer), fields(input = %cfg.input.display()))]
pub fn verify_snapshot(
    cfg: &PipelineConfig,
    normalizer: &dyn TextNormalizer,
) -> Result<VerifyReport> {
    let source = load_table(&cfg.input)?;
    let snapshot = read_snapshot(&cfg.snapshot_path(), cfg.format)?;
    let report = compare(&source, &snapshot, cfg, normalizer)?;

    if report.is_clean() {
        info!(rows = report.rows, "snapshot matches source");
    } else {
        warn!(
            rows = report.rows,
            mismatches = report.mismatches.len(),
            "snapshot differs from source"
        );
    }
    Ok(report)
}
