use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io::{Seek, SeekFrom},
    path::Path,
    sync::Arc,
};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

pub(crate) const BATCH_SIZE: usize = 8192;

/// Read the header row of `file` and build an all-`Utf8`, nullable schema from it.
/// Leaves the file positioned at the start again.
fn header_schema(file: &mut File, path: &Path) -> Result<Schema> {
    let parse_err = |source| PipelineError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut *file, Some(0)).map_err(parse_err)?;
    if inferred.fields().is_empty() {
        return Err(parse_err(ArrowError::CsvError("missing header row".into())));
    }

    file.seek(SeekFrom::Start(0))
        .map_err(|source| PipelineError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;

    // Every column stays text; no numeric or date coercion.
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    Ok(Schema::new(fields))
}

/// Load a CSV file with a header row into a single in-memory table.
///
/// Columns come from the header, in file order, and are all nullable `Utf8`.
/// Empty fields load as null. Row order is the file order.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| PipelineError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;

    let schema = Arc::new(header_schema(&mut file, path)?);
    debug!(columns = schema.fields().len(), "parsed header");

    let parse_err = |source| PipelineError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .with_quote(b'"')
        .with_delimiter(b',')
        .build(file)
        .map_err(parse_err)?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(parse_err)?);
    }

    let table = concat_batches(&schema, &batches).map_err(parse_err)?;
    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "loaded table"
    );
    Ok(table)
}
