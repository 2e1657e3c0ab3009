use arrow::{
    array::{ArrayRef, StringArray},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const SOURCE_COLUMN: &str = "ticket_text";
pub const TARGET_COLUMN: &str = "text_norm_v1";

/// A value-by-value rewrite of one text column into another.
///
/// Nulls are passed to `normalize` as `None` so a rule decides for itself
/// whether missing text stays missing.
pub trait TextNormalizer {
    fn name(&self) -> &str;

    fn normalize(&self, text: Option<&str>) -> Option<String>;

    /// Apply the rule to a whole column.
    fn apply(&self, column: &StringArray) -> ArrayRef {
        let out: StringArray = column.iter().map(|v| self.normalize(v)).collect();
        Arc::new(out)
    }
}

/// Copies text through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl TextNormalizer for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn normalize(&self, text: Option<&str>) -> Option<String> {
        text.map(str::to_string)
    }

    fn apply(&self, column: &StringArray) -> ArrayRef {
        // same buffers, same null mask
        Arc::new(column.clone())
    }
}

/// Return `batch` with `target` set to `normalizer(source)` for every row.
///
/// An existing `target` column is replaced where it stands; otherwise the new
/// column goes last. All other columns are shared with the input untouched.
pub fn apply_normalizer(
    batch: &RecordBatch,
    source: &str,
    target: &str,
    normalizer: &dyn TextNormalizer,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let src_idx = schema
        .index_of(source)
        .map_err(|_| PipelineError::MissingColumn {
            column: source.to_string(),
        })?;

    let src = batch.column(src_idx);
    let text: ArrayRef = if src.data_type() == &DataType::Utf8 {
        src.clone()
    } else {
        cast(src, &DataType::Utf8).map_err(|e| PipelineError::Transform {
            column: target.to_string(),
            source: e,
        })?
    };
    let text = text
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PipelineError::Transform {
            column: target.to_string(),
            source: ArrowError::CastError(format!("`{source}` is not a text column")),
        })?;

    let derived = normalizer.apply(text);
    let derived_field = Arc::new(Field::new(target, DataType::Utf8, true));

    let mut fields = schema.fields().to_vec();
    let mut columns = batch.columns().to_vec();
    match schema.index_of(target) {
        Ok(idx) => {
            fields[idx] = derived_field;
            columns[idx] = derived;
        }
        Err(_) => {
            fields.push(derived_field);
            columns.push(derived);
        }
    }

    debug!(
        normalizer = normalizer.name(),
        source, target, "derived column"
    );

    let out_schema = Arc::new(Schema::new_with_metadata(
        fields,
        schema.metadata().clone(),
    ));
    RecordBatch::try_new(out_schema, columns).map_err(|e| PipelineError::Transform {
        column: target.to_string(),
        source: e,
    })
}

/// The fixed first-phase stage: `text_norm_v1` as a copy of `ticket_text`.
pub fn derive_text_norm_v1(batch: &RecordBatch) -> Result<RecordBatch> {
    apply_normalizer(batch, SOURCE_COLUMN, TARGET_COLUMN, &Identity)
}
