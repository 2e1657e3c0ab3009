use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{PipelineError, Result};
use crate::process::transform::{SOURCE_COLUMN, TARGET_COLUMN};

/// Serialization used for the snapshot file.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Csv,
    Parquet,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Csv => "csv",
            SnapshotFormat::Parquet => "parquet",
        }
    }
}

/// Everything one run needs to know. The defaults point at the conventional
/// `data/raw` → `data/processed` layout.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// CSV file to load.
    pub input: PathBuf,
    /// Directory the snapshot is written into (created if missing).
    pub output_dir: PathBuf,
    /// Version tag, the filename prefix of the snapshot.
    pub version: String,
    /// Dataset name used in the snapshot filename. Derived from `input` when unset.
    pub dataset: Option<String>,
    pub source_column: String,
    pub target_column: String,
    pub format: SnapshotFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/raw/telco_support_tickets_dataset.csv"),
            output_dir: PathBuf::from("data/processed"),
            version: "v1".into(),
            dataset: None,
            source_column: SOURCE_COLUMN.into(),
            target_column: TARGET_COLUMN.into(),
            format: SnapshotFormat::Csv,
        }
    }
}

impl PipelineConfig {
    /// Default config reading `input` and writing under `output_dir`.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Read a YAML config file. Missing keys fall back to the defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Self = serde_yaml::from_str(&text).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    /// Config from an optional YAML path, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_yaml_file(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        let bad = |message: &str| -> Result<()> {
            Err(PipelineError::Config {
                path: origin.to_path_buf(),
                message: message.to_string(),
            })
        };
        if self.version.trim().is_empty() {
            return bad("`version` must not be empty");
        }
        if self.version.contains(['/', '\\']) {
            return bad("`version` must not contain path separators");
        }
        if let Some(dataset) = &self.dataset {
            if dataset.trim().is_empty() {
                return bad("`dataset` must not be empty");
            }
            if dataset.contains(['/', '\\']) {
                return bad("`dataset` must not contain path separators");
            }
        }
        if self.source_column.is_empty() || self.target_column.is_empty() {
            return bad("column names must not be empty");
        }
        Ok(())
    }

    /// Dataset name: explicit, or the input stem minus a trailing `_dataset`.
    pub fn dataset_name(&self) -> String {
        if let Some(name) = &self.dataset {
            return name.clone();
        }
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset".to_string());
        match stem.strip_suffix("_dataset") {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => stem,
        }
    }

    /// `<output_dir>/<version>_<dataset>_snapshot.<ext>`
    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_snapshot.{}",
            self.version,
            self.dataset_name(),
            self.format.extension()
        ))
    }
}
