use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::config::LabelingConfig;
use crate::error::{Result, RiskError};
use crate::features::encoder::{FeatureEncoder, FEATURE_NAMES};

use super::forest::RandomForest;
use super::validation::CrossValidationReport;

/// Bumped whenever the serialized layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

/// Everything inference needs, persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    /// Address codebooks fitted at training time and reused at inference.
    pub encoder: FeatureEncoder,
    pub forest: RandomForest,
    pub cross_validation: CrossValidationReport,
    /// The rule that produced the training labels.
    pub labeling_policy: LabelingConfig,
    pub n_samples: usize,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    /// Write atomically: readers see either the previous file or the complete new one.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let tmp_path = dir.join(format!(".{}.tmp", file_name));

        {
            let mut file = std::fs::File::create(&tmp_path)?;
            serde_json::to_writer(&mut file, self)?;
            file.flush()?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;

        tracing::info!(
            path = %path.display(),
            trees = self.forest.n_estimators(),
            samples = self.n_samples,
            "Saved model artifact"
        );
        Ok(())
    }

    /// Read and validate an artifact against the running feature layout.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_error = |reason: String| RiskError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| load_error(e.to_string()))?;
        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|e| load_error(e.to_string()))?;
        artifact.check_compatible()?;

        tracing::info!(
            path = %path.display(),
            trees = artifact.forest.n_estimators(),
            trained_at = %artifact.trained_at,
            mean_f1 = artifact.cross_validation.mean_f1,
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    pub fn check_compatible(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(RiskError::FeatureMismatch {
                expected: format!("format version {}", FORMAT_VERSION),
                found: format!("format version {}", self.format_version),
            });
        }
        if self.feature_names != FEATURE_NAMES {
            return Err(RiskError::FeatureMismatch {
                expected: format!("{:?}", FEATURE_NAMES),
                found: format!("{:?}", self.feature_names),
            });
        }
        if !self.encoder.from_codebook.is_well_formed() || !self.encoder.to_codebook.is_well_formed() {
            return Err(RiskError::FeatureMismatch {
                expected: "sorted, unique address codebooks".to_string(),
                found: "unsorted or duplicated codebook entries".to_string(),
            });
        }
        self.forest
            .validate()
            .map_err(|reason| RiskError::FeatureMismatch {
                expected: format!("trees over {} features", FEATURE_NAMES.len()),
                found: reason,
            })
    }
}
