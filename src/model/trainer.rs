use chrono::Utc;

use crate::config::ModelConfig;
use crate::error::{Result, RiskError};
use crate::features::encoder::{FeatureEncoder, FEATURE_NAMES};
use crate::labeling::FraudLabeler;
use crate::tx::types::TransactionRecord;

use super::artifact::{ModelArtifact, FORMAT_VERSION};
use super::forest::{ForestParams, RandomForest};
use super::validation::cross_validate;

/// Fits the fraud classifier on heuristic labels.
pub struct ModelTrainer {
    config: ModelConfig,
    labeler: FraudLabeler,
}

impl ModelTrainer {
    pub fn new(config: ModelConfig, labeler: FraudLabeler) -> Self {
        Self { config, labeler }
    }

    /// Label, cross-validate, then refit on the full set.
    ///
    /// Fails with `DegenerateLabelSet` before any fitting when the labels
    /// cannot be stratified into the configured number of folds.
    pub fn train(&self, records: &[TransactionRecord]) -> Result<ModelArtifact> {
        if records.is_empty() {
            return Err(RiskError::EmptyTrainingSet);
        }

        let labels = self.labeler.label_all(records);
        let encoder = FeatureEncoder::fit(records);
        let rows = encoder.transform(records).rows;
        let params = ForestParams::from(&self.config);

        let report = cross_validate(&rows, &labels, self.config.cv_folds, params)?;
        tracing::info!(
            folds = self.config.cv_folds,
            mean_f1 = report.mean_f1,
            std_f1 = report.std_f1,
            "Cross-validation complete"
        );

        let forest = RandomForest::fit(&rows, &labels, params);
        for (name, importance) in FEATURE_NAMES.iter().zip(forest.feature_importances()) {
            tracing::debug!(feature = name, importance, "Feature importance");
        }

        Ok(ModelArtifact {
            format_version: FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            encoder,
            forest,
            cross_validation: report,
            labeling_policy: self.labeler.config().clone(),
            n_samples: records.len(),
            trained_at: Utc::now(),
        })
    }

    /// Train and persist to the configured artifact path.
    pub fn train_and_save(&self, records: &[TransactionRecord]) -> Result<ModelArtifact> {
        let artifact = self.train(records)?;
        artifact.save(&self.config.artifact_path)?;
        Ok(artifact)
    }
}
