use std::path::Path;

use crate::error::Result;
use crate::tx::types::TransactionRecord;

use super::artifact::ModelArtifact;

/// Model verdict for one transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub is_fraud: bool,
    /// Fraction of trees voting fraud.
    pub fraud_probability: f64,
}

impl Prediction {
    /// Value of the `Riesgo_IA` output column.
    pub fn category(&self) -> &'static str {
        if self.is_fraud {
            "Fraude (IA)"
        } else {
            "Legítimo"
        }
    }
}

/// Applies a persisted model to new transactions. Never retrains.
pub struct InferenceEngine {
    artifact: ModelArtifact,
}

impl InferenceEngine {
    /// Fails with `ModelLoad` or `FeatureMismatch`; there is no fallback model.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            artifact: ModelArtifact::load(path)?,
        })
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        artifact.check_compatible()?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Predict every record, in input order. Addresses unknown to the
    /// training codebooks are encoded with the out-of-vocabulary code.
    pub fn predict<'a>(&self, records: impl IntoIterator<Item = &'a TransactionRecord>) -> Vec<Prediction> {
        let batch = self.artifact.encoder.transform(records);
        let predictions: Vec<Prediction> = batch
            .rows
            .iter()
            .map(|row| {
                let fraud_probability = self.artifact.forest.predict_proba(row);
                Prediction {
                    is_fraud: fraud_probability > 0.5,
                    fraud_probability,
                }
            })
            .collect();

        let fraud = predictions.iter().filter(|p| p.is_fraud).count();
        tracing::info!(
            records = predictions.len(),
            fraud,
            unseen_addresses = batch.unseen_addresses,
            "Model inference complete"
        );
        predictions
    }
}
