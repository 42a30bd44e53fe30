//! Training-time fraud labels.
//!
//! There is no independently sourced ground truth, so labels are bootstrapped
//! from a weighted rule. This rule is deliberately separate from the
//! four-condition tiering in [`crate::risk::engine`]: thresholds and weights
//! differ and the transaction type plays no part.

use crate::config::LabelingConfig;
use crate::tx::types::TransactionRecord;

/// Weighted score and derived label for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FraudLabel {
    pub score: u32,
    pub is_fraud: bool,
}

pub struct FraudLabeler {
    config: LabelingConfig,
}

impl FraudLabeler {
    pub fn new(config: LabelingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LabelingConfig {
        &self.config
    }

    pub fn label(&self, tx: &TransactionRecord) -> FraudLabel {
        let mut score = 0;
        if tx.value > self.config.value_threshold_eth {
            score += self.config.value_weight;
        }
        if tx.gas_used > self.config.gas_threshold {
            score += self.config.gas_weight;
        }
        if tx.contract_deploy {
            score += self.config.contract_deploy_weight;
        }
        FraudLabel {
            score,
            is_fraud: score >= self.config.fraud_threshold,
        }
    }

    /// Label every record and log the class balance.
    pub fn label_all(&self, records: &[TransactionRecord]) -> Vec<bool> {
        let labels: Vec<bool> = records.iter().map(|tx| self.label(tx).is_fraud).collect();
        let fraud = labels.iter().filter(|&&l| l).count();
        tracing::info!(
            fraud,
            legitimate = labels.len() - fraud,
            "Generated training labels"
        );
        labels
    }
}

impl Default for FraudLabeler {
    fn default() -> Self {
        Self::new(LabelingConfig::default())
    }
}
