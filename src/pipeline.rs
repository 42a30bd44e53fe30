use serde::Serialize;
use std::path::Path;

use crate::config::{Config, FilterConfig};
use crate::labeling::FraudLabeler;
use crate::model::artifact::ModelArtifact;
use crate::model::inference::{InferenceEngine, Prediction};
use crate::model::trainer::ModelTrainer;
use crate::risk::engine::{BatchSummary, RiskEngine};
use crate::risk::types::{RiskAssessment, RiskTier};
use crate::tx::loader::{self, TIMESTAMP_FORMAT};
use crate::tx::types::{TransactionRecord, TxType};

/// A transaction with everything the pipeline attached to it.
#[derive(Debug, Clone)]
pub struct ScoredTransaction {
    pub record: TransactionRecord,
    pub assessment: RiskAssessment,
    /// Set only after inference.
    pub prediction: Option<Prediction>,
}

/// One line of the augmented output table.
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    #[serde(rename = "blockNumber")]
    block_number: u64,
    timestamp: String,
    from: &'a str,
    to: &'a str,
    value: f64,
    #[serde(rename = "gasUsed")]
    gas_used: u64,
    tx_type: &'a str,
    tx_type_desc: &'static str,
    contract_deploy: u8,
    hash: &'a str,
    #[serde(rename = "Riesgo")]
    riesgo: RiskTier,
    #[serde(rename = "Explicacion")]
    explicacion: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fraude_ia: Option<u8>,
    #[serde(rename = "Riesgo_IA", skip_serializing_if = "Option::is_none")]
    riesgo_ia: Option<&'static str>,
}

impl<'a> From<&'a ScoredTransaction> for OutputRow<'a> {
    fn from(scored: &'a ScoredTransaction) -> Self {
        let tx = &scored.record;
        Self {
            block_number: tx.block_number,
            timestamp: tx.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            from: &tx.from_address,
            to: tx.to_address.as_deref().unwrap_or(""),
            value: tx.value,
            gas_used: tx.gas_used,
            tx_type: tx.tx_type.code(),
            tx_type_desc: tx.tx_type.description(),
            contract_deploy: tx.contract_deploy as u8,
            hash: &tx.hash,
            riesgo: scored.assessment.tier,
            explicacion: &scored.assessment.justification,
            fraude_ia: scored.prediction.map(|p| p.is_fraud as u8),
            riesgo_ia: scored.prediction.map(|p| p.category()),
        }
    }
}

/// Browsing filters over scored rows. Every set criterion must match.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub block_number: Option<u64>,
    pub tx_type: Option<TxType>,
    pub tier: Option<RiskTier>,
    /// Lower-cased substring of the sender.
    pub sender: Option<String>,
}

impl RecordFilter {
    pub fn from_config(config: &FilterConfig) -> eyre::Result<Self> {
        let tier = match &config.tier {
            Some(label) => Some(RiskTier::from_label(label).ok_or_else(|| {
                eyre::eyre!(
                    "Unknown tier '{}' in filter, expected one of Alto, Medio, Bajo, Ninguno",
                    label
                )
            })?),
            None => None,
        };
        Ok(Self {
            block_number: config.block_number,
            tx_type: config.tx_type.as_deref().map(TxType::from_code),
            tier,
            sender: config
                .sender
                .as_ref()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
        })
    }

    pub fn matches(&self, scored: &ScoredTransaction) -> bool {
        let tx = &scored.record;
        self.block_number.map_or(true, |b| tx.block_number == b)
            && self.tx_type.as_ref().map_or(true, |t| &tx.tx_type == t)
            && self.tier.map_or(true, |t| scored.assessment.tier == t)
            && self
                .sender
                .as_ref()
                .map_or(true, |s| tx.from_address.to_ascii_lowercase().contains(s.as_str()))
    }

    pub fn apply<'a>(&self, rows: &'a [ScoredTransaction]) -> Vec<&'a ScoredTransaction> {
        rows.iter().filter(|row| self.matches(row)).collect()
    }
}

/// Orchestrates the score, train and predict flows:
/// 1. Load and validate the input table
/// 2. Heuristic scoring
/// 3. Training (labels → features → cross-validation → artifact) or inference
/// 4. Writing the augmented table
pub struct RiskPipeline {
    config: Config,
    engine: RiskEngine,
}

impl RiskPipeline {
    pub fn new(config: Config) -> Self {
        let engine = RiskEngine::new(config.heuristic.clone());
        Self { config, engine }
    }

    pub fn load_records(&self) -> eyre::Result<Vec<TransactionRecord>> {
        let report = loader::load_transactions(&self.config.input.path, self.config.input.on_malformed)
            .map_err(|e| eyre::eyre!("Failed to load '{}': {}", self.config.input.path, e))?;
        if !report.skipped.is_empty() {
            tracing::warn!(skipped = report.skipped.len(), "Malformed rows were excluded");
        }
        Ok(report.records)
    }

    pub fn score(&self, records: Vec<TransactionRecord>) -> (Vec<ScoredTransaction>, BatchSummary) {
        let (assessments, summary) = self.engine.assess_batch(&records);
        let scored = records
            .into_iter()
            .zip(assessments)
            .map(|(record, assessment)| ScoredTransaction {
                record,
                assessment,
                prediction: None,
            })
            .collect();
        (scored, summary)
    }

    pub fn train(&self, records: &[TransactionRecord]) -> eyre::Result<ModelArtifact> {
        let trainer = ModelTrainer::new(
            self.config.model.clone(),
            FraudLabeler::new(self.config.labeling.clone()),
        );
        let artifact = trainer.train_and_save(records)?;
        Ok(artifact)
    }

    pub fn load_model(&self) -> eyre::Result<InferenceEngine> {
        Ok(InferenceEngine::load(&self.config.model.artifact_path)?)
    }

    /// Attach model predictions alongside the heuristic tiers.
    pub fn predict(&self, scored: &mut [ScoredTransaction], model: &InferenceEngine) {
        let predictions = model.predict(scored.iter().map(|s| &s.record));
        for (row, prediction) in scored.iter_mut().zip(predictions) {
            row.prediction = Some(prediction);
        }
    }

    /// Write the rows passing the configured filter to the output path.
    /// The model columns are present whenever the batch went through inference,
    /// even if the filter leaves no rows.
    pub fn write_output(&self, scored: &[ScoredTransaction]) -> eyre::Result<usize> {
        let filter = RecordFilter::from_config(&self.config.filter)?;
        let with_predictions = scored.iter().any(|s| s.prediction.is_some());
        write_scored(&self.config.output.path, &filter.apply(scored), with_predictions)
    }
}

/// Header of the augmented table, without the model columns.
pub const OUTPUT_COLUMNS: [&str; 12] = [
    "blockNumber",
    "timestamp",
    "from",
    "to",
    "value",
    "gasUsed",
    "tx_type",
    "tx_type_desc",
    "contract_deploy",
    "hash",
    "Riesgo",
    "Explicacion",
];

pub const PREDICTION_COLUMNS: [&str; 2] = ["fraude_ia", "Riesgo_IA"];

pub fn write_scored(
    path: impl AsRef<Path>,
    rows: &[&ScoredTransaction],
    with_predictions: bool,
) -> eyre::Result<usize> {
    let mut header = OUTPUT_COLUMNS.to_vec();
    if with_predictions {
        header.extend(PREDICTION_COLUMNS);
    }
    let output: Vec<OutputRow> = rows.iter().map(|row| OutputRow::from(*row)).collect();
    loader::write_csv(path, &header, &output)?;
    Ok(output.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(value: f64, gas_used: u64, contract_deploy: bool, tx_type: &str, from: &str) -> ScoredTransaction {
        let mut record = TransactionRecord::sample(value, gas_used, contract_deploy, tx_type);
        record.from_address = from.to_string();
        ScoredTransaction {
            assessment: RiskEngine::default().assess(&record),
            record,
            prediction: None,
        }
    }

    #[test]
    fn test_filter_by_tier_and_sender() {
        let rows = vec![
            scored(6.0, 300_000, true, "0x4", "0xABCdef"),
            scored(1.0, 0, false, "0x0", "0xabc123"),
            scored(6.0, 0, false, "0x2", "0x999"),
        ];

        let filter = RecordFilter::from_config(&FilterConfig {
            sender: Some("ABC".to_string()),
            ..FilterConfig::default()
        })
        .unwrap();
        assert_eq!(filter.apply(&rows).len(), 2);

        let filter = RecordFilter::from_config(&FilterConfig {
            tier: Some("Alto".to_string()),
            ..FilterConfig::default()
        })
        .unwrap();
        let hits = filter.apply(&rows);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.from_address, "0xABCdef");
    }

    #[test]
    fn test_filter_by_block_and_type() {
        let mut rows = vec![scored(1.0, 0, false, "0x2", "0x1"), scored(1.0, 0, false, "0x3", "0x2")];
        rows[1].record.block_number = 77;

        let filter = RecordFilter::from_config(&FilterConfig {
            block_number: Some(77),
            tx_type: Some("0x3".to_string()),
            ..FilterConfig::default()
        })
        .unwrap();
        let hits = filter.apply(&rows);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.block_number, 77);
    }

    #[test]
    fn test_unknown_tier_label_is_rejected() {
        let result = RecordFilter::from_config(&FilterConfig {
            tier: Some("Critical".to_string()),
            ..FilterConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_output_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut row = scored(6.0, 300_000, true, "0x4", "0xaa");
        row.prediction = Some(Prediction {
            is_fraud: true,
            fraud_probability: 0.9,
        });

        write_scored(&path, &[&row], true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert_eq!(
            header,
            "blockNumber,timestamp,from,to,value,gasUsed,tx_type,tx_type_desc,contract_deploy,hash,Riesgo,Explicacion,fraude_ia,Riesgo_IA"
        );
        assert_eq!(header, [&OUTPUT_COLUMNS[..], &PREDICTION_COLUMNS[..]].concat().join(","));
        let data = lines.next().unwrap();
        assert!(data.starts_with("1,2024-01-01 00:00:00,0xaa,,6.0,300000,0x4,SetCode (EIP-7702),1,0x01,Alto,"));
        assert!(data.ends_with(",1,Fraude (IA)"));
    }

    #[test]
    fn test_empty_output_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        assert_eq!(write_scored(&path, &[], false).unwrap(), 0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), OUTPUT_COLUMNS.join(","));

        assert_eq!(write_scored(&path, &[], true).unwrap(), 0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_end().ends_with(",Explicacion,fraude_ia,Riesgo_IA"));
    }
}
