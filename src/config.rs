use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub heuristic: HeuristicConfig,
    #[serde(default)]
    pub labeling: LabelingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub path: String,
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
}

/// What to do with a row that fails to parse.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Exclude the row and log it.
    #[default]
    Skip,
    /// Fail the whole run.
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub path: String,
}

// ============================================================
// Heuristic Risk Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct HeuristicConfig {
    #[serde(default = "default_heuristic_value_threshold")]
    pub value_threshold_eth: f64,
    #[serde(default = "default_heuristic_gas_threshold")]
    pub gas_threshold: u64,
    #[serde(default = "default_advanced_tx_types")]
    pub advanced_tx_types: Vec<String>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            value_threshold_eth: default_heuristic_value_threshold(),
            gas_threshold: default_heuristic_gas_threshold(),
            advanced_tx_types: default_advanced_tx_types(),
        }
    }
}

fn default_heuristic_value_threshold() -> f64 {
    5.0
}

fn default_heuristic_gas_threshold() -> u64 {
    250_000
}

fn default_advanced_tx_types() -> Vec<String> {
    vec!["0x3".to_string(), "0x4".to_string()]
}

// ============================================================
// Training Label Config
// ============================================================

/// Weighted rule used to bootstrap fraud labels for training.
/// Stored in the model artifact so a model records how its labels were made.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LabelingConfig {
    #[serde(default = "default_label_value_threshold")]
    pub value_threshold_eth: f64,
    #[serde(default = "default_value_weight")]
    pub value_weight: u32,
    #[serde(default = "default_label_gas_threshold")]
    pub gas_threshold: u64,
    #[serde(default = "default_one")]
    pub gas_weight: u32,
    #[serde(default = "default_one")]
    pub contract_deploy_weight: u32,
    #[serde(default = "default_fraud_threshold")]
    pub fraud_threshold: u32,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            value_threshold_eth: default_label_value_threshold(),
            value_weight: default_value_weight(),
            gas_threshold: default_label_gas_threshold(),
            gas_weight: 1,
            contract_deploy_weight: 1,
            fraud_threshold: default_fraud_threshold(),
        }
    }
}

fn default_label_value_threshold() -> f64 {
    2.0
}

fn default_value_weight() -> u32 {
    2
}

fn default_label_gas_threshold() -> u64 {
    200_000
}

fn default_one() -> u32 {
    1
}

fn default_fraud_threshold() -> u32 {
    2
}

// ============================================================
// Model Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// 0 means unlimited depth.
    #[serde(default)]
    pub max_depth: usize,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            n_estimators: default_n_estimators(),
            seed: default_seed(),
            cv_folds: default_cv_folds(),
            max_depth: 0,
            min_samples_split: default_min_samples_split(),
        }
    }
}

fn default_artifact_path() -> String {
    "data/fraud_model.json".to_string()
}

fn default_n_estimators() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

fn default_cv_folds() -> usize {
    5
}

fn default_min_samples_split() -> usize {
    2
}

// ============================================================
// Output Filter Config
// ============================================================

/// Optional restrictions applied to the written output table.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    pub block_number: Option<u64>,
    pub tx_type: Option<String>,
    /// Tier label as written in the output ("Alto", "Medio", "Bajo", "Ninguno").
    pub tier: Option<String>,
    /// Case-insensitive substring of the sender address.
    pub sender: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.input.path.trim().is_empty() {
            return Err(eyre::eyre!("input.path must not be empty"));
        }
        if self.output.path.trim().is_empty() {
            return Err(eyre::eyre!("output.path must not be empty"));
        }
        if self.model.artifact_path.trim().is_empty() {
            return Err(eyre::eyre!("model.artifact_path must not be empty"));
        }
        if self.heuristic.value_threshold_eth.is_nan() || self.heuristic.value_threshold_eth < 0.0 {
            return Err(eyre::eyre!(
                "heuristic.value_threshold_eth must be non-negative, got {}",
                self.heuristic.value_threshold_eth
            ));
        }
        if self.labeling.value_threshold_eth.is_nan() || self.labeling.value_threshold_eth < 0.0 {
            return Err(eyre::eyre!(
                "labeling.value_threshold_eth must be non-negative, got {}",
                self.labeling.value_threshold_eth
            ));
        }
        if self.labeling.fraud_threshold == 0 {
            return Err(eyre::eyre!("labeling.fraud_threshold must be at least 1"));
        }
        if self.model.n_estimators == 0 {
            return Err(eyre::eyre!("model.n_estimators must be at least 1"));
        }
        if self.model.cv_folds < 2 {
            return Err(eyre::eyre!(
                "model.cv_folds must be at least 2, got {}",
                self.model.cv_folds
            ));
        }
        if self.model.min_samples_split < 2 {
            return Err(eyre::eyre!(
                "model.min_samples_split must be at least 2, got {}",
                self.model.min_samples_split
            ));
        }
        Ok(())
    }
}
