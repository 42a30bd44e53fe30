use thiserror::Error;

/// Domain failures raised by the scoring, training and inference stages.
#[derive(Debug, Error)]
pub enum RiskError {
    /// A row could not be parsed into a transaction record.
    #[error("Malformed record at line {line}: field '{field}' {reason}")]
    MalformedRecord {
        line: u64,
        field: &'static str,
        reason: String,
    },

    /// Training was asked to stratify a label set that cannot be stratified:
    /// one class is missing or has fewer members than there are folds.
    #[error("Degenerate label set: {count} {class} labels, every fold needs both classes")]
    DegenerateLabelSet { class: &'static str, count: usize },

    #[error("Training set is empty")]
    EmptyTrainingSet,

    /// The persisted model is missing or unreadable.
    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    /// The persisted model was fit against a different feature layout.
    #[error("Feature layout mismatch: expected {expected}, found {found}")]
    FeatureMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RiskError>;

impl RiskError {
    pub fn malformed(line: u64, field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            field,
            reason: reason.into(),
        }
    }

    /// Whether the pipeline may continue by dropping the offending row.
    pub fn is_row_level(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}
