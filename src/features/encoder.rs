use serde::{Deserialize, Serialize};

use crate::tx::types::TransactionRecord;

use super::codebook::AddressCodebook;

/// Model input columns, in order.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "value",
    "gasUsed",
    "contract_deploy",
    "from_enc",
    "to_enc",
    "hour",
];

pub const N_FEATURES: usize = 6;

pub type FeatureRow = [f64; N_FEATURES];

/// Encoded feature rows plus bookkeeping about addresses missing from the codebooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedBatch {
    pub rows: Vec<FeatureRow>,
    pub unseen_addresses: usize,
}

/// Turns transaction records into fixed-width numeric rows.
///
/// The address codebooks are fit once and then reused, so training and
/// inference share one encoding when the encoder travels with the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    pub from_codebook: AddressCodebook,
    pub to_codebook: AddressCodebook,
}

impl FeatureEncoder {
    pub fn fit(records: &[TransactionRecord]) -> Self {
        let encoder = Self {
            from_codebook: AddressCodebook::fit(records.iter().map(|tx| Some(tx.from_address.as_str()))),
            to_codebook: AddressCodebook::fit(records.iter().map(|tx| tx.to_address.as_deref())),
        };
        tracing::debug!(
            senders = encoder.from_codebook.len(),
            recipients = encoder.to_codebook.len(),
            "Fitted address codebooks"
        );
        encoder
    }

    pub fn encode(&self, tx: &TransactionRecord) -> (FeatureRow, bool) {
        let from = self.from_codebook.code(Some(tx.from_address.as_str()));
        let to = self.to_codebook.code(tx.to_address.as_deref());
        let unseen = from.is_none() || to.is_none();

        let row = [
            tx.value,
            tx.gas_used as f64,
            if tx.contract_deploy { 1.0 } else { 0.0 },
            from.unwrap_or_else(|| self.from_codebook.unseen_code()) as f64,
            to.unwrap_or_else(|| self.to_codebook.unseen_code()) as f64,
            tx.hour_of_day() as f64,
        ];
        (row, unseen)
    }

    pub fn transform<'a>(&self, records: impl IntoIterator<Item = &'a TransactionRecord>) -> EncodedBatch {
        let mut batch = EncodedBatch::default();
        for tx in records {
            let (row, unseen) = self.encode(tx);
            if unseen {
                batch.unseen_addresses += 1;
            }
            batch.rows.push(row);
        }

        if batch.unseen_addresses > 0 {
            tracing::warn!(
                rows = batch.unseen_addresses,
                "Addresses not present in the fitted codebooks were given the out-of-vocabulary code"
            );
        }
        batch
    }
}
