use crate::tx::types::{TransactionRecord, TxType};

use super::types::{RiskSignal, SignalKind};

/// Fires when the transferred amount exceeds the threshold.
/// A NaN value compares false and never fires.
pub fn check_high_value(tx: &TransactionRecord, threshold_eth: f64) -> Option<RiskSignal> {
    if tx.value > threshold_eth {
        return Some(RiskSignal {
            kind: SignalKind::HighValue,
            message: format!("Valor enviado = {:?} ETH > {} ETH", tx.value, threshold_eth),
        });
    }
    None
}

/// Fires when the gas consumed exceeds the threshold.
pub fn check_high_gas(tx: &TransactionRecord, threshold: u64) -> Option<RiskSignal> {
    if tx.gas_used > threshold {
        return Some(RiskSignal {
            kind: SignalKind::HighGas,
            message: format!("Gas usado = {} > {}", tx.gas_used, threshold),
        });
    }
    None
}

/// Fires for contract-creation transactions.
pub fn check_contract_deploy(tx: &TransactionRecord) -> Option<RiskSignal> {
    if tx.contract_deploy {
        return Some(RiskSignal {
            kind: SignalKind::ContractDeploy,
            message: "Es despliegue de contrato".to_string(),
        });
    }
    None
}

/// Fires when the transaction type is one of the advanced variants (blob, set-code).
pub fn check_advanced_tx_type(tx: &TransactionRecord, advanced: &[TxType]) -> Option<RiskSignal> {
    if advanced.contains(&tx.tx_type) {
        return Some(RiskSignal {
            kind: SignalKind::AdvancedTxType,
            message: format!("Tipo avanzado: {}", tx.tx_type),
        });
    }
    None
}
