use chrono::{DateTime, Timelike, Utc};
use std::fmt;

/// EIP-2718 transaction type, as carried by the `tx_type` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TxType {
    Legacy,
    AccessList,
    DynamicFee,
    Blob,
    SetCode,
    /// Any code outside the five known variants. Kept verbatim for output.
    Unknown(String),
}

impl TxType {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "0x0" => Self::Legacy,
            "0x1" => Self::AccessList,
            "0x2" => Self::DynamicFee,
            "0x3" => Self::Blob,
            "0x4" => Self::SetCode,
            _ => Self::Unknown(code.trim().to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Legacy => "0x0",
            Self::AccessList => "0x1",
            Self::DynamicFee => "0x2",
            Self::Blob => "0x3",
            Self::SetCode => "0x4",
            Self::Unknown(code) => code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Legacy => "Legacy (pre-EIP)",
            Self::AccessList => "Access List (EIP-2930)",
            Self::DynamicFee => "Dynamic Fees (EIP-1559)",
            Self::Blob => "Blob (EIP-4844)",
            Self::SetCode => "SetCode (EIP-7702)",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One row of the input transaction table.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub from_address: String,
    /// `None` for contract deployments.
    pub to_address: Option<String>,
    /// Amount in ETH.
    pub value: f64,
    pub gas_used: u64,
    pub tx_type: TxType,
    pub contract_deploy: bool,
    pub hash: String,
}

impl TransactionRecord {
    pub fn hour_of_day(&self) -> u32 {
        self.timestamp.hour()
    }
}

#[cfg(test)]
impl TransactionRecord {
    /// Fixture with the four scoring inputs set and everything else fixed.
    pub(crate) fn sample(value: f64, gas_used: u64, contract_deploy: bool, tx_type: &str) -> Self {
        use chrono::TimeZone;

        Self {
            block_number: 1,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            from_address: "0xaa".to_string(),
            to_address: (!contract_deploy).then(|| "0xbb".to_string()),
            value,
            gas_used,
            tx_type: TxType::from_code(tx_type),
            contract_deploy,
            hash: "0x01".to_string(),
        }
    }
}
