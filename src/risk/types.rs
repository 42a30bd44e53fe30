use serde::Serialize;
use std::fmt;

/// Ordinal risk classification. Ordering follows the number of fired conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskTier {
    None,
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_points(points: u32) -> Self {
        match points {
            0 => Self::None,
            1 => Self::Low,
            2 => Self::Medium,
            _ => Self::High,
        }
    }

    /// Label written to the `Riesgo` output column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "Ninguno",
            Self::Low => "Bajo",
            Self::Medium => "Medio",
            Self::High => "Alto",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Ninguno" => Some(Self::None),
            "Bajo" => Some(Self::Low),
            "Medio" => Some(Self::Medium),
            "Alto" => Some(Self::High),
            _ => None,
        }
    }

    pub const ALL: [RiskTier; 4] = [Self::High, Self::Medium, Self::Low, Self::None];
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RiskTier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// The heuristic conditions, in the order they are evaluated and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    HighValue,
    HighGas,
    ContractDeploy,
    AdvancedTxType,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighValue => "high_value",
            Self::HighGas => "high_gas",
            Self::ContractDeploy => "contract_deploy",
            Self::AdvancedTxType => "advanced_tx_type",
        }
    }
}

/// A heuristic condition that fired for a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSignal {
    pub kind: SignalKind,
    pub message: String,
}

/// Tier and justification for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub points: u32,
    pub tier: RiskTier,
    pub signals: Vec<RiskSignal>,
    pub justification: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_from_points_boundaries() {
        assert_eq!(RiskTier::from_points(0).label(), "Ninguno");
        assert_eq!(RiskTier::from_points(1).label(), "Bajo");
        assert_eq!(RiskTier::from_points(2).label(), "Medio");
        assert_eq!(RiskTier::from_points(3).label(), "Alto");
        assert_eq!(RiskTier::from_points(4).label(), "Alto");
    }

    #[test]
    fn test_tier_ordering_and_labels() {
        assert!(RiskTier::None < RiskTier::Low);
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
        for tier in RiskTier::ALL {
            assert_eq!(RiskTier::from_label(tier.label()), Some(tier));
        }
        assert_eq!(RiskTier::from_label("Critical"), None);
    }
}
