use std::collections::BTreeMap;

use crate::config::HeuristicConfig;
use crate::tx::types::{TransactionRecord, TxType};

use super::rules;
use super::types::{RiskAssessment, RiskTier};

/// Justification used when no condition fires.
pub const NO_SIGNAL_JUSTIFICATION: &str = "Sin señales claras de riesgo";

/// Tier counts and transaction-type breakdown of one scored batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchSummary {
    pub tier_counts: BTreeMap<RiskTier, usize>,
    pub tx_type_counts: BTreeMap<&'static str, usize>,
    /// Unrecognized `tx_type` codes and how often each appeared.
    pub unknown_tx_types: BTreeMap<String, usize>,
    /// How often each rule fired, keyed by signal name.
    pub signal_counts: BTreeMap<&'static str, usize>,
}

/// The heuristic rule engine. Pure: a record's assessment depends only on its
/// value, gas used, contract-deploy flag and transaction type.
pub struct RiskEngine {
    config: HeuristicConfig,
    advanced_tx_types: Vec<TxType>,
}

impl RiskEngine {
    pub fn new(config: HeuristicConfig) -> Self {
        let advanced_tx_types = config
            .advanced_tx_types
            .iter()
            .map(|code| TxType::from_code(code))
            .collect();
        Self {
            config,
            advanced_tx_types,
        }
    }

    /// Score a single transaction. Never fails.
    pub fn assess(&self, tx: &TransactionRecord) -> RiskAssessment {
        // Fixed order: value, gas, contract deploy, tx type
        let signals: Vec<_> = [
            rules::check_high_value(tx, self.config.value_threshold_eth),
            rules::check_high_gas(tx, self.config.gas_threshold),
            rules::check_contract_deploy(tx),
            rules::check_advanced_tx_type(tx, &self.advanced_tx_types),
        ]
        .into_iter()
        .flatten()
        .collect();

        let points = signals.len() as u32;
        let justification = if signals.is_empty() {
            NO_SIGNAL_JUSTIFICATION.to_string()
        } else {
            signals
                .iter()
                .map(|s| s.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };

        RiskAssessment {
            points,
            tier: RiskTier::from_points(points),
            signals,
            justification,
        }
    }

    /// Score every record, in input order, and summarize the batch.
    pub fn assess_batch(&self, records: &[TransactionRecord]) -> (Vec<RiskAssessment>, BatchSummary) {
        let mut summary = BatchSummary::default();
        let assessments: Vec<RiskAssessment> = records
            .iter()
            .map(|tx| {
                let assessment = self.assess(tx);
                *summary.tier_counts.entry(assessment.tier).or_default() += 1;
                *summary.tx_type_counts.entry(tx.tx_type.description()).or_default() += 1;
                if let TxType::Unknown(code) = &tx.tx_type {
                    *summary.unknown_tx_types.entry(code.clone()).or_default() += 1;
                }
                for signal in &assessment.signals {
                    *summary.signal_counts.entry(signal.kind.as_str()).or_default() += 1;
                }
                assessment
            })
            .collect();

        for (code, count) in &summary.unknown_tx_types {
            tracing::warn!(
                tx_type = %code,
                count,
                "Unknown transaction type, scored as not advanced"
            );
        }

        for tier in RiskTier::ALL {
            tracing::info!(
                tier = tier.label(),
                count = summary.tier_counts.get(&tier).copied().unwrap_or(0),
                "Risk tier distribution"
            );
        }
        for (description, count) in &summary.tx_type_counts {
            tracing::info!(tx_type = description, count, "Transaction type distribution");
        }
        for (signal, count) in &summary.signal_counts {
            tracing::debug!(signal, count, "Signal frequency");
        }

        (assessments, summary)
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::types::SignalKind;

    fn assess(value: f64, gas_used: u64, contract_deploy: bool, tx_type: &str) -> RiskAssessment {
        RiskEngine::default().assess(&TransactionRecord::sample(value, gas_used, contract_deploy, tx_type))
    }

    #[test]
    fn test_single_condition_is_low() {
        let a = assess(6.0, 100_000, false, "0x2");
        assert_eq!(a.points, 1);
        assert_eq!(a.tier.label(), "Bajo");
        assert_eq!(a.justification, "Valor enviado = 6.0 ETH > 5 ETH");
    }

    #[test]
    fn test_all_conditions_are_high_in_fixed_order() {
        let a = assess(6.0, 300_000, true, "0x4");
        assert_eq!(a.points, 4);
        assert_eq!(a.tier, RiskTier::High);
        let kinds: Vec<_> = a.signals.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SignalKind::HighValue,
                SignalKind::HighGas,
                SignalKind::ContractDeploy,
                SignalKind::AdvancedTxType,
            ]
        );
        assert_eq!(
            a.justification,
            "Valor enviado = 6.0 ETH > 5 ETH; Gas usado = 300000 > 250000; \
             Es despliegue de contrato; Tipo avanzado: 0x4"
        );
    }

    #[test]
    fn test_no_conditions_is_none() {
        let a = assess(1.0, 1000, false, "0x0");
        assert_eq!(a.points, 0);
        assert_eq!(a.tier.label(), "Ninguno");
        assert_eq!(a.justification, NO_SIGNAL_JUSTIFICATION);
    }

    #[test]
    fn test_two_and_three_points() {
        assert_eq!(assess(0.0, 300_000, true, "0x0").tier, RiskTier::Medium);
        assert_eq!(assess(0.0, 300_000, true, "0x3").tier, RiskTier::High);
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let engine = RiskEngine::default();
        let tx = TransactionRecord::sample(7.5, 260_000, false, "0x3");
        assert_eq!(engine.assess(&tx), engine.assess(&tx));
    }

    #[test]
    fn test_adding_a_condition_never_lowers_tier() {
        let engine = RiskEngine::default();
        let base = [(1.0, 1000u64, false, "0x0"), (6.0, 1000, false, "0x0"), (6.0, 300_000, false, "0x2")];
        for (value, gas, deploy, tx_type) in base {
            let before = engine.assess(&TransactionRecord::sample(value, gas, deploy, tx_type)).tier;
            let variants = [
                TransactionRecord::sample(10.0, gas, deploy, tx_type),
                TransactionRecord::sample(value, 500_000, deploy, tx_type),
                TransactionRecord::sample(value, gas, true, tx_type),
                TransactionRecord::sample(value, gas, deploy, "0x4"),
            ];
            for variant in &variants {
                assert!(engine.assess(variant).tier >= before);
            }
        }
    }

    #[test]
    fn test_scoring_ignores_other_fields() {
        let engine = RiskEngine::default();
        let tx = TransactionRecord::sample(6.0, 300_000, false, "0x2");
        let mut other = tx.clone();
        other.block_number = 999;
        other.from_address = "0xffff".to_string();
        other.hash = "0xdead".to_string();
        assert_eq!(engine.assess(&tx), engine.assess(&other));
    }

    #[test]
    fn test_batch_summary_counts_unknown_types() {
        let engine = RiskEngine::default();
        let records = vec![
            TransactionRecord::sample(1.0, 0, false, "0x0"),
            TransactionRecord::sample(6.0, 0, false, "0x9"),
            TransactionRecord::sample(6.0, 0, false, "0x9"),
        ];
        let (assessments, summary) = engine.assess_batch(&records);
        assert_eq!(assessments.len(), 3);
        assert_eq!(summary.tier_counts.get(&RiskTier::None), Some(&1));
        assert_eq!(summary.tier_counts.get(&RiskTier::Low), Some(&2));
        assert_eq!(summary.unknown_tx_types.get("0x9"), Some(&2));
        assert_eq!(summary.tx_type_counts.get("unknown"), Some(&2));
        assert_eq!(summary.signal_counts.get("high_value"), Some(&2));
        assert_eq!(summary.signal_counts.get("advanced_tx_type"), None);
    }

    #[test]
    fn test_batch_order_does_not_change_assessments() {
        let engine = RiskEngine::default();
        let a = TransactionRecord::sample(6.0, 300_000, true, "0x4");
        let b = TransactionRecord::sample(1.0, 0, false, "0x1");
        let (forward, _) = engine.assess_batch(&[a.clone(), b.clone()]);
        let (reverse, _) = engine.assess_batch(&[b, a]);
        assert_eq!(forward[0], reverse[1]);
        assert_eq!(forward[1], reverse[0]);
    }
}
