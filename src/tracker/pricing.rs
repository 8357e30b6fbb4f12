//! Model-keyed pricing table (§9 "Pricing constants ... must be treated as
//! configuration, not part of the contract"). Rates are dollars per 1000
//! tokens, split input/output per `DEFAULT_INPUT_TOKEN_FRACTION`.

use crate::constants::{DEFAULT_INPUT_TOKEN_FRACTION, DEFAULT_OUTPUT_TOKEN_FRACTION};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ModelRate {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Immutable pricing table keyed by model family prefix. Unknown models fall
/// back to `default_rate`, a mid-tier tariff, rather than erroring — the
/// tracker must never block usage recording on an unrecognized model name.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, ModelRate>,
    default_rate: ModelRate,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert(
            "claude-3-opus".to_string(),
            ModelRate {
                input_per_1k: 0.015,
                output_per_1k: 0.075,
            },
        );
        rates.insert(
            "claude-3-sonnet".to_string(),
            ModelRate {
                input_per_1k: 0.003,
                output_per_1k: 0.015,
            },
        );
        rates.insert(
            "claude-3-haiku".to_string(),
            ModelRate {
                input_per_1k: 0.00025,
                output_per_1k: 0.00125,
            },
        );
        rates.insert(
            "gpt-4".to_string(),
            ModelRate {
                input_per_1k: 0.03,
                output_per_1k: 0.06,
            },
        );
        rates.insert(
            "gpt-3.5".to_string(),
            ModelRate {
                input_per_1k: 0.0005,
                output_per_1k: 0.0015,
            },
        );
        Self {
            rates,
            default_rate: ModelRate {
                input_per_1k: 0.003,
                output_per_1k: 0.015,
            },
        }
    }
}

impl PricingTable {
    fn rate_for(&self, model: &str) -> ModelRate {
        self.rates
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            .map(|(_, rate)| *rate)
            .unwrap_or(self.default_rate)
    }

    /// Cost in dollars for `tokens` total tokens against `model`, approximating
    /// the input/output split 80/20 when the caller does not report it
    /// separately.
    pub fn cost(&self, tokens: u64, model: &str) -> f64 {
        let rate = self.rate_for(model);
        let input_tokens = tokens as f64 * DEFAULT_INPUT_TOKEN_FRACTION;
        let output_tokens = tokens as f64 * DEFAULT_OUTPUT_TOKEN_FRACTION;
        (input_tokens / 1000.0) * rate.input_per_1k + (output_tokens / 1000.0) * rate.output_per_1k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_prefix_matches() {
        let table = PricingTable::default();
        let cost = table.cost(1000, "claude-3-haiku-20240307");
        assert!(cost > 0.0);
    }

    #[test]
    fn unknown_model_uses_default_rate() {
        let table = PricingTable::default();
        let known = table.cost(1000, "claude-3-sonnet");
        let unknown = table.cost(1000, "some-future-model-nobody-has-heard-of");
        assert_eq!(known, unknown);
    }

    #[test]
    fn zero_tokens_costs_nothing() {
        let table = PricingTable::default();
        assert_eq!(table.cost(0, "gpt-4"), 0.0);
    }
}
