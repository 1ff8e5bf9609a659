//! Token and cost estimates for the comparison report

use std::fmt;

use serde::{Deserialize, Serialize};

/// Characters per token used for rough estimates (deliberately conservative)
pub const CHARS_PER_TOKEN: usize = 3;

/// Rough token count for a piece of prompt text
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / CHARS_PER_TOKEN) as u64
}

/// Scale usage measured on `sample` records up to `total` records
pub fn extrapolate(measured_tokens: u64, sample: usize, total: usize) -> u64 {
    if sample == 0 {
        return 0;
    }
    measured_tokens.saturating_mul(total as u64) / sample as u64
}

/// Blended price per million tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub usd_per_million_tokens: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        // average of $3 input / $15 output
        Self {
            usd_per_million_tokens: 9.0,
        }
    }
}

impl CostModel {
    pub fn cost(&self, tokens: u64) -> f64 {
        tokens as f64 / 1_000_000.0 * self.usd_per_million_tokens
    }
}

/// Direct-path estimate versus delegated-path measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Extrapolated, not measured
    pub direct_tokens_estimate: u64,
    pub delegated_tokens: u64,
    pub cost: CostModel,
}

impl Comparison {
    pub fn new(direct_tokens_estimate: u64, delegated_tokens: u64, cost: CostModel) -> Self {
        Self {
            direct_tokens_estimate,
            delegated_tokens,
            cost,
        }
    }

    /// Percentage of direct-path tokens saved, when delegated is cheaper
    pub fn savings_pct(&self) -> Option<f64> {
        if self.direct_tokens_estimate <= self.delegated_tokens {
            return None;
        }
        let saved = (self.direct_tokens_estimate - self.delegated_tokens) as f64;
        Some(saved / self.direct_tokens_estimate as f64 * 100.0)
    }

    /// How many times fewer tokens the delegated path used
    pub fn reduction_factor(&self) -> Option<f64> {
        if self.delegated_tokens == 0 || self.direct_tokens_estimate <= self.delegated_tokens {
            return None;
        }
        Some(self.direct_tokens_estimate as f64 / self.delegated_tokens as f64)
    }

    pub fn direct_cost(&self) -> f64 {
        self.cost.cost(self.direct_tokens_estimate)
    }

    pub fn delegated_cost(&self) -> f64 {
        self.cost.cost(self.delegated_tokens)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Direct context (extrapolated estimate): ~{} tokens",
            self.direct_tokens_estimate
        )?;
        writeln!(
            f,
            "Delegated execution (measured):          {} tokens",
            self.delegated_tokens
        )?;

        if let Some(pct) = self.savings_pct() {
            writeln!(f)?;
            writeln!(f, "Savings:   {pct:.2}%")?;
            if let Some(factor) = self.reduction_factor() {
                writeln!(f, "Reduction: {factor:.1}x fewer tokens")?;
            }
            writeln!(f)?;
            writeln!(
                f,
                "Estimated cost (at ${:.2}/1M tokens):",
                self.cost.usd_per_million_tokens
            )?;
            writeln!(f, "  Direct:    ${:.2}", self.direct_cost())?;
            writeln!(f, "  Delegated: ${:.4}", self.delegated_cost())?;
            writeln!(
                f,
                "  Saved:     ${:.2} per run",
                self.direct_cost() - self.delegated_cost()
            )?;
        } else {
            writeln!(f, "No savings: delegated execution used at least as many tokens")?;
        }
        Ok(())
    }
}
