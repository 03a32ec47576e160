use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{CrResult, RiskError};

/// Confidence level used by plain VaR calls.
pub const DEFAULT_VAR_ALPHA: f64 = 0.95;
/// Confidence level used when deriving CVaR straight from balances.
pub const DEFAULT_CVAR_ALPHA: f64 = 0.99;
/// Number of most recent rows considered by the risk engine.
pub const DEFAULT_LOOKBACK_DAYS: usize = 520;
/// Allowed distance of a weight vector's sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// One asset holding supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Asset symbol as reported by the wallet, e.g. `wbtc` or `usdc`.
    pub token: String,
    /// Holding size used as the weighting basis.
    pub liquidity: Decimal,
}

impl Balance {
    pub fn new(token: &str, liquidity: Decimal) -> Self {
        Self {
            token: token.to_string(),
            liquidity,
        }
    }
}

/// Portfolio weights, one per balance, in balance order.
///
/// Every weight is finite and non-negative, and the weights sum to 1.0
/// within [`WEIGHT_SUM_TOLERANCE`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
    pub fn new(weights: Vec<f64>) -> CrResult<Self> {
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(RiskError::NonFiniteWeights.into());
        }
        if let Some((index, &weight)) = weights.iter().enumerate().find(|(_, w)| **w < 0.0) {
            return Err(RiskError::NegativeWeight { index, weight }.into());
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RiskError::WeightSumMismatch { sum }.into());
        }
        Ok(Self(weights))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl AsRef<[f64]> for WeightVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Tail-risk window settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Confidence level in (0, 1).
    pub alpha: f64,
    /// Use the most recent `lookback_days` rows of the return table.
    pub lookback_days: usize,
}

impl RiskParameters {
    pub fn new(alpha: f64, lookback_days: usize) -> CrResult<Self> {
        let params = Self {
            alpha,
            lookback_days,
        };
        params.validate()?;
        Ok(params)
    }

    /// Parameters used by `generate_cvar_from_balances`.
    pub fn cvar_default() -> Self {
        Self {
            alpha: DEFAULT_CVAR_ALPHA,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    /// Fails unless `0 < alpha < 1` and the lookback is positive.
    pub fn validate(&self) -> CrResult<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(RiskError::InvalidAlpha { alpha: self.alpha }.into());
        }
        if self.lookback_days == 0 {
            return Err(RiskError::InvalidLookback {
                lookback_days: self.lookback_days,
            }
            .into());
        }
        Ok(())
    }

    /// Lower-tail percentile, in percent, matching this confidence level.
    pub fn tail_percentile(&self) -> f64 {
        100.0 * (1.0 - self.alpha)
    }
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_VAR_ALPHA,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}
