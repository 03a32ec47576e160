//! Historical tail-risk metrics.
//!
//! [`TailRiskCalculator`] reduces a [`ReturnTable`] and a [`WeightVector`] to a
//! portfolio return series over the lookback window, then reads Value-at-Risk
//! and Conditional Value-at-Risk off its empirical distribution. Both are
//! expressed as return fractions, so a loss is negative.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cr_types::{CrResult, ReturnTable, RiskError, RiskParameters, WeightVector};

/// VaR and CVaR computed over one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailRisk {
    pub value_at_risk: f64,
    pub cvar: f64,
    /// Portfolio return observations in the window.
    pub observations: usize,
}

/// Stateless calculator for historical VaR/CVaR.
pub struct TailRiskCalculator;

impl TailRiskCalculator {
    /// Weighted portfolio returns over the most recent `lookback_days` rows.
    ///
    /// Missing cells count as a 0.0 return.
    pub fn portfolio_returns(
        table: &ReturnTable,
        weights: &WeightVector,
        lookback_days: usize,
    ) -> CrResult<Vec<f64>> {
        if table.is_empty() {
            return Err(RiskError::EmptyTable.into());
        }
        if weights.len() != table.num_columns() {
            return Err(RiskError::WeightMismatch {
                expected: table.num_columns(),
                actual: weights.len(),
            }
            .into());
        }
        if lookback_days == 0 {
            return Err(RiskError::InvalidLookback { lookback_days }.into());
        }

        let window = table.tail(lookback_days).fill_missing(0.0);
        debug!(
            "Portfolio window holds {} of {} rows",
            window.num_rows(),
            table.num_rows()
        );

        Ok(window
            .rows()
            .iter()
            .map(|row| row.iter().zip(weights.as_slice()).map(|(r, w)| r * w).sum::<f64>())
            .collect())
    }

    /// Historical VaR: the `100 * (1 - alpha)`-th percentile of portfolio returns.
    pub fn value_at_risk(
        table: &ReturnTable,
        weights: &WeightVector,
        params: &RiskParameters,
    ) -> CrResult<f64> {
        params.validate()?;
        let returns = Self::portfolio_returns(table, weights, params.lookback_days)?;
        Self::var_of(&returns, params)
    }

    /// Mean of the portfolio returns strictly below VaR.
    ///
    /// When nothing lies below VaR (VaR equals the worst observation) the
    /// result is VaR itself, so `cvar <= value_at_risk` always holds.
    pub fn cvar(table: &ReturnTable, weights: &WeightVector, params: &RiskParameters) -> CrResult<f64> {
        Ok(Self::summarize(table, weights, params)?.cvar)
    }

    /// VaR and CVaR from a single pass over the window.
    pub fn summarize(
        table: &ReturnTable,
        weights: &WeightVector,
        params: &RiskParameters,
    ) -> CrResult<TailRisk> {
        params.validate()?;
        let returns = Self::portfolio_returns(table, weights, params.lookback_days)?;
        let value_at_risk = Self::var_of(&returns, params)?;
        let cvar = Self::mean_below(&returns, value_at_risk).unwrap_or_else(|| {
            warn!("No portfolio returns below VaR {:.6}, CVaR falls back to VaR", value_at_risk);
            value_at_risk
        });

        Ok(TailRisk {
            value_at_risk,
            cvar,
            observations: returns.len(),
        })
    }

    /// Percentile with linear interpolation between order statistics.
    ///
    /// `pct` is in percent (0..=100). Non-finite values are ignored; `None`
    /// when no finite value remains.
    pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
    }

    fn var_of(returns: &[f64], params: &RiskParameters) -> CrResult<f64> {
        Self::percentile(returns, params.tail_percentile()).ok_or_else(|| RiskError::EmptyTable.into())
    }

    fn mean_below(returns: &[f64], threshold: f64) -> Option<f64> {
        let tail: Vec<f64> = returns
            .iter()
            .copied()
            .filter(|r| r.is_finite() && *r < threshold)
            .collect();
        if tail.is_empty() {
            None
        } else {
            Some(tail.iter().sum::<f64>() / tail.len() as f64)
        }
    }
}
