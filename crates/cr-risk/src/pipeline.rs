//! End-to-end tail-risk assessment of a balance list.
//!
//! The [`RiskPipeline`] weights the balances, fetches and joins their return
//! history through a [`ReturnSeriesFetcher`], and hands both to the
//! [`TailRiskCalculator`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use cr_data::{fetch_symbol, ProviderConfig, ReturnSeriesFetcher};
use cr_types::{Balance, CrResult, RiskError, RiskParameters};

use crate::metrics::TailRiskCalculator;
use crate::weights::compute_weights;

/// Weight assigned to one balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenWeight {
    pub token: String,
    /// Symbol the prices were fetched under.
    pub symbol: String,
    pub weight: f64,
}

/// Result of one tail-risk assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub alpha: f64,
    pub lookback_days: usize,
    /// Rows of the joined table that fell inside the lookback window.
    pub observations: usize,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Lower-tail percentile of portfolio returns (negative = loss).
    pub value_at_risk: f64,
    /// Mean portfolio return below `value_at_risk`.
    pub cvar: f64,
    pub weights: Vec<TokenWeight>,
}

/// Balance list in, tail-risk numbers out.
#[derive(Debug)]
pub struct RiskPipeline {
    fetcher: ReturnSeriesFetcher,
}

impl RiskPipeline {
    pub fn new(fetcher: ReturnSeriesFetcher) -> Self {
        Self { fetcher }
    }

    /// Pipeline backed by the live HTTP providers.
    pub fn from_config(config: &ProviderConfig) -> CrResult<Self> {
        Ok(Self::new(ReturnSeriesFetcher::from_config(config)?))
    }

    pub fn fetcher(&self) -> &ReturnSeriesFetcher {
        &self.fetcher
    }

    /// CVaR at 99% over the last 520 rows.
    pub async fn generate_cvar_from_balances(&self, balances: &[Balance]) -> CrResult<f64> {
        Ok(self
            .assess(balances, &RiskParameters::cvar_default())
            .await?
            .cvar)
    }

    /// Weight, fetch, join, and compute VaR and CVaR.
    pub async fn assess(&self, balances: &[Balance], params: &RiskParameters) -> CrResult<RiskReport> {
        params.validate()?;
        let weights = compute_weights(balances)?;
        let table = self
            .fetcher
            .build_return_table(balances)
            .await?
            .fill_missing(0.0);

        let risk = TailRiskCalculator::summarize(&table, &weights, params)?;
        let window = table.tail(params.lookback_days);
        let (window_start, window_end) = match (window.dates().first(), window.dates().last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(RiskError::EmptyTable.into()),
        };

        let report = RiskReport {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            alpha: params.alpha,
            lookback_days: params.lookback_days,
            observations: risk.observations,
            window_start,
            window_end,
            value_at_risk: risk.value_at_risk,
            cvar: risk.cvar,
            weights: balances
                .iter()
                .zip(weights.as_slice())
                .map(|(b, &weight)| TokenWeight {
                    token: b.token.clone(),
                    symbol: fetch_symbol(&b.token),
                    weight,
                })
                .collect(),
        };

        info!(
            "Risk report {}: {} assets, {} observations, VaR {:.6}, CVaR {:.6} at alpha {}",
            report.id,
            balances.len(),
            report.observations,
            report.value_at_risk,
            report.cvar,
            report.alpha
        );
        Ok(report)
    }
}
