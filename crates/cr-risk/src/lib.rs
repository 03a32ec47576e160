//! Tail-risk metrics for a basket of crypto-asset balances.
//!
//! Provides:
//! - Portfolio weights from balance liquidity
//! - Historical VaR and CVaR over a lookback window
//! - Min-max, recency and EMA scoring helpers
//! - An end-to-end pipeline from balances to a [`RiskReport`]

pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod weights;

pub use metrics::{TailRisk, TailRiskCalculator};
pub use normalize::{ema, normalize, normalize_time, normalize_time_at};
pub use pipeline::{RiskPipeline, RiskReport, TokenWeight};
pub use weights::compute_weights;
