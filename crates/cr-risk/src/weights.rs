use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use cr_types::{internal_error, Balance, CrResult, RiskError, WeightVector};

/// Normalize balance liquidity into portfolio weights, preserving order.
///
/// The sum is taken in `Decimal` so the fractions add up to one before the
/// conversion to `f64`.
pub fn compute_weights(balances: &[Balance]) -> CrResult<WeightVector> {
    if balances.is_empty() {
        return Err(RiskError::EmptyBalances.into());
    }
    if let Some(b) = balances.iter().find(|b| b.liquidity < Decimal::ZERO) {
        return Err(RiskError::NegativeLiquidity {
            token: b.token.clone(),
            liquidity: b.liquidity,
        }
        .into());
    }

    let total: Decimal = balances.iter().map(|b| b.liquidity).sum();
    if total.is_zero() {
        return Err(RiskError::ZeroTotalLiquidity.into());
    }

    let weights = balances
        .iter()
        .map(|b| {
            (b.liquidity / total)
                .to_f64()
                .ok_or_else(|| internal_error!("weight for {} is not representable as f64", b.token))
        })
        .collect::<CrResult<Vec<f64>>>()?;

    WeightVector::new(weights)
}
