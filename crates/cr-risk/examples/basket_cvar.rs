use chrono::{Duration, Utc};
use cr_data::{ReturnSeriesFetcher, StaticPriceProvider};
use cr_risk::{ema, normalize, RiskPipeline};
use cr_types::{Balance, RiskParameters};
use rust_decimal::Decimal;

fn synthetic_closes(seed: u64, len: usize, base: f64, vol: f64) -> Vec<f64> {
    let mut state = seed;
    let mut price = base;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            let shock = ((state >> 16) % 65536) as f64 / 65536.0 - 0.5;
            price *= 1.0 + shock * vol;
            price
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let today = Utc::now().date_naive();
    let start = today - Duration::days(719);

    let stable = StaticPriceProvider::new("sample history")
        .with_daily_closes("USDC", start, &synthetic_closes(11, 720, 1.0, 0.002));
    let general = StaticPriceProvider::new("sample market")
        .with_daily_closes("BTC-USD", start, &synthetic_closes(12, 720, 45_000.0, 0.06))
        .with_daily_closes("ETH-USD", start, &synthetic_closes(13, 720, 3_000.0, 0.08));

    let pipeline = RiskPipeline::new(ReturnSeriesFetcher::new(Box::new(stable), Box::new(general)));

    let balances = vec![
        Balance::new("wbtc", Decimal::new(25, 1)),
        Balance::new("eth", Decimal::from(40)),
        Balance::new("usdc", Decimal::from(50_000)),
    ];

    let report = pipeline.assess(&balances, &RiskParameters::default()).await?;
    println!("VaR 95%:  {:.4}", report.value_at_risk);
    println!("CVaR 95%: {:.4}", report.cvar);
    for w in &report.weights {
        println!("  {:<6} {:.4}", w.symbol, w.weight);
    }

    let cvar_99 = pipeline.generate_cvar_from_balances(&balances).await?;
    println!("CVaR 99% over {} days: {:.4}", report.lookback_days, cvar_99);

    let apys = [3.2, 4.8, 7.5, 5.1];
    println!("Normalized APY 5.1: {:.3}", normalize(5.1, &apys)?);
    println!("EMA(4) of APYs: {:.3}", ema(&apys, 4)?);

    Ok(())
}
