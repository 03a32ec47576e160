//! Return series fetching and table assembly.
//!
//! [`ReturnSeriesFetcher`] routes each wallet token to the provider family its
//! classification calls for, converts closes to daily returns, and joins the
//! per-asset series into one [`ReturnTable`].

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use cr_types::{Balance, CrResult, DataError, ReturnSeries, ReturnTable, RiskError};

use crate::http::{CryptoCompareProvider, YahooFinanceProvider};
use crate::providers::{HistoryWindow, PriceHistoryProvider};
use crate::sources::{FetchConfig, ProviderConfig};
use crate::symbols::{AssetClassification, FetchTarget};

/// Fetches per-asset daily returns from two injected price providers
#[derive(Debug)]
pub struct ReturnSeriesFetcher {
    stablecoin_provider: Box<dyn PriceHistoryProvider>,
    general_provider: Box<dyn PriceHistoryProvider>,
    config: FetchConfig,
    reference_date: Option<NaiveDate>,
}

impl ReturnSeriesFetcher {
    pub fn new(
        stablecoin_provider: Box<dyn PriceHistoryProvider>,
        general_provider: Box<dyn PriceHistoryProvider>,
    ) -> Self {
        Self {
            stablecoin_provider,
            general_provider,
            config: FetchConfig::default(),
            reference_date: None,
        }
    }

    /// CryptoCompare for stablecoins, Yahoo Finance for everything else.
    pub fn from_config(config: &ProviderConfig) -> CrResult<Self> {
        config.validate()?;
        Ok(Self::new(
            Box::new(CryptoCompareProvider::new(config)?),
            Box::new(YahooFinanceProvider::new(config)?),
        ))
    }

    pub fn with_fetch_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Pin "today" instead of reading the clock.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    fn provider_for(&self, classification: AssetClassification) -> &dyn PriceHistoryProvider {
        match classification {
            AssetClassification::Stablecoin => self.stablecoin_provider.as_ref(),
            AssetClassification::General => self.general_provider.as_ref(),
        }
    }

    /// Request window for a provider family.
    pub fn window_for(&self, classification: AssetClassification) -> HistoryWindow {
        match classification {
            AssetClassification::Stablecoin => {
                HistoryWindow::LastCandles(self.config.stablecoin_candle_limit)
            }
            AssetClassification::General => {
                let end = self.today();
                HistoryWindow::DateRange {
                    start: end - chrono::Duration::days(self.config.general_lookback_days),
                    end,
                }
            }
        }
    }

    /// Daily returns for one wallet token.
    ///
    /// Provider failures are returned unchanged; nothing is retried.
    pub async fn fetch_returns(&self, token: &str) -> CrResult<ReturnSeries> {
        let target = FetchTarget::resolve(token);
        let provider = self.provider_for(target.classification);
        let window = self.window_for(target.classification);
        let symbol = target.provider_symbol();

        debug!(
            "Resolved {} to {} ({}) via {}",
            token,
            symbol,
            target.classification,
            provider.name()
        );

        let prices = provider.fetch_daily_closes(&symbol, &window).await?;
        if prices.is_empty() {
            return Err(DataError::EmptySeries {
                provider: provider.name().to_string(),
                symbol,
            }
            .into());
        }

        Ok(ReturnSeries::from_prices(&target.column_label(), &prices))
    }

    /// Fetch every balance's returns and inner-join them in balance order.
    pub async fn build_return_table(&self, balances: &[Balance]) -> CrResult<ReturnTable> {
        if balances.is_empty() {
            return Err(RiskError::EmptyBalances.into());
        }

        let mut series = Vec::with_capacity(balances.len());
        for balance in balances {
            series.push(self.fetch_returns(&balance.token).await?);
        }

        let shortest = series.iter().map(ReturnSeries::len).min().unwrap_or_default();
        let table = ReturnTable::join_all(&series)?;

        if table.num_rows() < shortest {
            warn!(
                "Joining {} series kept {} rows, shortest series had {}",
                series.len(),
                table.num_rows(),
                shortest
            );
        }
        info!("Built return table: {}", table);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StaticPriceProvider;
    use async_trait::async_trait;
    use cr_types::{CrError, PricePoint, PriceSeries};
    use rust_decimal_macros::dec;

    /// Market source that lists candles newest first, as many chart APIs do.
    #[derive(Debug)]
    struct NewestFirstProvider {
        start: NaiveDate,
        closes: Vec<f64>,
    }

    #[async_trait]
    impl PriceHistoryProvider for NewestFirstProvider {
        async fn fetch_daily_closes(&self, symbol: &str, _window: &HistoryWindow) -> CrResult<PriceSeries> {
            let points = self
                .closes
                .iter()
                .enumerate()
                .rev()
                .map(|(i, &close)| PricePoint::new(self.start + chrono::Duration::days(i as i64), close))
                .collect();
            Ok(PriceSeries::new(symbol, points))
        }

        fn name(&self) -> &str {
            "newest-first"
        }

        fn config(&self) -> serde_json::Value {
            serde_json::json!({ "provider": "newest-first" })
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn fetcher() -> ReturnSeriesFetcher {
        let stable = StaticPriceProvider::new("history")
            .with_daily_closes("DAI", day(1), &[1.0, 1.01, 1.0, 0.99, 1.0])
            .with_daily_closes("USDC", day(1), &[1.0, 1.0, 1.0, 1.0, 1.0]);
        let general = StaticPriceProvider::new("market")
            .with_daily_closes("BTC-USD", day(2), &[100.0, 110.0, 99.0, 104.0])
            .with_daily_closes("UNI-USD", day(3), &[5.0, 5.5]);

        ReturnSeriesFetcher::new(Box::new(stable), Box::new(general))
            .with_reference_date(day(10))
    }

    #[test]
    fn windows_follow_fetch_config() {
        let fetcher = fetcher();
        assert_eq!(
            fetcher.window_for(AssetClassification::Stablecoin),
            HistoryWindow::LastCandles(720)
        );
        assert_eq!(
            fetcher.window_for(AssetClassification::General),
            HistoryWindow::DateRange {
                start: day(10) - chrono::Duration::days(520),
                end: day(10)
            }
        );

        let short = fetcher.with_fetch_config(FetchConfig {
            stablecoin_candle_limit: 3,
            general_lookback_days: 7,
        });
        assert_eq!(
            short.window_for(AssetClassification::Stablecoin),
            HistoryWindow::LastCandles(3)
        );
    }

    #[tokio::test]
    async fn wbtc_fetches_btc_from_market_provider() {
        let returns = fetcher().fetch_returns("wbtc").await.unwrap();
        assert_eq!(returns.label, "daily_returns_BTC");
        let values = returns.values();
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 0.10).abs() < 1e-12);
        assert!((values[2] + 0.10).abs() < 1e-12);
    }

    #[tokio::test]
    async fn sai_fetches_dai_history() {
        let returns = fetcher().fetch_returns("sai").await.unwrap();
        assert_eq!(returns.label, "daily_returns_DAI");
        assert_eq!(returns.len(), 5);
    }

    #[tokio::test]
    async fn unknown_token_propagates_provider_error() {
        let err = fetcher().fetch_returns("doge").await.unwrap_err();
        match err {
            CrError::Data(DataError::SymbolNotFound { symbol }) => assert_eq!(symbol, "DOGE-USD"),
            other => panic!("Expected SymbolNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn table_is_inner_joined_in_balance_order() {
        let balances = vec![
            Balance::new("wbtc", dec!(2)),
            Balance::new("dai", dec!(100)),
            Balance::new("uni", dec!(10)),
        ];
        let table = fetcher().build_return_table(&balances).await.unwrap();

        assert_eq!(
            table.columns(),
            &["daily_returns_BTC", "daily_returns_DAI", "daily_returns_UNI"]
        );
        // UNI only trades on the 3rd and 4th.
        assert_eq!(table.dates(), &[day(3), day(4)]);
        assert_eq!(table.rows()[0][2], 0.0);
    }

    #[tokio::test]
    async fn empty_balances_are_rejected() {
        let err = fetcher().build_return_table(&[]).await.unwrap_err();
        assert!(matches!(err, CrError::Risk(RiskError::EmptyBalances)));
    }

    #[tokio::test]
    async fn disjoint_calendars_fail_alignment() {
        let stable = StaticPriceProvider::new("history").with_daily_closes("DAI", day(1), &[1.0, 1.0]);
        let general = StaticPriceProvider::new("market").with_daily_closes("ETH-USD", day(20), &[1.0, 2.0]);
        let fetcher = ReturnSeriesFetcher::new(Box::new(stable), Box::new(general))
            .with_reference_date(day(25));

        let balances = vec![Balance::new("dai", dec!(1)), Balance::new("eth", dec!(1))];
        let err = fetcher.build_return_table(&balances).await.unwrap_err();
        assert!(matches!(err, CrError::Data(DataError::NoOverlappingDates { .. })));
    }

    #[tokio::test]
    async fn newest_first_provider_still_aligns_forward_in_time() {
        let stable = StaticPriceProvider::new("history")
            .with_daily_closes("DAI", day(1), &[1.0, 1.0, 1.0, 1.0, 1.0]);
        let general = NewestFirstProvider {
            start: day(1),
            closes: vec![100.0, 110.0, 121.0, 133.1, 146.41],
        };
        let fetcher = ReturnSeriesFetcher::new(Box::new(stable), Box::new(general))
            .with_reference_date(day(10));

        let eth = fetcher.fetch_returns("eth").await.unwrap();
        assert_eq!(eth.first_date(), Some(day(1)));
        assert_eq!(eth.last_date(), Some(day(5)));
        assert!(eth.values()[1..].iter().all(|v| (v - 0.10).abs() < 1e-9));

        let balances = vec![Balance::new("eth", dec!(1)), Balance::new("dai", dec!(1))];
        let table = fetcher.build_return_table(&balances).await.unwrap();
        assert_eq!(table.num_rows(), 5);
        assert_eq!(table.dates().first(), Some(&day(1)));
        assert_eq!(table.dates().last(), Some(&day(5)));
    }
}
