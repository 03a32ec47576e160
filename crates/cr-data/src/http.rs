//! HTTP price providers.
//!
//! [`CryptoCompareProvider`] serves the stablecoin/legacy asset family from the
//! `histoday` endpoint; [`YahooFinanceProvider`] serves everything else from the
//! v8 chart endpoint. Response parsing is kept separate from transport so it
//! can be exercised on captured payloads.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use cr_types::{CrResult, DataError, PricePoint, PriceSeries};
use serde::Deserialize;
use std::time::Duration;

use crate::providers::{HistoryWindow, PriceHistoryProvider};
use crate::sources::ProviderConfig;
use crate::symbols::QUOTE_CURRENCY;

fn build_client(config: &ProviderConfig) -> CrResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| {
            DataError::LoadingFailed {
                message: format!("Failed to build HTTP client: {}", e),
            }
            .into()
        })
}

fn date_from_unix(seconds: i64) -> CrResult<NaiveDate> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| {
            DataError::ParseError {
                message: format!("Invalid unix timestamp: {}", seconds),
            }
            .into()
        })
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

async fn get_json(request: reqwest::RequestBuilder, symbol: &str) -> CrResult<serde_json::Value> {
    let response = request.send().await.map_err(|e| DataError::LoadingFailed {
        message: format!("HTTP request failed: {}", e),
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }
        .into());
    }
    if !status.is_success() {
        return Err(DataError::LoadingFailed {
            message: format!("HTTP error: {}", status),
        }
        .into());
    }

    response.json().await.map_err(|e| {
        DataError::LoadingFailed {
            message: format!("Failed to parse JSON response: {}", e),
        }
        .into()
    })
}

/// CryptoCompare `histoday` provider
#[derive(Debug)]
pub struct CryptoCompareProvider {
    pub name: String,
    pub base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HistodayResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: Option<HistodayData>,
}

#[derive(Debug, Default, Deserialize)]
struct HistodayData {
    #[serde(rename = "Data", default)]
    data: Vec<HistodayCandle>,
}

// open/high/low/volume/conversion fields are ignored.
#[derive(Debug, Deserialize)]
struct HistodayCandle {
    time: i64,
    close: f64,
}

impl CryptoCompareProvider {
    pub fn new(config: &ProviderConfig) -> CrResult<Self> {
        Ok(Self {
            name: "CryptoCompare".to_string(),
            base_url: config.cryptocompare_url.trim_end_matches('/').to_string(),
            api_key: config.cryptocompare_api_key.clone(),
            client: build_client(config)?,
        })
    }

    /// Query string for a window. Date ranges become `limit` + `toTs`.
    fn query(&self, symbol: &str, window: &HistoryWindow) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("fsym", symbol.to_string()),
            ("tsym", QUOTE_CURRENCY.to_string()),
        ];
        match *window {
            HistoryWindow::LastCandles(n) => query.push(("limit", n.to_string())),
            HistoryWindow::DateRange { start, end } => {
                let days = (end - start).num_days().max(0);
                query.push(("limit", days.to_string()));
                query.push(("toTs", unix_midnight(end).to_string()));
            }
        }
        query
    }

    /// Parse a `histoday` payload into daily closes.
    pub fn parse_response(symbol: &str, json: serde_json::Value) -> CrResult<PriceSeries> {
        let response: HistodayResponse = serde_json::from_value(json).map_err(|e| DataError::ParseError {
            message: format!("Unexpected histoday payload: {}", e),
        })?;

        if response.response.eq_ignore_ascii_case("error") {
            return Err(DataError::LoadingFailed {
                message: format!("API error for {}: {}", symbol, response.message),
            }
            .into());
        }

        let candles = response.data.unwrap_or_default().data;
        let mut points = Vec::with_capacity(candles.len());
        for candle in candles {
            points.push(PricePoint::new(date_from_unix(candle.time)?, candle.close));
        }

        Ok(PriceSeries::new(symbol, points))
    }
}

#[async_trait]
impl PriceHistoryProvider for CryptoCompareProvider {
    async fn fetch_daily_closes(&self, symbol: &str, window: &HistoryWindow) -> CrResult<PriceSeries> {
        tracing::info!("Fetching daily history from CryptoCompare for {} ({:?})", symbol, window);

        let url = format!("{}/data/v2/histoday", self.base_url);
        let mut request = self.client.get(&url).query(&self.query(symbol, window));
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Apikey {}", key));
        }

        let json = get_json(request, symbol).await?;
        let series = Self::parse_response(symbol, json)?;

        if series.is_empty() {
            return Err(DataError::EmptySeries {
                provider: self.name.clone(),
                symbol: symbol.to_string(),
            }
            .into());
        }

        tracing::info!("Retrieved {} closes from CryptoCompare for {}", series.len(), symbol);
        Ok(series)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "cryptocompare",
            "base_url": self.base_url,
            "api_key_set": self.api_key.is_some()
        })
    }
}

/// Yahoo Finance v8 chart provider
#[derive(Debug)]
pub struct YahooFinanceProvider {
    pub name: String,
    pub base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl YahooFinanceProvider {
    pub fn new(config: &ProviderConfig) -> CrResult<Self> {
        Ok(Self {
            name: "Yahoo Finance".to_string(),
            base_url: config.yahoo_url.trim_end_matches('/').to_string(),
            client: build_client(config)?,
        })
    }

    /// `period1`/`period2` bounds; `period2` is exclusive so it lands on the day after `end`.
    fn periods(window: &HistoryWindow, today: NaiveDate) -> (i64, i64) {
        let (start, end) = window.date_range(today);
        (unix_midnight(start), unix_midnight(end + chrono::Duration::days(1)))
    }

    /// Parse a chart payload into daily closes. Null closes are dropped.
    pub fn parse_response(ticker: &str, json: serde_json::Value) -> CrResult<PriceSeries> {
        let response: ChartResponse = serde_json::from_value(json).map_err(|e| DataError::ParseError {
            message: format!("Unexpected chart payload: {}", e),
        })?;

        if let Some(error) = response.chart.error {
            if error.code.eq_ignore_ascii_case("not found") {
                return Err(DataError::SymbolNotFound {
                    symbol: ticker.to_string(),
                }
                .into());
            }
            return Err(DataError::LoadingFailed {
                message: format!("API error for {}: {} {}", ticker, error.code, error.description),
            }
            .into());
        }

        let result = response
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| DataError::ParseError {
                message: format!("Chart response for {} has no result", ticker),
            })?;

        let closes = result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default();

        if closes.len() != result.timestamp.len() {
            return Err(DataError::ParseError {
                message: format!(
                    "Chart response for {} has {} timestamps but {} closes",
                    ticker,
                    result.timestamp.len(),
                    closes.len()
                ),
            }
            .into());
        }

        let mut points = Vec::with_capacity(closes.len());
        for (ts, close) in result.timestamp.into_iter().zip(closes) {
            if let Some(close) = close {
                points.push(PricePoint::new(date_from_unix(ts)?, close));
            }
        }

        Ok(PriceSeries::new(ticker, points))
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooFinanceProvider {
    async fn fetch_daily_closes(&self, symbol: &str, window: &HistoryWindow) -> CrResult<PriceSeries> {
        tracing::info!("Fetching daily closes from Yahoo Finance for {} ({:?})", symbol, window);

        let (period1, period2) = Self::periods(window, Utc::now().date_naive());
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let request = self.client.get(&url).query(&[
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
        ]);

        let json = get_json(request, symbol).await?;
        let series = window.apply(Self::parse_response(symbol, json)?);

        if series.is_empty() {
            return Err(DataError::EmptySeries {
                provider: self.name.clone(),
                symbol: symbol.to_string(),
            }
            .into());
        }

        tracing::info!("Retrieved {} closes from Yahoo Finance for {}", series.len(), symbol);
        Ok(series)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "yahoo_finance",
            "base_url": self.base_url
        })
    }
}
