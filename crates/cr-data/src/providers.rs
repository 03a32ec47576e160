use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use cr_types::{CrResult, DataError, PricePoint, PriceSeries};
use csv::ReaderBuilder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Shape of a daily price request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryWindow {
    /// The most recent `n` daily candles.
    LastCandles(u32),
    /// Every day with `start <= date <= end`.
    DateRange { start: NaiveDate, end: NaiveDate },
}

impl HistoryWindow {
    /// Calendar range covered by this window, counted back from `today`.
    pub fn date_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            HistoryWindow::LastCandles(n) => (today - chrono::Duration::days(i64::from(n)), today),
            HistoryWindow::DateRange { start, end } => (start, end),
        }
    }

    /// Trim an already fetched series to this window.
    pub fn apply(&self, series: PriceSeries) -> PriceSeries {
        match *self {
            HistoryWindow::LastCandles(n) => series.last_n(n as usize),
            HistoryWindow::DateRange { start, end } => series.between(start, end),
        }
    }
}

/// Trait for daily close price sources (HTTP APIs, CSV files, fixtures)
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync + std::fmt::Debug {
    /// Fetch daily closes for `symbol`, oldest first.
    async fn fetch_daily_closes(&self, symbol: &str, window: &HistoryWindow) -> CrResult<PriceSeries>;

    /// Get provider name
    fn name(&self) -> &str;

    /// Get provider configuration
    fn config(&self) -> serde_json::Value;
}

/// CSV price provider for loading local files
#[derive(Debug)]
pub struct CsvPriceProvider {
    pub name: String,
    pub data_directory: std::path::PathBuf,
    pub file_pattern: String,
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date")]
    timestamp: String,
    #[serde(alias = "Close", alias = "close")]
    close: f64,
}

impl CsvPriceProvider {
    pub fn new<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            name: "CSV Provider".to_string(),
            data_directory: data_directory.as_ref().to_path_buf(),
            file_pattern: "{symbol}.csv".to_string(),
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.file_pattern = pattern.to_string();
        self
    }

    fn get_file_path(&self, symbol: &str) -> std::path::PathBuf {
        self.data_directory
            .join(self.file_pattern.replace("{symbol}", symbol))
    }

    fn parse_date(raw: &str) -> CrResult<NaiveDate> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc).date_naive()))
            .or_else(|_| {
                chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date())
            })
            .map_err(|e| {
                DataError::ParseError {
                    message: format!("Date parsing error for '{}': {}", raw, e),
                }
                .into()
            })
    }
}

#[async_trait]
impl PriceHistoryProvider for CsvPriceProvider {
    async fn fetch_daily_closes(&self, symbol: &str, window: &HistoryWindow) -> CrResult<PriceSeries> {
        let file_path = self.get_file_path(symbol);

        if !file_path.exists() {
            return Err(DataError::SourceNotFound(file_path.to_string_lossy().to_string()).into());
        }

        let file = std::fs::File::open(&file_path)?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut points = Vec::new();
        for result in reader.deserialize() {
            let record: CsvRecord = result.map_err(|e| DataError::ParseError {
                message: format!("CSV parsing error: {}", e),
            })?;
            points.push(PricePoint::new(Self::parse_date(&record.timestamp)?, record.close));
        }

        let series = window.apply(PriceSeries::new(symbol, points));
        if series.is_empty() {
            return Err(DataError::EmptySeries {
                provider: self.name.clone(),
                symbol: symbol.to_string(),
            }
            .into());
        }

        tracing::debug!("Loaded {} closes for {} from {}", series.len(), symbol, file_path.display());
        Ok(series)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "csv",
            "directory": self.data_directory,
            "pattern": self.file_pattern
        })
    }
}

/// In-memory price provider for demos and tests.
///
/// Every request is recorded so callers can check which symbols and windows
/// were asked for.
#[derive(Debug)]
pub struct StaticPriceProvider {
    pub name: String,
    series: HashMap<String, PriceSeries>,
    requests: Mutex<Vec<(String, HistoryWindow)>>,
}

impl StaticPriceProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            series: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Register closes for `symbol`, starting at `start` with one close per day.
    pub fn with_daily_closes(self, symbol: &str, start: NaiveDate, closes: &[f64]) -> Self {
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint::new(start + chrono::Duration::days(i as i64), close))
            .collect();
        self.with_series(PriceSeries::new(symbol, points))
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<(String, HistoryWindow)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PriceHistoryProvider for StaticPriceProvider {
    async fn fetch_daily_closes(&self, symbol: &str, window: &HistoryWindow) -> CrResult<PriceSeries> {
        self.requests.lock().push((symbol.to_string(), *window));

        let series = self
            .series
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let series = window.apply(series);
        if series.is_empty() {
            return Err(DataError::EmptySeries {
                provider: self.name.clone(),
                symbol: symbol.to_string(),
            }
            .into());
        }
        Ok(series)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> serde_json::Value {
        let mut symbols: Vec<&String> = self.series.keys().collect();
        symbols.sort();
        serde_json::json!({
            "type": "static",
            "symbols": symbols
        })
    }
}
