use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CrResult, DataError};

/// Prefix of every per-asset return column.
pub const RETURN_COLUMN_PREFIX: &str = "daily_returns_";

/// Daily closing price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Daily close history for one symbol, as delivered by a provider.
///
/// Points are kept in ascending date order whatever order the provider used.
/// When a provider reports the same calendar day twice the later observation
/// wins. The fields are private so every series goes through [`PriceSeries::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: &str, mut points: Vec<PricePoint>) -> Self {
        // Stable sort keeps provider order within a day, so dedup keeps the last one.
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            symbol: symbol.to_string(),
            points: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Closes in ascending, de-duplicated date order.
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keep only the most recent `n` observations.
    pub fn last_n(mut self, n: usize) -> Self {
        if self.points.len() > n {
            self.points.drain(..self.points.len() - n);
        }
        self
    }

    /// Keep observations with `start <= date <= end`.
    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.points.retain(|p| p.date >= start && p.date <= end);
        self
    }
}

/// Single daily return observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    /// Signed fraction, 0.01 = +1%. NaN marks a missing value.
    pub value: f64,
}

/// Daily returns of one asset, labelled by column name.
///
/// Not serde-enabled: NaN marks a missing return and would not survive a
/// JSON round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub label: String,
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Build a series from explicit points. Dates must be strictly ascending.
    pub fn new(label: &str, points: Vec<ReturnPoint>) -> CrResult<Self> {
        if let Some(pair) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(DataError::UnsortedSeries {
                label: label.to_string(),
                date: pair[1].date.to_string(),
            }
            .into());
        }

        Ok(Self {
            label: label.to_string(),
            points,
        })
    }

    /// Convert closing prices to simple daily returns.
    ///
    /// The first observation has no predecessor and is defined as 0.0. A zero
    /// predecessor price produces a missing (NaN) return. `prices` is already
    /// ascending and de-duplicated, so the result is too.
    pub fn from_prices(label: &str, prices: &PriceSeries) -> Self {
        let closes: Vec<f64> = prices.points.iter().map(|p| p.close).collect();
        let points = prices
            .points
            .iter()
            .zip(pct_change(&closes))
            .map(|(p, value)| ReturnPoint {
                date: p.date,
                value,
            })
            .collect();

        Self {
            label: label.to_string(),
            points,
        }
    }

    /// Column label used for a symbol, e.g. `daily_returns_BTC`.
    pub fn column_label(symbol: &str) -> String {
        format!("{}{}", RETURN_COLUMN_PREFIX, symbol)
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Percentage change between consecutive values, first element 0.0.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(0.0);
    for w in values.windows(2) {
        let (prev, curr) = (w[0], w[1]);
        if prev == 0.0 {
            out.push(f64::NAN);
        } else {
            out.push((curr - prev) / prev);
        }
    }
    out
}

/// Date-indexed table of per-asset returns, one column per asset.
///
/// Like [`ReturnSeries`] it may hold NaN cells, so it is not serde-enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTable {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ReturnTable {
    /// Build a table from raw parts, validating shape and date order.
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<String>, rows: Vec<Vec<f64>>) -> CrResult<Self> {
        if dates.len() != rows.len() {
            return Err(DataError::ParseError {
                message: format!("{} dates but {} rows", dates.len(), rows.len()),
            }
            .into());
        }
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(DataError::ParseError {
                message: format!("row has {} values for {} columns", row.len(), columns.len()),
            }
            .into());
        }
        if let Some(pair) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(DataError::UnsortedSeries {
                label: columns.join(","),
                date: pair[1].to_string(),
            }
            .into());
        }

        Ok(Self { dates, columns, rows })
    }

    /// Single-column table from one series.
    pub fn from_series(series: &ReturnSeries) -> Self {
        Self {
            dates: series.points.iter().map(|p| p.date).collect(),
            columns: vec![series.label.clone()],
            rows: series.points.iter().map(|p| vec![p.value]).collect(),
        }
    }

    /// Inner join on date: a row survives only if `other` has the same date.
    ///
    /// An empty overlap is an alignment failure, reported as
    /// [`DataError::NoOverlappingDates`].
    pub fn inner_join(self, other: &ReturnSeries) -> CrResult<Self> {
        let mut dates = Vec::new();
        let mut rows = Vec::new();
        let mut theirs = other.points.iter().peekable();

        for (date, mut row) in self.dates.into_iter().zip(self.rows) {
            while theirs.next_if(|p| p.date < date).is_some() {}
            if let Some(p) = theirs.next_if(|p| p.date == date) {
                row.push(p.value);
                dates.push(date);
                rows.push(row);
            }
        }

        if dates.is_empty() {
            return Err(DataError::NoOverlappingDates {
                left: self.columns.join(","),
                right: other.label.clone(),
            }
            .into());
        }

        let mut columns = self.columns;
        columns.push(other.label.clone());
        Ok(Self { dates, columns, rows })
    }

    /// Left-to-right pairwise inner join of every series, in input order.
    pub fn join_all(series: &[ReturnSeries]) -> CrResult<Self> {
        let (first, rest) = series
            .split_first()
            .ok_or_else(|| crate::validation_error!("cannot build a return table from zero series"))?;

        if first.is_empty() {
            return Err(DataError::EmptySeries {
                provider: "return table".to_string(),
                symbol: first.label.clone(),
            }
            .into());
        }

        rest.iter()
            .try_fold(Self::from_series(first), |table, next| table.inner_join(next))
    }

    /// The most recent `n` rows, or the whole table when it is shorter.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.rows.len().saturating_sub(n);
        Self {
            dates: self.dates[start..].to_vec(),
            columns: self.columns.clone(),
            rows: self.rows[start..].to_vec(),
        }
    }

    /// Replace every NaN with `value`.
    pub fn fill_missing(mut self, value: f64) -> Self {
        for cell in self.rows.iter_mut().flatten() {
            if cell.is_nan() {
                *cell = value;
            }
        }
        self
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, label: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == label)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

impl fmt::Display for ReturnTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => write!(
                f,
                "{} rows x {} columns ({} to {})",
                self.num_rows(),
                self.num_columns(),
                first,
                last
            ),
            _ => write!(f, "empty table ({} columns)", self.num_columns()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CrError;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series(label: &str, days: &[u32], values: &[f64]) -> ReturnSeries {
        let points = days
            .iter()
            .zip(values)
            .map(|(&d, &value)| ReturnPoint { date: day(d), value })
            .collect();
        ReturnSeries::new(label, points).unwrap()
    }

    #[test]
    fn prices_convert_to_returns_with_zero_first_row() {
        let prices = PriceSeries::new(
            "BTC",
            vec![
                PricePoint::new(day(1), 100.0),
                PricePoint::new(day(2), 110.0),
                PricePoint::new(day(3), 99.0),
            ],
        );
        let returns = ReturnSeries::from_prices("daily_returns_BTC", &prices);
        let values = returns.values();

        assert_eq!(values.len(), 3);
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 0.10).abs() < 1e-12);
        assert!((values[2] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn zero_price_yields_missing_return() {
        let values = pct_change(&[0.0, 5.0, 10.0]);
        assert_eq!(values[0], 0.0);
        assert!(values[1].is_nan());
        assert!((values[2] - 1.0).abs() < 1e-12);
        assert!(pct_change(&[]).is_empty());
    }

    #[test]
    fn price_series_sorts_and_keeps_last_duplicate() {
        let prices = PriceSeries::new(
            "ETH",
            vec![
                PricePoint::new(day(3), 3.0),
                PricePoint::new(day(1), 1.0),
                PricePoint::new(day(3), 3.5),
                PricePoint::new(day(2), 2.0),
            ],
        );
        let closes: Vec<f64> = prices.points().iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.5]);
        assert_eq!(prices.symbol(), "ETH");
        assert_eq!(prices.clone().last_n(2).len(), 2);
        assert_eq!(prices.between(day(2), day(2)).len(), 1);
    }

    #[test]
    fn newest_first_prices_give_forward_returns() {
        let newest_first: Vec<PricePoint> = [(5, 146.41), (4, 133.1), (3, 121.0), (2, 110.0), (1, 100.0)]
            .iter()
            .map(|&(d, close)| PricePoint::new(day(d), close))
            .collect();
        let returns = ReturnSeries::from_prices("daily_returns_ETH", &PriceSeries::new("ETH", newest_first));

        assert_eq!(returns.first_date(), Some(day(1)));
        assert_eq!(returns.last_date(), Some(day(5)));
        let values = returns.values();
        assert_eq!(values[0], 0.0);
        assert!(values[1..].iter().all(|v| (v - 0.10).abs() < 1e-9));
    }

    #[test]
    fn unsorted_series_is_rejected() {
        let points = vec![
            ReturnPoint { date: day(2), value: 0.0 },
            ReturnPoint { date: day(2), value: 0.1 },
        ];
        let err = ReturnSeries::new("x", points).unwrap_err();
        assert!(matches!(err, CrError::Data(DataError::UnsortedSeries { .. })));
    }

    #[test]
    fn single_overlapping_date_gives_one_row() {
        let a = series("daily_returns_BTC", &[1, 2, 3], &[0.0, 0.1, 0.2]);
        let b = series("daily_returns_DAI", &[3, 4, 5], &[0.0, 0.01, 0.02]);

        let table = ReturnTable::join_all(&[a, b]).unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.dates(), &[day(3)]);
        assert_eq!(table.rows()[0], vec![0.2, 0.0]);
        assert_eq!(table.columns(), &["daily_returns_BTC", "daily_returns_DAI"]);
    }

    #[test]
    fn disjoint_series_raise_no_overlap() {
        let a = series("daily_returns_BTC", &[1, 2], &[0.0, 0.1]);
        let b = series("daily_returns_DAI", &[3, 4], &[0.0, 0.01]);

        let err = ReturnTable::join_all(&[a, b]).unwrap_err();
        assert!(matches!(err, CrError::Data(DataError::NoOverlappingDates { .. })));
    }

    #[test]
    fn join_accumulates_left_to_right() {
        let a = series("a", &[1, 2, 3, 4, 5], &[0.1, 0.2, 0.3, 0.4, 0.5]);
        let b = series("b", &[2, 3, 4, 5], &[1.2, 1.3, 1.4, 1.5]);
        let c = series("c", &[1, 3, 5], &[2.1, 2.3, 2.5]);

        let table = ReturnTable::join_all(&[a, b, c]).unwrap();
        assert_eq!(table.dates(), &[day(3), day(5)]);
        assert_eq!(table.rows()[1], vec![0.5, 1.5, 2.5]);
        assert_eq!(table.column("c"), Some(vec![2.3, 2.5]));
        assert_eq!(table.column("missing"), None);
    }

    #[test]
    fn join_all_rejects_empty_input() {
        assert!(matches!(ReturnTable::join_all(&[]), Err(CrError::Validation(_))));
    }

    #[test]
    fn tail_and_fill_missing() {
        let table = ReturnTable::new(
            vec![day(1), day(2), day(3)],
            vec!["a".into(), "b".into()],
            vec![vec![0.1, f64::NAN], vec![0.2, 0.3], vec![f64::NAN, 0.4]],
        )
        .unwrap();

        let tail = table.tail(2).fill_missing(0.0);
        assert_eq!(tail.dates(), &[day(2), day(3)]);
        assert_eq!(tail.rows(), &[vec![0.2, 0.3], vec![0.0, 0.4]]);

        // longer window than available keeps everything
        assert_eq!(table.tail(10).num_rows(), 3);
        assert!(table.to_string().starts_with("3 rows x 2 columns"));
    }

    #[test]
    fn malformed_table_is_rejected() {
        let err = ReturnTable::new(vec![day(1)], vec!["a".into()], vec![vec![0.1, 0.2]]);
        assert!(err.is_err());
        let err = ReturnTable::new(vec![day(2), day(1)], vec!["a".into()], vec![vec![0.1], vec![0.2]]);
        assert!(err.is_err());
    }
}
