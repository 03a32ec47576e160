use thiserror::Error;

/// Main error type for the crypto risk workspace
#[derive(Error, Debug)]
pub enum CrError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Price-history and alignment errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("Provider {provider} returned no prices for {symbol}")]
    EmptySeries { provider: String, symbol: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Series {label} is not strictly ascending at {date}")]
    UnsortedSeries { label: String, date: String },

    #[error("No overlapping dates between [{left}] and [{right}]")]
    NoOverlappingDates { left: String, right: String },
}

/// Degenerate-input errors raised by weighting, risk and normalization math
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("No balances supplied")]
    EmptyBalances,

    #[error("Negative liquidity for {token}: {liquidity}")]
    NegativeLiquidity {
        token: String,
        liquidity: rust_decimal::Decimal,
    },

    #[error("Total liquidity is zero, weights are undefined")]
    ZeroTotalLiquidity,

    #[error("Reference list is empty")]
    EmptyReferenceList,

    #[error("Degenerate range: min {min} equals max {max}")]
    DegenerateRange { min: f64, max: f64 },

    #[error("Invalid EMA range {range} for {len} values")]
    InvalidEmaRange { range: usize, len: usize },

    #[error("Confidence level must lie in (0, 1), got {alpha}")]
    InvalidAlpha { alpha: f64 },

    #[error("Lookback window must be positive, got {lookback_days}")]
    InvalidLookback { lookback_days: usize },

    #[error("Weight vector has {actual} entries but table has {expected} columns")]
    WeightMismatch { expected: usize, actual: usize },

    #[error("Return table has no rows")]
    EmptyTable,

    #[error("Weight vector contains non-finite values")]
    NonFiniteWeights,

    #[error("Weight {index} is negative: {weight}")]
    NegativeWeight { index: usize, weight: f64 },

    #[error("Weights must sum to 1, got {sum}")]
    WeightSumMismatch { sum: f64 },
}

/// Result type alias for crypto risk operations
pub type CrResult<T> = Result<T, CrError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::CrError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::CrError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::CrError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let error = RiskError::NegativeLiquidity {
            token: "usdc".to_string(),
            liquidity: dec!(-12.5),
        };

        assert!(error.to_string().contains("Negative liquidity"));
        assert!(error.to_string().contains("usdc"));
        assert!(error.to_string().contains("-12.5"));
    }

    #[test]
    fn test_error_conversion() {
        let data_error = DataError::NoOverlappingDates {
            left: "daily_returns_BTC".to_string(),
            right: "daily_returns_DAI".to_string(),
        };
        let cr_error: CrError = data_error.into();

        match cr_error {
            CrError::Data(DataError::NoOverlappingDates { .. }) => (),
            _ => panic!("Expected NoOverlappingDates data error"),
        }

        let cr_error: CrError = RiskError::ZeroTotalLiquidity.into();
        assert!(matches!(cr_error, CrError::Risk(RiskError::ZeroTotalLiquidity)));
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(matches!(validation_err, CrError::Validation(_)));
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, CrError::Internal(_)));
        let config_err = config_error!("Missing required field: {}", "base_url");
        assert_eq!(config_err.to_string(), "Configuration error: Missing required field: base_url");
    }
}
