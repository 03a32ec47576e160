//! Token classification and fetch-symbol resolution.
//!
//! Wallet tokens are mapped to the symbol a price provider understands and to
//! the provider family that serves it.

use serde::{Deserialize, Serialize};
use std::fmt;

use cr_types::ReturnSeries;

/// Quote currency for every price request.
pub const QUOTE_CURRENCY: &str = "USD";

/// Symbols served by the history API rather than the market-data API.
pub const STABLECOIN_SYMBOLS: [&str; 9] = [
    "DAI", "USDC", "MKR", "TUSD", "USDT", "SAI", "SUSD", "SNX", "LEND",
];

/// Which provider family prices an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClassification {
    /// Stablecoins and legacy DeFi tokens, priced from the history API.
    Stablecoin,
    /// Everything else, priced from the market-data API as `{SYMBOL}-USD`.
    General,
}

impl fmt::Display for AssetClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetClassification::Stablecoin => "Stablecoin",
            AssetClassification::General => "General",
        };
        write!(f, "{}", s)
    }
}

/// Upper-cased symbol with wrapped-bitcoin and legacy-DAI remaps applied.
pub fn fetch_symbol(token: &str) -> String {
    let symbol = if token.eq_ignore_ascii_case("wbtc") {
        token[1..].to_uppercase()
    } else {
        token.to_uppercase()
    };

    // SAI was migrated to DAI; its history lives under the new symbol.
    if symbol == "SAI" {
        "DAI".to_string()
    } else {
        symbol
    }
}

/// Classify an already resolved fetch symbol.
pub fn classify(symbol: &str) -> AssetClassification {
    if STABLECOIN_SYMBOLS.contains(&symbol) {
        AssetClassification::Stablecoin
    } else {
        AssetClassification::General
    }
}

/// Everything needed to request prices for one wallet token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTarget {
    pub token: String,
    pub symbol: String,
    pub classification: AssetClassification,
}

impl FetchTarget {
    pub fn resolve(token: &str) -> Self {
        let symbol = fetch_symbol(token);
        let classification = classify(&symbol);
        Self {
            token: token.to_string(),
            symbol,
            classification,
        }
    }

    /// Symbol string sent to the provider.
    pub fn provider_symbol(&self) -> String {
        match self.classification {
            AssetClassification::Stablecoin => self.symbol.clone(),
            AssetClassification::General => format!("{}-{}", self.symbol, QUOTE_CURRENCY),
        }
    }

    pub fn column_label(&self) -> String {
        ReturnSeries::column_label(&self.symbol)
    }
}
