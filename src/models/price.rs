use serde::{Deserialize, Serialize};

/// Which provider actually produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "crypto_quote")]
    CryptoQuote,
    #[serde(rename = "enriched_quote")]
    EnrichedQuote,
    #[serde(rename = "time_series")]
    TimeSeries,
    #[serde(rename = "market_data")]
    MarketData,
}

impl ProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::CryptoQuote => "crypto_quote",
            ProviderKind::EnrichedQuote => "enriched_quote",
            ProviderKind::TimeSeries => "time_series",
            ProviderKind::MarketData => "market_data",
        }
    }
}

/// One point-in-time price read for a symbol, normalized across providers.
/// All fields come from a single provider call; snapshots are never merged
/// across providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: String,        // caller's uppercased symbol, never a provider alias
    pub current_price: f64,
    pub price_7d_ago: f64,     // 0.0 when the provider has no look-back
    pub change_percent: f64,   // 7-day change %, explicit 0.0 when unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent_1d: Option<f64>,
    pub provider: ProviderKind,
}

impl PriceSnapshot {
    /// Snapshot from a provider that offers a 7-day look-back.
    pub fn with_lookback(
        symbol: &str,
        current: f64,
        seven_days_ago: f64,
        change_1d: Option<f64>,
        provider: ProviderKind,
    ) -> Self {
        let change = if seven_days_ago != 0.0 {
            (current - seven_days_ago) / seven_days_ago * 100.0
        } else {
            0.0
        };
        Self {
            symbol: symbol.to_uppercase(),
            current_price: current,
            price_7d_ago: seven_days_ago,
            change_percent: change,
            change_percent_1d: change_1d,
            provider,
        }
    }

    /// Snapshot from a quote-only provider. The 7-day change is explicitly
    /// zero, never extrapolated.
    pub fn quote_only(symbol: &str, current: f64, change_1d: Option<f64>, provider: ProviderKind) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            current_price: current,
            price_7d_ago: 0.0,
            change_percent: 0.0,
            change_percent_1d: change_1d,
            provider,
        }
    }
}
