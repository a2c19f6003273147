use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::price::{PriceSnapshot, ProviderKind};
use crate::models::settings::ProviderConfig;
use crate::utils::http::build_quote_client;

// ============================================================
// Static symbol tables
// ============================================================

/// Ticker -> CoinGecko coin id. Unknown tickers fall back to the lowercased
/// ticker, which covers most long-tail coins.
const CRYPTO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("BNB", "binancecoin"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("LTC", "litecoin"),
    ("AVAX", "avalanche-2"),
];

/// Commodity ticker -> Yahoo futures symbol.
const COMMODITY_FUTURES: &[(&str, &str)] = &[
    ("GOLD", "GC=F"),
    ("SILVER", "SI=F"),
    ("OIL", "CL=F"),
    ("WTI", "CL=F"),
    ("BRENT", "BZ=F"),
    ("NATGAS", "NG=F"),
    ("COPPER", "HG=F"),
];

/// Broad index/sector ETFs that the cheap market-data endpoint serves well;
/// the resolver puts it first in their chain.
const KNOWN_ETFS: &[&str] = &[
    "SPY", "VOO", "IVV", "QQQ", "DIA", "VTI", "IWM", "EFA", "AGG", "GLD",
];

pub fn is_known_etf(symbol: &str) -> bool {
    KNOWN_ETFS.contains(&symbol)
}

pub fn coingecko_id(symbol: &str) -> String {
    CRYPTO_IDS
        .iter()
        .find(|(ticker, _)| *ticker == symbol)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}

pub fn is_crypto_symbol(symbol: &str) -> bool {
    CRYPTO_IDS.iter().any(|(ticker, _)| *ticker == symbol)
}

/// Yahoo-side alias for a caller symbol. Cryptos quote as {SYM}-USD pairs,
/// commodities as futures contracts, everything else passes through.
pub fn yahoo_symbol(symbol: &str) -> String {
    if let Some((_, alias)) = COMMODITY_FUTURES.iter().find(|(ticker, _)| *ticker == symbol) {
        return alias.to_string();
    }
    if is_crypto_symbol(symbol) {
        return format!("{}-USD", symbol);
    }
    symbol.to_string()
}

// ============================================================
// QuoteProvider capability
// ============================================================

/// One price source. The resolver walks an ordered list of these; each call
/// is bounded by the provider client's own timeout.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// False when the provider needs an API key that is not configured; the
    /// resolver skips it without counting an attempt.
    fn configured(&self) -> bool {
        true
    }

    /// Normalized snapshot for the caller's symbol. The returned `symbol`
    /// field is always the caller's uppercased symbol, never the provider's
    /// internal alias.
    async fn quote(&self, symbol: &str) -> Result<PriceSnapshot>;
}

// ============================================================
// 1. CoinGecko — dedicated crypto quotes
// ============================================================

const COINGECKO_MARKETS_URL: &str = "https://api.coingecko.com/api/v3/coins/markets";

pub struct CryptoQuoteApi {
    client: reqwest::Client,
    api_key: String,
}

impl CryptoQuoteApi {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_quote_client(config.crypto_timeout_secs)?,
            api_key: config.crypto_api_key.clone(),
        })
    }
}

#[async_trait]
impl QuoteProvider for CryptoQuoteApi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CryptoQuote
    }

    async fn quote(&self, symbol: &str) -> Result<PriceSnapshot> {
        let id = coingecko_id(symbol);
        let url = format!(
            "{}?vs_currency=usd&ids={}&price_change_percentage=24h,7d",
            COINGECKO_MARKETS_URL,
            urlencoding::encode(&id)
        );

        let mut req = self.client.get(&url);
        if !self.api_key.is_empty() {
            req = req.header("x-cg-demo-api-key", &self.api_key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("coingecko error ({})", status));
        }

        let json: Value = resp.json().await?;
        let coin = json
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| anyhow!("coingecko: no market entry for {}", id))?;

        let current = coin["current_price"]
            .as_f64()
            .ok_or_else(|| anyhow!("coingecko: missing current_price for {}", id))?;
        let change_1d = coin["price_change_percentage_24h"].as_f64();

        // 7d change comes as a percentage; derive the baseline from it so
        // the snapshot invariant still holds within one provider call
        match coin["price_change_percentage_7d_in_currency"].as_f64() {
            Some(pct7) if pct7 > -100.0 => {
                let baseline = current / (1.0 + pct7 / 100.0);
                Ok(PriceSnapshot::with_lookback(
                    symbol,
                    current,
                    baseline,
                    change_1d,
                    ProviderKind::CryptoQuote,
                ))
            }
            _ => Ok(PriceSnapshot::quote_only(
                symbol,
                current,
                change_1d,
                ProviderKind::CryptoQuote,
            )),
        }
    }
}

// ============================================================
// 2. Financial Modeling Prep — enriched equity payload
// ============================================================

const FMP_HISTORY_URL: &str = "https://financialmodelingprep.com/api/v3/historical-price-full";

pub struct EnrichedQuoteApi {
    client: reqwest::Client,
    api_key: String,
}

impl EnrichedQuoteApi {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_quote_client(config.enriched_timeout_secs)?,
            api_key: config.enriched_api_key.clone(),
        })
    }
}

#[async_trait]
impl QuoteProvider for EnrichedQuoteApi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::EnrichedQuote
    }

    fn configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn quote(&self, symbol: &str) -> Result<PriceSnapshot> {
        // 8 calendar rows: today plus roughly one week of trading days
        let url = format!(
            "{}/{}?timeseries=8&apikey={}",
            FMP_HISTORY_URL,
            urlencoding::encode(symbol),
            self.api_key
        );

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("fmp error ({})", status));
        }

        let json: Value = resp.json().await?;
        let historical = json["historical"]
            .as_array()
            .filter(|arr| !arr.is_empty())
            .ok_or_else(|| anyhow!("fmp: empty history for {}", symbol))?;

        // newest first
        let latest = &historical[0];
        let oldest = &historical[historical.len() - 1];

        let current = latest["close"]
            .as_f64()
            .ok_or_else(|| anyhow!("fmp: missing close for {}", symbol))?;
        let week_ago = oldest["close"]
            .as_f64()
            .ok_or_else(|| anyhow!("fmp: missing look-back close for {}", symbol))?;
        let change_1d = latest["changePercent"].as_f64();

        Ok(PriceSnapshot::with_lookback(
            symbol,
            current,
            week_ago,
            change_1d,
            ProviderKind::EnrichedQuote,
        ))
    }
}

// ============================================================
// 3. Alpha Vantage — daily close series
// ============================================================

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

pub struct TimeSeriesApi {
    client: reqwest::Client,
    api_key: String,
}

impl TimeSeriesApi {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_quote_client(config.time_series_timeout_secs)?,
            api_key: config.time_series_api_key.clone(),
        })
    }
}

#[async_trait]
impl QuoteProvider for TimeSeriesApi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::TimeSeries
    }

    fn configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn quote(&self, symbol: &str) -> Result<PriceSnapshot> {
        let url = format!(
            "{}?function=TIME_SERIES_DAILY&symbol={}&apikey={}",
            ALPHA_VANTAGE_URL,
            urlencoding::encode(symbol),
            self.api_key
        );

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("alphavantage error ({})", status));
        }

        let json: Value = resp.json().await?;
        // rate-limit and bad-symbol replies come back as 200 with a note
        if let Some(note) = json["Note"].as_str() {
            return Err(anyhow!("alphavantage throttled (429): {}", note));
        }
        if let Some(msg) = json["Error Message"].as_str() {
            return Err(anyhow!("alphavantage rejected {}: {}", symbol, msg));
        }

        let series = json["Time Series (Daily)"]
            .as_object()
            .ok_or_else(|| anyhow!("alphavantage: missing series for {}", symbol))?;

        let mut days: Vec<(&String, f64)> = series
            .iter()
            .filter_map(|(date, row)| {
                row["4. close"]
                    .as_str()
                    .and_then(|s| s.parse::<f64>().ok())
                    .map(|close| (date, close))
            })
            .collect();
        if days.is_empty() {
            return Err(anyhow!("alphavantage: empty series for {}", symbol));
        }
        days.sort_by(|a, b| b.0.cmp(a.0)); // newest first, dates are ISO

        let (latest_date, current) = (days[0].0.clone(), days[0].1);
        let week_ago = lookback_close(&days, &latest_date)
            .unwrap_or_else(|| days[days.len() - 1].1);
        let change_1d = days
            .get(1)
            .filter(|(_, prev)| *prev != 0.0)
            .map(|(_, prev)| (current - prev) / prev * 100.0);

        Ok(PriceSnapshot::with_lookback(
            symbol,
            current,
            week_ago,
            change_1d,
            ProviderKind::TimeSeries,
        ))
    }
}

/// Close of the first trading day at least 7 calendar days before the
/// latest date. Days are sorted newest first.
fn lookback_close(days: &[(&String, f64)], latest_date: &str) -> Option<f64> {
    let latest = chrono::NaiveDate::parse_from_str(latest_date, "%Y-%m-%d").ok()?;
    let cutoff = latest - chrono::Duration::days(7);
    days.iter()
        .find(|(date, _)| {
            chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map(|d| d <= cutoff)
                .unwrap_or(false)
        })
        .map(|(_, close)| *close)
}

// ============================================================
// 4. Yahoo chart — keyless last resort
// ============================================================

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

pub struct MarketDataApi {
    client: reqwest::Client,
}

impl MarketDataApi {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_quote_client(config.market_data_timeout_secs)?,
        })
    }
}

#[async_trait]
impl QuoteProvider for MarketDataApi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MarketData
    }

    async fn quote(&self, symbol: &str) -> Result<PriceSnapshot> {
        let alias = yahoo_symbol(symbol);
        let url = format!(
            "{}/{}?range=7d&interval=1d",
            YAHOO_CHART_URL,
            urlencoding::encode(&alias)
        );

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("yahoo chart error ({}) for {}", status, alias));
        }

        let json: Value = resp.json().await?;
        let result = json["chart"]["result"]
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| anyhow!("yahoo chart: no result for {}", alias))?;

        let meta = &result["meta"];
        let closes: Vec<f64> = result["indicators"]["quote"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|q| q["close"].as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_f64()).collect())
            .unwrap_or_default();

        let current = meta["regularMarketPrice"]
            .as_f64()
            .or_else(|| closes.last().copied())
            .ok_or_else(|| anyhow!("yahoo chart: no price for {}", alias))?;

        let change_1d = meta["chartPreviousClose"]
            .as_f64()
            .filter(|prev| *prev != 0.0)
            .map(|prev| (current - prev) / prev * 100.0);

        // first close in the 7d window is the look-back baseline; a bare
        // quote with no series degrades to an explicit zero change
        match closes.first() {
            Some(week_ago) if *week_ago != 0.0 => Ok(PriceSnapshot::with_lookback(
                symbol,
                current,
                *week_ago,
                change_1d,
                ProviderKind::MarketData,
            )),
            _ => Ok(PriceSnapshot::quote_only(
                symbol,
                current,
                change_1d,
                ProviderKind::MarketData,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coingecko_id_mapping() {
        assert_eq!(coingecko_id("BTC"), "bitcoin");
        assert_eq!(coingecko_id("AVAX"), "avalanche-2");
        assert_eq!(coingecko_id("NEWCOIN"), "newcoin");
    }

    #[test]
    fn test_yahoo_symbol_aliases() {
        assert_eq!(yahoo_symbol("BTC"), "BTC-USD");
        assert_eq!(yahoo_symbol("GOLD"), "GC=F");
        assert_eq!(yahoo_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn test_known_etfs() {
        assert!(is_known_etf("SPY"));
        assert!(!is_known_etf("AAPL"));
    }

    #[test]
    fn test_lookback_close_picks_oldest_within_window() {
        let d1 = "2026-08-07".to_string();
        let d2 = "2026-08-04".to_string();
        let d3 = "2026-07-31".to_string();
        let d4 = "2026-07-29".to_string();
        let days: Vec<(&String, f64)> = vec![(&d1, 110.0), (&d2, 108.0), (&d3, 100.0), (&d4, 98.0)];
        // cutoff is 2026-07-31; first date at or before it wins
        assert_eq!(lookback_close(&days, "2026-08-07"), Some(100.0));
    }

    #[test]
    fn test_lookback_close_none_when_series_too_short() {
        let d1 = "2026-08-07".to_string();
        let d2 = "2026-08-06".to_string();
        let days: Vec<(&String, f64)> = vec![(&d1, 110.0), (&d2, 108.0)];
        assert_eq!(lookback_close(&days, "2026-08-07"), None);
    }
}
