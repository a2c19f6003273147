use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::models::error::PipelineError;
use crate::models::escalation::FailedSymbol;
use crate::models::holding::HoldingKind;
use crate::models::price::PriceSnapshot;
use crate::models::settings::PipelineConfig;
use crate::models::telemetry::CostEvent;
use crate::services::providers::{
    is_known_etf, CryptoQuoteApi, EnrichedQuoteApi, MarketDataApi, QuoteProvider, TimeSeriesApi,
};
use crate::services::telemetry::CostRecorder;
use crate::utils::cache::TtlCache;
use crate::utils::retry::retry_once;

/// Ordered provider list per symbol class. First success wins.
pub struct ProviderChains {
    pub crypto: Vec<Arc<dyn QuoteProvider>>,
    pub etf: Vec<Arc<dyn QuoteProvider>>,
    pub equity: Vec<Arc<dyn QuoteProvider>>,
    pub commodity: Vec<Arc<dyn QuoteProvider>>,
}

/// Walks a symbol's provider chain until one source yields a snapshot.
/// Total wait is bounded by the per-provider client timeouts plus one fixed
/// backoff per attempted provider; the resolver itself holds no state
/// between calls apart from the advisory TTL cache.
pub struct PriceResolver {
    chains: ProviderChains,
    backoff: Duration,
    fanout: usize,
    cache: TtlCache<PriceSnapshot>,
    recorder: CostRecorder,
}

pub struct BatchQuotes {
    pub snapshots: Vec<PriceSnapshot>,
    pub failed: Vec<FailedSymbol>,
}

impl PriceResolver {
    /// Production wiring: the four real providers in the standard chains.
    pub fn from_config(config: &PipelineConfig, recorder: CostRecorder) -> anyhow::Result<Self> {
        let crypto: Arc<dyn QuoteProvider> = Arc::new(CryptoQuoteApi::new(&config.providers)?);
        let enriched: Arc<dyn QuoteProvider> = Arc::new(EnrichedQuoteApi::new(&config.providers)?);
        let series: Arc<dyn QuoteProvider> = Arc::new(TimeSeriesApi::new(&config.providers)?);
        let market: Arc<dyn QuoteProvider> = Arc::new(MarketDataApi::new(&config.providers)?);

        let chains = ProviderChains {
            crypto: vec![crypto, market.clone()],
            // the keyless endpoint serves broad ETFs well and is the
            // cheapest, so it goes first for them
            etf: vec![market.clone(), enriched.clone(), series.clone()],
            equity: vec![enriched.clone(), series, market.clone()],
            commodity: vec![market, enriched],
        };

        Ok(Self::with_chains(chains, config, recorder))
    }

    /// Test wiring: arbitrary chains.
    pub fn with_chains(chains: ProviderChains, config: &PipelineConfig, recorder: CostRecorder) -> Self {
        Self {
            chains,
            backoff: Duration::from_secs(config.retry_backoff_secs),
            fanout: config.price_fanout.max(1),
            cache: TtlCache::new(Duration::from_secs(config.cache_ttl_secs)),
            recorder,
        }
    }

    fn chain_for(&self, symbol: &str, kind: HoldingKind) -> &[Arc<dyn QuoteProvider>] {
        match kind {
            HoldingKind::Crypto => &self.chains.crypto,
            HoldingKind::Commodity => &self.chains.commodity,
            HoldingKind::Stock => {
                if is_known_etf(symbol) {
                    &self.chains.etf
                } else {
                    &self.chains.equity
                }
            }
        }
    }

    /// Resolves one symbol, or `None` when every provider in its chain
    /// failed. Exhaustion is an outcome, not an error.
    pub async fn resolve(&self, symbol: &str, kind: HoldingKind) -> Option<PriceSnapshot> {
        self.resolve_detailed(symbol, kind).await.ok()
    }

    async fn resolve_detailed(
        &self,
        symbol: &str,
        kind: HoldingKind,
    ) -> Result<PriceSnapshot, PipelineError> {
        let symbol = symbol.to_uppercase();

        if let Some(hit) = self.cache.get(&symbol) {
            log::debug!("price cache hit for {}", symbol);
            return Ok(hit);
        }

        for provider in self.chain_for(&symbol, kind) {
            let label = provider.kind().label();
            if !provider.configured() {
                log::debug!("provider {} not configured, skipping for {}", label, symbol);
                continue;
            }

            let started = Instant::now();
            let attempt = retry_once(self.backoff, label, || provider.quote(&symbol)).await;
            self.recorder.record(CostEvent::new(
                label,
                started.elapsed().as_millis() as u64,
                attempt.is_ok(),
                None,
            ));

            match attempt {
                Ok(snapshot) => {
                    self.cache.put(&symbol, snapshot.clone());
                    return Ok(snapshot);
                }
                Err(e) => {
                    let unavailable = PipelineError::ProviderUnavailable {
                        provider: label,
                        reason: e.to_string(),
                    };
                    log::warn!("{}; trying next provider for {}", unavailable, symbol);
                }
            }
        }

        log::warn!("all providers exhausted for {}", symbol);
        Err(PipelineError::AllProvidersExhausted { symbol })
    }

    /// Resolves many symbols with bounded concurrency and reports which
    /// ones failed. Completion order does not matter to callers; snapshots
    /// carry their own symbol.
    pub async fn resolve_batch(&self, requests: &[(String, HoldingKind)]) -> BatchQuotes {
        let outcomes: Vec<_> = futures::stream::iter(requests.iter().cloned())
            .map(|(symbol, kind)| async move { self.resolve_detailed(&symbol, kind).await })
            .buffer_unordered(self.fanout)
            .collect()
            .await;

        let mut snapshots = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    let symbol = match &e {
                        PipelineError::AllProvidersExhausted { symbol } => symbol.clone(),
                        _ => String::new(),
                    };
                    failed.push(FailedSymbol {
                        symbol,
                        reason: e.to_string(),
                    });
                }
            }
        }
        BatchQuotes { snapshots, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::price::ProviderKind;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeProvider {
        kind: ProviderKind,
        calls: AtomicU32,
        outcome: FakeOutcome,
        configured: bool,
    }

    enum FakeOutcome {
        Timeout,
        Rejected,
        Price { current: f64, week_ago: f64 },
    }

    impl FakeProvider {
        fn timing_out(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicU32::new(0),
                outcome: FakeOutcome::Timeout,
                configured: true,
            })
        }

        fn rejecting(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicU32::new(0),
                outcome: FakeOutcome::Rejected,
                configured: true,
            })
        }

        fn succeeding(kind: ProviderKind, current: f64, week_ago: f64) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicU32::new(0),
                outcome: FakeOutcome::Price { current, week_ago },
                configured: true,
            })
        }

        fn unconfigured(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicU32::new(0),
                outcome: FakeOutcome::Rejected,
                configured: false,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteProvider for FakeProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn configured(&self) -> bool {
            self.configured
        }

        async fn quote(&self, symbol: &str) -> anyhow::Result<PriceSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                FakeOutcome::Timeout => Err(anyhow!("operation timed out")),
                FakeOutcome::Rejected => Err(anyhow!("HTTP 404 unknown symbol")),
                FakeOutcome::Price { current, week_ago } => Ok(PriceSnapshot::with_lookback(
                    symbol,
                    *current,
                    *week_ago,
                    None,
                    self.kind,
                )),
            }
        }
    }

    fn resolver_with_equity_chain(chain: Vec<Arc<dyn QuoteProvider>>) -> PriceResolver {
        let chains = ProviderChains {
            crypto: vec![],
            etf: vec![],
            equity: chain,
            commodity: vec![],
        };
        let mut config = PipelineConfig::default();
        config.cache_ttl_secs = 0;
        PriceResolver::with_chains(chains, &config, CostRecorder::disabled())
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_to_last_resort_provider() {
        // first two providers time out, the last resort succeeds
        let first = FakeProvider::timing_out(ProviderKind::EnrichedQuote);
        let second = FakeProvider::timing_out(ProviderKind::TimeSeries);
        let third = FakeProvider::succeeding(ProviderKind::MarketData, 100.0, 95.0);
        let resolver = resolver_with_equity_chain(vec![first.clone(), second.clone(), third.clone()]);

        let snap = resolver.resolve("xyz", HoldingKind::Stock).await.unwrap();
        assert_eq!(snap.provider, ProviderKind::MarketData);
        assert_eq!(snap.symbol, "XYZ");
        assert!((snap.change_percent - 5.2631578947).abs() < 1e-6);

        // timeouts are retryable: one retry each before falling through
        assert_eq!(first.calls(), 2);
        assert_eq!(second.calls(), 2);
        assert_eq!(third.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_moves_on_without_retry() {
        let first = FakeProvider::rejecting(ProviderKind::EnrichedQuote);
        let second = FakeProvider::succeeding(ProviderKind::MarketData, 50.0, 50.0);
        let resolver = resolver_with_equity_chain(vec![first.clone(), second.clone()]);

        let snap = resolver.resolve("ABC", HoldingKind::Stock).await.unwrap();
        assert_eq!(snap.provider, ProviderKind::MarketData);
        assert_eq!(first.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chain_is_no_data_not_panic() {
        let first = FakeProvider::timing_out(ProviderKind::EnrichedQuote);
        let second = FakeProvider::rejecting(ProviderKind::MarketData);
        let resolver = resolver_with_equity_chain(vec![first, second]);

        assert!(resolver.resolve("XYZ", HoldingKind::Stock).await.is_none());

        let batch = resolver
            .resolve_batch(&[("XYZ".to_string(), HoldingKind::Stock)])
            .await;
        assert!(batch.snapshots.is_empty());
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].symbol, "XYZ");
        assert!(batch.failed[0].reason.contains("exhausted"));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_skipped() {
        let first = FakeProvider::unconfigured(ProviderKind::EnrichedQuote);
        let second = FakeProvider::succeeding(ProviderKind::MarketData, 10.0, 10.0);
        let resolver = resolver_with_equity_chain(vec![first.clone(), second]);

        let snap = resolver.resolve("ABC", HoldingKind::Stock).await.unwrap();
        assert_eq!(snap.provider, ProviderKind::MarketData);
        assert_eq!(first.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_short_circuits_second_resolution() {
        let provider = FakeProvider::succeeding(ProviderKind::MarketData, 20.0, 19.0);
        let chains = ProviderChains {
            crypto: vec![],
            etf: vec![],
            equity: vec![provider.clone()],
            commodity: vec![],
        };
        let config = PipelineConfig::default(); // 300s TTL
        let resolver = PriceResolver::with_chains(chains, &config, CostRecorder::disabled());

        let first = resolver.resolve("AAPL", HoldingKind::Stock).await.unwrap();
        let second = resolver.resolve("AAPL", HoldingKind::Stock).await.unwrap();
        assert_eq!(first.current_price, second.current_price);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_reports_mixed_outcomes() {
        let ok = FakeProvider::succeeding(ProviderKind::MarketData, 30.0, 29.0);
        let chains = ProviderChains {
            crypto: vec![],
            etf: vec![ok.clone()],
            equity: vec![ok],
            commodity: vec![],
        };
        let mut config = PipelineConfig::default();
        config.cache_ttl_secs = 0;
        let resolver = PriceResolver::with_chains(chains, &config, CostRecorder::disabled());

        let batch = resolver
            .resolve_batch(&[
                ("AAPL".to_string(), HoldingKind::Stock),
                ("BTC".to_string(), HoldingKind::Crypto), // empty crypto chain
            ])
            .await;
        assert_eq!(batch.snapshots.len(), 1);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].symbol, "BTC");
    }
}
