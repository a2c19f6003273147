use thiserror::Error;

/// Failure taxonomy for the pipeline. Per-item and per-symbol failures are
/// isolated and recorded on the run result; only `EmptyHoldings` is fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Scoring collaborator unreachable or returned a malformed response.
    /// The item stays unscored; a fabricated score is never substituted.
    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    /// A single market-data provider failed. Triggers fallback, not fatal.
    #[error("provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: &'static str, reason: String },

    /// Every provider in a symbol's chain failed. The resolver reports this
    /// as "no data"; it never escapes to the orchestrator as an error.
    #[error("all providers exhausted for {symbol}")]
    AllProvidersExhausted { symbol: String },

    /// Deep-research collaborator errored; recorded on the escalation entry.
    #[error("deep research failed: {0}")]
    DeepResearchFailed(String),

    /// Configuration error. The only failure that aborts a run.
    #[error("holdings list is empty")]
    EmptyHoldings,
}
