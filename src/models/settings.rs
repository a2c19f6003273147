use serde::{Deserialize, Serialize};

/// Connection settings for the LLM scoring collaborator. OpenAI-compatible
/// chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model_name: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

/// Per-provider price API settings. Providers without a key are treated as
/// not configured and skipped by the resolver chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub crypto_api_key: String,
    #[serde(default)]
    pub enriched_api_key: String,
    #[serde(default)]
    pub time_series_api_key: String,
    // the market-data endpoint is keyless; always available as last resort
    #[serde(default = "default_crypto_timeout")]
    pub crypto_timeout_secs: u64,
    #[serde(default = "default_provider_timeout")]
    pub enriched_timeout_secs: u64,
    #[serde(default = "default_provider_timeout")]
    pub time_series_timeout_secs: u64,
    #[serde(default = "default_market_data_timeout")]
    pub market_data_timeout_secs: u64,
}

fn default_crypto_timeout() -> u64 { 10 }
fn default_provider_timeout() -> u64 { 25 }
fn default_market_data_timeout() -> u64 { 15 }

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            crypto_api_key: String::new(),
            enriched_api_key: String::new(),
            time_series_api_key: String::new(),
            crypto_timeout_secs: default_crypto_timeout(),
            enriched_timeout_secs: default_provider_timeout(),
            time_series_timeout_secs: default_provider_timeout(),
            market_data_timeout_secs: default_market_data_timeout(),
        }
    }
}

/// Settings for the deep-research collaborator endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_research_breadth")]
    pub breadth: u32,
    #[serde(default = "default_research_depth")]
    pub depth: u32,
    #[serde(default = "default_research_timeout")]
    pub timeout_secs: u64,
}

fn default_research_breadth() -> u32 { 3 }
fn default_research_depth() -> u32 { 2 }
fn default_research_timeout() -> u64 { 300 }

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            breadth: default_research_breadth(),
            depth: default_research_depth(),
            timeout_secs: default_research_timeout(),
        }
    }
}

/// Run-level knobs for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Absolute 7-day change % above which a snapshot becomes a price alert.
    #[serde(default = "default_alert_threshold")]
    pub price_alert_threshold: f64,
    /// Max concurrent classify+match tasks (scoring collaborator rate limit).
    #[serde(default = "default_classify_fanout")]
    pub classify_fanout: usize,
    /// Max in-flight symbol look-ups during batch price resolution.
    #[serde(default = "default_price_fanout")]
    pub price_fanout: usize,
    /// Fixed backoff before the single retry of a failed provider call.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
    /// TTL for the advisory snapshot/news cache. 0 disables caching.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

fn default_alert_threshold() -> f64 { 5.0 }
fn default_classify_fanout() -> usize { 4 }
fn default_price_fanout() -> usize { 3 }
fn default_retry_backoff() -> u64 { 2 }
fn default_cache_ttl() -> u64 { 300 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            price_alert_threshold: default_alert_threshold(),
            classify_fanout: default_classify_fanout(),
            price_fanout: default_price_fanout(),
            retry_backoff_secs: default_retry_backoff(),
            cache_ttl_secs: default_cache_ttl(),
            scorer: ScorerConfig::default(),
            providers: ProviderConfig::default(),
            research: ResearchConfig::default(),
        }
    }
}
