use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One external call worth of cost/usage data, sent fire-and-forget to the
/// telemetry sink after each provider/LLM invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    pub id: String,            // uuid v4
    pub source: String,        // "scorer" | provider label | "deep_research"
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub recorded_at: String,   // RFC 3339
}

impl CostEvent {
    pub fn new(source: &str, duration_ms: u64, success: bool, usage: Option<TokenUsage>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.to_string(),
            duration_ms,
            success,
            usage,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
