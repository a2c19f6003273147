use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::article::ArticleScore;
use crate::models::error::PipelineError;
use crate::models::holding::{CandidateItem, Holding};
use crate::models::settings::ScorerConfig;
use crate::models::telemetry::{CostEvent, TokenUsage};
use crate::services::telemetry::CostRecorder;
use crate::utils::http::build_ai_client;
use crate::utils::retry::retry_once;

// ============================================================
// Source trust tiers
// ============================================================

// Tier lists are checked in order; the first list containing the host wins.
const TIER1_SOURCES: &[&str] = &[
    "bloomberg.com",
    "reuters.com",
    "wsj.com",
    "ft.com",
    "cnbc.com",
    "marketwatch.com",
    "barrons.com",
    "economist.com",
];

const TIER2_SOURCES: &[&str] = &[
    "seekingalpha.com",
    "fool.com",
    "investing.com",
    "businessinsider.com",
    "forbes.com",
    "finance.yahoo.com",
    "benzinga.com",
];

const TIER3_SOURCES: &[&str] = &[
    "reddit.com",
    "stocktwits.com",
    "twitter.com",
    "x.com",
    "medium.com",
    "blogspot.",
    "substack.com",
];

const TIER1_QUALITY: f64 = 1.0;
const TIER2_QUALITY: f64 = 0.5;
const TIER3_QUALITY: f64 = 0.0;
const DEFAULT_QUALITY: f64 = 0.5;

/// Trust score for a publisher host. Substring containment against the
/// three static tier lists, tier 1 checked first; unknown hosts sit in the
/// middle.
pub fn source_quality(source_host: &str) -> f64 {
    let host = source_host.to_lowercase();
    if TIER1_SOURCES.iter().any(|s| host.contains(s)) {
        return TIER1_QUALITY;
    }
    if TIER2_SOURCES.iter().any(|s| host.contains(s)) {
        return TIER2_QUALITY;
    }
    if TIER3_SOURCES.iter().any(|s| host.contains(s)) {
        return TIER3_QUALITY;
    }
    DEFAULT_QUALITY
}

// ============================================================
// Scorer capability
// ============================================================

/// What the scoring collaborator returns for one item.
#[derive(Debug, Clone)]
pub struct ScorerVerdict {
    pub impact: u8,       // 1-10
    pub relevance: f64,   // 0-1
    pub reasoning: String,
    pub usage: Option<TokenUsage>,
}

/// Opaque impact/relevance scorer. Production wiring injects the LLM-backed
/// implementation; tests inject a deterministic fake.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, item_text: &str, holdings: &[Holding]) -> Result<ScorerVerdict>;
}

// ============================================================
// Classifier
// ============================================================

pub struct ArticleClassifier {
    scorer: Arc<dyn Scorer>,
    recorder: CostRecorder,
}

impl ArticleClassifier {
    pub fn new(scorer: Arc<dyn Scorer>, recorder: CostRecorder) -> Self {
        Self { scorer, recorder }
    }

    /// Scores one candidate item. The scoring collaborator may fail; the
    /// caller must then treat the item as not-yet-scored — a fabricated
    /// default score is never substituted.
    pub async fn classify(
        &self,
        item: &CandidateItem,
        holdings: &[Holding],
    ) -> std::result::Result<ArticleScore, PipelineError> {
        if item.url.trim().is_empty() {
            return Err(PipelineError::ClassificationFailed(
                "candidate item has empty url".to_string(),
            ));
        }

        let started = Instant::now();
        let outcome = self.scorer.score(&item.text(), holdings).await;
        self.recorder.record(CostEvent::new(
            "scorer",
            started.elapsed().as_millis() as u64,
            outcome.is_ok(),
            outcome.as_ref().ok().and_then(|v| v.usage.clone()),
        ));

        let verdict = outcome.map_err(|e| PipelineError::ClassificationFailed(e.to_string()))?;

        // with no holdings configured, relevance is trivially zero
        let relevance = if holdings.is_empty() { 0.0 } else { verdict.relevance };

        Ok(ArticleScore::new(
            verdict.impact,
            relevance,
            source_quality(&item.source_host),
            verdict.reasoning,
        ))
    }
}

// ============================================================
// LLM-backed scorer (OpenAI-compatible chat completions)
// ============================================================

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct LlmScorer {
    config: ScorerConfig,
    client: reqwest::Client,
}

impl LlmScorer {
    pub fn new(config: ScorerConfig) -> Result<Self> {
        let client = build_ai_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    async fn request_verdict(&self, prompt: &str) -> Result<ScorerVerdict> {
        let req = ChatCompletionRequest {
            model: self.config.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!("scorer API error ({}): {}", status, &body[..200.min(body.len())]));
        }

        let response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("scorer response parse error: {} body: {}", e, &body[..200.min(body.len())]))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .ok_or_else(|| anyhow!("scorer returned empty choices"))?;

        let json_str = extract_json_object(&content)?;
        let parsed: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| anyhow!("scorer verdict parse error: {} content: {}", e, &json_str[..200.min(json_str.len())]))?;

        let impact = parsed["impact"]
            .as_u64()
            .ok_or_else(|| anyhow!("scorer verdict missing impact"))?;
        let relevance = parsed["relevance"]
            .as_f64()
            .ok_or_else(|| anyhow!("scorer verdict missing relevance"))?;
        let reasoning = parsed["reasoning"].as_str().unwrap_or("").to_string();

        Ok(ScorerVerdict {
            impact: impact.clamp(1, 10) as u8,
            relevance: relevance.clamp(0.0, 1.0),
            reasoning,
            usage: response.usage,
        })
    }
}

#[async_trait]
impl Scorer for LlmScorer {
    async fn score(&self, item_text: &str, holdings: &[Holding]) -> Result<ScorerVerdict> {
        let holdings_text = holdings
            .iter()
            .map(|h| format!("{} ({})", h.display_name, h.symbol))
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "You are a financial news analyst. Rate the following item.\n\
            \n\
            Tracked holdings: {}\n\
            \n\
            Item:\n{}\n\
            \n\
            Reply with a single JSON object and nothing else:\n\
            {{\"impact\": <integer 1-10, market impact of the event>, \
            \"relevance\": <float 0-1, how directly it concerns the tracked holdings>, \
            \"reasoning\": \"<one sentence>\"}}",
            if holdings_text.is_empty() { "(none)" } else { holdings_text.as_str() },
            item_text
        );

        retry_once(std::time::Duration::from_secs(2), "scorer request", || {
            self.request_verdict(&prompt)
        })
        .await
    }
}

/// Pulls the first JSON object out of a model reply, tolerating markdown
/// fences around it.
fn extract_json_object(text: &str) -> Result<String> {
    let text = text.trim();
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Ok(text[start..=end].to_string());
        }
    }
    let stripped = text
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) {
        if start < end {
            return Ok(stripped[start..=end].to_string());
        }
    }
    Err(anyhow!("cannot find JSON object in scorer response"))
}
