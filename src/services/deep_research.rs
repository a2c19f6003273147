use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::error::PipelineError;
use crate::models::escalation::DeepResearchFindings;
use crate::models::settings::ResearchConfig;
use crate::utils::http::build_ai_client;

/// The expensive broad-search collaborator. Only invoked for fired
/// escalations; failures are recorded per escalation, never fatal.
#[async_trait]
pub trait DeepResearcher: Send + Sync {
    async fn research(&self, query: &str) -> Result<DeepResearchFindings, PipelineError>;
}

pub struct DeepResearchApi {
    config: ResearchConfig,
    client: reqwest::Client,
}

impl DeepResearchApi {
    pub fn new(config: ResearchConfig) -> anyhow::Result<Self> {
        let client = build_ai_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    async fn request(&self, query: &str) -> anyhow::Result<DeepResearchFindings> {
        let url = format!("{}/api/research", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "query": query,
            "breadth": self.config.breadth,
            "depth": self.config.depth,
        });

        let mut req = self.client.post(&url).json(&body);
        if !self.config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.api_key));
        }
        let resp = req.send().await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!("research API error ({}): {}", status, &text[..200.min(text.len())]));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| anyhow!("research response parse error: {}", e))?;

        let learnings = string_list(&json["learnings"]);
        let visited_urls = string_list(&json["visitedUrls"]);
        if learnings.is_empty() && visited_urls.is_empty() {
            return Err(anyhow!("research response carried no findings"));
        }

        Ok(DeepResearchFindings {
            learnings,
            visited_urls,
        })
    }
}

#[async_trait]
impl DeepResearcher for DeepResearchApi {
    async fn research(&self, query: &str) -> Result<DeepResearchFindings, PipelineError> {
        self.request(query)
            .await
            .map_err(|e| PipelineError::DeepResearchFailed(e.to_string()))
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_list_tolerates_shape_drift() {
        let json: Value = serde_json::json!({"learnings": ["a", "b", 3], "visitedUrls": null});
        assert_eq!(string_list(&json["learnings"]), vec!["a", "b"]);
        assert!(string_list(&json["visitedUrls"]).is_empty());
    }
}
