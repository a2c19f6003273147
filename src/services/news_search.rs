use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::holding::CandidateItem;
use crate::utils::cache::TtlCache;
use crate::utils::http::build_news_client;

/// Supplier of raw candidate items for a query. No ordering guarantee.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<CandidateItem>>;
}

const NEWS_SEARCH_URL: &str = "https://google.serper.dev/news";

/// News search backed by a Serper-style JSON endpoint.
pub struct NewsSearchApi {
    client: reqwest::Client,
    api_key: String,
    cache: TtlCache<Vec<CandidateItem>>,
}

impl NewsSearchApi {
    pub fn new(api_key: &str, cache_ttl_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_news_client()?,
            api_key: api_key.to_string(),
            cache: TtlCache::new(Duration::from_secs(cache_ttl_secs)),
        })
    }

    /// Cached lookup for repeat queries within one process. Read-through;
    /// a cold cache just means a fresh search.
    pub async fn fresh_news(&self, query: &str, limit: u32) -> Result<Vec<CandidateItem>> {
        let key = format!("{}#{}", query, limit);
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("news cache hit for {:?}", query);
            return Ok(hit);
        }
        let items = self.search(query, limit).await?;
        self.cache.put(&key, items.clone());
        Ok(items)
    }
}

#[async_trait]
impl CandidateSource for NewsSearchApi {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<CandidateItem>> {
        let body = serde_json::json!({
            "q": query,
            "num": limit,
        });

        let resp = self
            .client
            .post(NEWS_SEARCH_URL)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(anyhow!("news search error ({}): {}", status, &text[..200.min(text.len())]));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| anyhow!("news search parse error: {}", e))?;

        let mut items = Vec::new();
        if let Some(news) = json["news"].as_array() {
            for entry in news {
                let url = entry["link"].as_str().unwrap_or("").to_string();
                let title = entry["title"].as_str().unwrap_or("").to_string();
                let description = entry["snippet"].as_str().unwrap_or("").to_string();

                // items without an identity or a headline are useless downstream
                if url.is_empty() || title.is_empty() {
                    continue;
                }

                items.push(CandidateItem {
                    source_host: host_from_url(&url),
                    url,
                    title,
                    description,
                });
            }
        }

        Ok(items)
    }
}

/// Host part of a url, lowercased, `www.` stripped. Plain string slicing;
/// candidate urls are external input and may be garbage, in which case the
/// whole string minus the scheme is returned.
pub fn host_from_url(url: &str) -> String {
    let no_scheme = url
        .trim()
        .strip_prefix("https://")
        .or_else(|| url.trim().strip_prefix("http://"))
        .unwrap_or_else(|| url.trim());
    let host = no_scheme.split(['/', '?', '#']).next().unwrap_or("");
    host.trim_start_matches("www.").to_lowercase()
}
