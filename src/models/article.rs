use serde::{Deserialize, Serialize};

use crate::models::holding::CandidateItem;

// Composite weighting: impact 60%, holding relevance 30%, source trust 10%.
pub const IMPACT_WEIGHT: f64 = 0.6;
pub const RELEVANCE_WEIGHT: f64 = 0.3;
pub const SOURCE_WEIGHT: f64 = 0.1;

/// Minimum composite score for an item to be kept (together with at least
/// one holding match).
pub const APPROVAL_THRESHOLD: f64 = 5.0;

/// Typed result of scoring one candidate item. Derived once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleScore {
    pub impact: u8,                  // 1-10, from the scoring collaborator
    pub relevance_to_holdings: f64,  // 0-1, from the scoring collaborator
    pub source_quality: f64,         // 1.0 / 0.5 / 0.0 tiering
    pub composite_score: f64,        // weighted, always in [0, 10]
    pub reasoning: String,
}

impl ArticleScore {
    /// Builds the score and fixes the composite invariant:
    /// `impact*0.6 + relevance*10*0.3 + source_quality*10*0.1`.
    pub fn new(impact: u8, relevance: f64, source_quality: f64, reasoning: String) -> Self {
        let impact = impact.clamp(1, 10);
        let relevance = relevance.clamp(0.0, 1.0);
        let composite = impact as f64 * IMPACT_WEIGHT
            + relevance * 10.0 * RELEVANCE_WEIGHT
            + source_quality * 10.0 * SOURCE_WEIGHT;
        Self {
            impact,
            relevance_to_holdings: relevance,
            source_quality,
            composite_score: composite,
            reasoning,
        }
    }
}

/// How a holding was matched to an item. Symbol is the highest-precision
/// method; a symbol hit suppresses the lower tiers for that holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "symbol")]
    Symbol,
    #[serde(rename = "index")]
    Index,
    #[serde(rename = "entity")]
    Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub holding_symbol: String,
    pub match_type: MatchType,
    pub confidence: f64, // 0.95 symbol / 0.90 index / 0.80 entity
}

/// A candidate item after classification and matching, with the accept
/// decision baked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedItem {
    pub item: CandidateItem,
    pub score: ArticleScore,
    pub matches: Vec<MatchResult>,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl EnrichedItem {
    /// The only accept/reject rule: composite >= 5 AND at least one match.
    pub fn build(item: CandidateItem, score: ArticleScore, matches: Vec<MatchResult>) -> Self {
        let approved = score.composite_score >= APPROVAL_THRESHOLD && !matches.is_empty();
        let rejection_reason = if approved {
            None
        } else if matches.is_empty() {
            Some("no holding matched".to_string())
        } else {
            Some(format!(
                "composite score {:.1} below threshold {:.1}",
                score.composite_score, APPROVAL_THRESHOLD
            ))
        };
        Self {
            item,
            score,
            matches,
            approved,
            rejection_reason,
        }
    }

    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.matches.iter().any(|m| m.holding_symbol == symbol)
    }
}
