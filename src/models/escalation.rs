use serde::{Deserialize, Serialize};

use crate::models::article::EnrichedItem;
use crate::models::price::PriceSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationKind {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "ask_human")]
    AskHuman,
    #[serde(rename = "deep_research")]
    DeepResearch,
}

/// One decision produced by the rule engine or the price cross-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub kind: EscalationKind,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_holding: Option<String>,
}

impl EscalationDecision {
    pub fn deep_research(reason: String, related_holding: Option<String>) -> Self {
        Self {
            kind: EscalationKind::DeepResearch,
            reason,
            related_holding,
        }
    }

    pub fn ask_human(reason: String, related_holding: Option<String>) -> Self {
        Self {
            kind: EscalationKind::AskHuman,
            reason,
            related_holding,
        }
    }
}

/// Free-text findings from the deep-research collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepResearchFindings {
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
}

/// A fired escalation plus what became of it. A collaborator failure is
/// recorded here instead of aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub decision: EscalationDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<DeepResearchFindings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl EscalationOutcome {
    pub fn pending(decision: EscalationDecision) -> Self {
        Self {
            decision,
            findings: None,
            failure: None,
        }
    }
}

/// A stock holding whose 7-day move crossed the alert threshold.
/// `explained` is true when at least one approved item matches the symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAlert {
    pub symbol: String,
    pub change_percent: f64,
    pub explained: bool,
}

/// An input item that never made it into the enriched batch, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedItem {
    pub url: String,
    pub reason: String,
}

/// A symbol for which every provider in the chain failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Everything one pipeline run produced. A run always completes and lists
/// explicitly which items/symbols/escalations succeeded or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub started_at: String,  // RFC 3339
    pub finished_at: String,
    pub enriched: Vec<EnrichedItem>,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub skipped_items: Vec<SkippedItem>,
    pub snapshots: Vec<PriceSnapshot>,
    pub failed_symbols: Vec<FailedSymbol>,
    pub price_alerts: Vec<PriceAlert>,
    pub escalations: Vec<EscalationOutcome>,
}

impl PipelineResult {
    pub fn approved(&self) -> impl Iterator<Item = &EnrichedItem> {
        self.enriched.iter().filter(|e| e.approved)
    }
}
