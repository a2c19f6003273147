use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;

use crate::models::article::EnrichedItem;
use crate::models::error::PipelineError;
use crate::models::escalation::{
    EscalationDecision, EscalationKind, EscalationOutcome, PipelineResult, PriceAlert, SkippedItem,
};
use crate::models::holding::{CandidateItem, Holding, HoldingKind};
use crate::models::settings::PipelineConfig;
use crate::models::telemetry::CostEvent;
use crate::services::classifier::{ArticleClassifier, Scorer};
use crate::services::deep_research::DeepResearcher;
use crate::services::escalation;
use crate::services::matcher;
use crate::services::price_resolver::PriceResolver;
use crate::services::telemetry::CostRecorder;

/// Runs the full research & escalation pass over one batch of candidate
/// items. Owns the injected capabilities; a run never aborts for per-item
/// or per-symbol failures, only for an empty holdings list.
pub struct Pipeline {
    config: PipelineConfig,
    classifier: ArticleClassifier,
    resolver: PriceResolver,
    researcher: Arc<dyn DeepResearcher>,
    recorder: CostRecorder,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        scorer: Arc<dyn Scorer>,
        resolver: PriceResolver,
        researcher: Arc<dyn DeepResearcher>,
        recorder: CostRecorder,
    ) -> Self {
        Self {
            classifier: ArticleClassifier::new(scorer, recorder.clone()),
            config,
            resolver,
            researcher,
            recorder,
        }
    }

    pub async fn run(
        &self,
        items: Vec<CandidateItem>,
        holdings: &[Holding],
        top_holdings: &[String],
    ) -> Result<PipelineResult, PipelineError> {
        if holdings.is_empty() {
            return Err(PipelineError::EmptyHoldings);
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now();
        log::info!(
            "pipeline run {} starting: {} items, {} holdings",
            run_id,
            items.len(),
            holdings.len()
        );

        // Step 1: classify + match every item. Bounded fan-out; `buffered`
        // keeps completion in input order. A failed item is skipped and
        // logged, the rest of the batch continues.
        let scored: Vec<_> = futures::stream::iter(items.into_iter())
            .map(|item| async move {
                let outcome = self.classifier.classify(&item, holdings).await;
                (item, outcome)
            })
            .buffered(self.config.classify_fanout.max(1))
            .collect()
            .await;

        let mut enriched: Vec<EnrichedItem> = Vec::new();
        let mut skipped_items: Vec<SkippedItem> = Vec::new();
        for (item, outcome) in scored {
            match outcome {
                Ok(score) => {
                    let matches = matcher::match_item(&item.text(), holdings);
                    enriched.push(EnrichedItem::build(item, score, matches));
                }
                Err(e) => {
                    log::warn!("skipping item {}: {}", item.url, e);
                    skipped_items.push(SkippedItem {
                        url: item.url,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Step 2: price snapshots for stock holdings, then the cross-check:
        // a large move nobody wrote about has to be explained.
        let stock_requests: Vec<(String, HoldingKind)> = holdings
            .iter()
            .filter(|h| h.kind == HoldingKind::Stock)
            .map(|h| (h.symbol.clone(), h.kind))
            .collect();
        let quotes = self.resolver.resolve_batch(&stock_requests).await;

        let mut price_alerts: Vec<PriceAlert> = Vec::new();
        let mut price_escalations: Vec<EscalationDecision> = Vec::new();
        for snapshot in &quotes.snapshots {
            if snapshot.change_percent.abs() <= self.config.price_alert_threshold {
                continue;
            }
            let explained = enriched
                .iter()
                .any(|e| e.approved && e.matches_symbol(&snapshot.symbol));
            price_alerts.push(PriceAlert {
                symbol: snapshot.symbol.clone(),
                change_percent: snapshot.change_percent,
                explained,
            });
            if !explained {
                price_escalations.push(EscalationDecision::deep_research(
                    format!(
                        "{} moved {:.1}% over 7 days with no approved coverage",
                        snapshot.symbol, snapshot.change_percent
                    ),
                    Some(snapshot.symbol.clone()),
                ));
            }
        }

        // Step 3: rule engine over the enriched batch. Its rule 1 also
        // covers the unconditional top-holdings check: uncovered top
        // holdings always escalate.
        let mut decisions = escalation::evaluate(&enriched, holdings, top_holdings);

        // Step 4: price-move escalations are additive to whatever the
        // engine decided.
        decisions.extend(price_escalations);

        let mut escalations: Vec<EscalationOutcome> = Vec::new();
        for decision in decisions {
            escalations.push(self.dispatch(decision, holdings).await);
        }

        let approved_count = enriched.iter().filter(|e| e.approved).count();
        let rejected_count = enriched.len() - approved_count;
        let finished_at = chrono::Utc::now();
        log::info!(
            "pipeline run {} finished: {} approved, {} rejected, {} skipped, {} escalations",
            run_id,
            approved_count,
            rejected_count,
            skipped_items.len(),
            escalations.len()
        );

        Ok(PipelineResult {
            run_id,
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            enriched,
            approved_count,
            rejected_count,
            skipped_items,
            snapshots: quotes.snapshots,
            failed_symbols: quotes.failed,
            price_alerts,
            escalations,
        })
    }

    /// Sends one deep-research escalation to the collaborator. A failure is
    /// recorded on the outcome and does not stop later escalations.
    /// Ask-human decisions pass through untouched.
    async fn dispatch(&self, decision: EscalationDecision, holdings: &[Holding]) -> EscalationOutcome {
        if decision.kind != EscalationKind::DeepResearch {
            return EscalationOutcome::pending(decision);
        }

        let query = research_query(&decision, holdings);
        let started = Instant::now();
        let outcome = self.researcher.research(&query).await;
        self.recorder.record(CostEvent::new(
            "deep_research",
            started.elapsed().as_millis() as u64,
            outcome.is_ok(),
            None,
        ));

        match outcome {
            Ok(findings) => EscalationOutcome {
                decision,
                findings: Some(findings),
                failure: None,
            },
            Err(e) => {
                log::warn!("deep research failed for escalation: {}", e);
                EscalationOutcome {
                    decision,
                    findings: None,
                    failure: Some(e.to_string()),
                }
            }
        }
    }
}

/// Query text for the research collaborator, anchored on the related
/// holding when there is one.
fn research_query(decision: &EscalationDecision, holdings: &[Holding]) -> String {
    match decision
        .related_holding
        .as_ref()
        .and_then(|symbol| holdings.iter().find(|h| &h.symbol == symbol))
    {
        Some(holding) => format!(
            "Recent news and developments for {} ({}): {}",
            holding.display_name, holding.symbol, decision.reason
        ),
        None => format!("Recent market developments: {}", decision.reason),
    }
}
