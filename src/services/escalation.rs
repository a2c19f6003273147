use crate::models::article::EnrichedItem;
use crate::models::escalation::EscalationDecision;
use crate::models::holding::Holding;

/// Impact at or above this means a filtered-out item deserves a second look.
const HIGH_IMPACT: u8 = 7;
/// Impact band where an ambiguous item is worth a human glance instead of a
/// deep-research run.
const MID_IMPACT_LOW: u8 = 5;
const MID_IMPACT_HIGH: u8 = 6;
/// Match confidence below which relevance counts as ambiguous.
const CONFIDENT_MATCH: f64 = 0.8;

/// Rule-based escalation decision over the enriched batch. Deterministic,
/// no I/O. Rules are checked in priority order and evaluation stops at the
/// first rule that fires; lower-priority rules are not checked afterwards.
pub fn evaluate(
    enriched: &[EnrichedItem],
    holdings: &[Holding],
    top_holdings: &[String],
) -> Vec<EscalationDecision> {
    // Rule 1: top holdings must always have either coverage or an escalation.
    if !top_holdings.is_empty() {
        let covered = top_holdings.iter().any(|symbol| {
            enriched
                .iter()
                .any(|e| e.approved && e.matches_symbol(symbol))
        });
        if !covered {
            let names = top_holdings
                .iter()
                .map(|symbol| {
                    holdings
                        .iter()
                        .find(|h| &h.symbol == symbol)
                        .map(|h| format!("{} ({})", h.display_name, h.symbol))
                        .unwrap_or_else(|| symbol.clone())
                })
                .collect::<Vec<_>>()
                .join(", ");
            return vec![EscalationDecision::deep_research(
                format!("no approved item covers top holdings ({})", names),
                top_holdings.first().cloned(),
            )];
        }
    }

    // Rule 2: an impactful, on-topic item was filtered out.
    if let Some(item) = enriched
        .iter()
        .find(|e| e.score.impact >= HIGH_IMPACT && !e.matches.is_empty() && !e.approved)
    {
        return vec![EscalationDecision::deep_research(
            format!(
                "high-impact item rejected despite matching coverage: {} (impact {})",
                item.item.title, item.score.impact
            ),
            item.matches.first().map(|m| m.holding_symbol.clone()),
        )];
    }

    // Rule 3: genuinely ambiguous relevance, worth a human glance.
    if let Some(item) = enriched.iter().find(|e| {
        (MID_IMPACT_LOW..=MID_IMPACT_HIGH).contains(&e.score.impact)
            && !e.matches.is_empty()
            && e.matches.iter().all(|m| m.confidence < CONFIDENT_MATCH)
    }) {
        return vec![EscalationDecision::ask_human(
            format!(
                "ambiguous relevance for item: {} (all match confidences below {})",
                item.item.title, CONFIDENT_MATCH
            ),
            item.matches.first().map(|m| m.holding_symbol.clone()),
        )];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::article::{ArticleScore, MatchResult, MatchType};
    use crate::models::escalation::EscalationKind;
    use crate::models::holding::{CandidateItem, HoldingKind};

    fn holding(symbol: &str) -> Holding {
        Holding::new(symbol, HoldingKind::Stock, symbol)
    }

    fn enriched(impact: u8, relevance: f64, matches: Vec<MatchResult>) -> EnrichedItem {
        let item = CandidateItem {
            url: format!("https://example.com/{}", impact),
            title: format!("item impact {}", impact),
            description: String::new(),
            source_host: "example.com".to_string(),
        };
        // tier-3 source so approval hinges on impact and relevance alone
        EnrichedItem::build(item, ArticleScore::new(impact, relevance, 0.0, String::new()), matches)
    }

    fn m(symbol: &str, match_type: MatchType, confidence: f64) -> MatchResult {
        MatchResult {
            holding_symbol: symbol.to_string(),
            match_type,
            confidence,
        }
    }

    #[test]
    fn test_rule1_uncovered_top_holdings() {
        let decisions = evaluate(&[], &[holding("AAPL")], &["AAPL".to_string()]);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, EscalationKind::DeepResearch);
        assert!(decisions[0].reason.contains("AAPL"));
    }

    #[test]
    fn test_rule1_wins_over_rule2() {
        // batch satisfies rule 1 (no coverage of TOP) and rule 2 (rejected
        // high-impact item); only the rule-1 decision is returned
        let rejected_high = enriched(8, 0.0, vec![m("MSFT", MatchType::Symbol, 0.95)]);
        assert!(!rejected_high.approved);
        let decisions = evaluate(
            &[rejected_high],
            &[holding("TOP"), holding("MSFT")],
            &["TOP".to_string()],
        );
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].reason.contains("top holdings"));
    }

    #[test]
    fn test_rule2_high_impact_rejected() {
        // covered top holding, plus a rejected impact-8 item with a match
        let covering = enriched(8, 1.0, vec![m("AAPL", MatchType::Symbol, 0.95)]);
        assert!(covering.approved);
        let rejected = enriched(7, 0.0, vec![m("MSFT", MatchType::Entity, 0.80)]);
        assert!(!rejected.approved);
        let decisions = evaluate(
            &[covering, rejected],
            &[holding("AAPL"), holding("MSFT")],
            &["AAPL".to_string()],
        );
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, EscalationKind::DeepResearch);
        assert_eq!(decisions[0].related_holding.as_deref(), Some("MSFT"));
    }

    #[test]
    fn test_rule3_ambiguous_mid_impact() {
        let covering = enriched(8, 1.0, vec![m("AAPL", MatchType::Symbol, 0.95)]);
        let ambiguous = enriched(5, 0.4, vec![m("MSFT", MatchType::Entity, 0.60)]);
        let decisions = evaluate(
            &[covering, ambiguous],
            &[holding("AAPL"), holding("MSFT")],
            &["AAPL".to_string()],
        );
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, EscalationKind::AskHuman);
    }

    #[test]
    fn test_rule3_not_fired_when_any_match_confident() {
        let covering = enriched(8, 1.0, vec![m("AAPL", MatchType::Symbol, 0.95)]);
        let mid = enriched(
            5,
            0.4,
            vec![
                m("MSFT", MatchType::Entity, 0.60),
                m("GOOG", MatchType::Symbol, 0.95),
            ],
        );
        let decisions = evaluate(
            &[covering, mid],
            &[holding("AAPL")],
            &["AAPL".to_string()],
        );
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_quiet_batch_yields_none() {
        let covering = enriched(8, 1.0, vec![m("AAPL", MatchType::Symbol, 0.95)]);
        let decisions = evaluate(&[covering], &[holding("AAPL")], &["AAPL".to_string()]);
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_empty_top_holdings_skips_rule1() {
        let decisions = evaluate(&[], &[holding("AAPL")], &[]);
        assert!(decisions.is_empty());
    }
}
