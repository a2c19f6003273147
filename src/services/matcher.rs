use regex::Regex;

use crate::models::article::{MatchResult, MatchType};
use crate::models::holding::Holding;

const SYMBOL_CONFIDENCE: f64 = 0.95;
const INDEX_CONFIDENCE: f64 = 0.90;
const ENTITY_CONFIDENCE: f64 = 0.80;

/// Index-tracking tickers and the spelled-out index name they proxy.
/// A holding not listed here never index-matches.
const INDEX_NAMES: &[(&str, &str)] = &[
    ("SPY", "S&P 500"),
    ("VOO", "S&P 500"),
    ("IVV", "S&P 500"),
    ("QQQ", "Nasdaq 100"),
    ("DIA", "Dow Jones"),
];

/// Determines which holdings an item concerns. Pure and deterministic: no
/// network calls, same inputs always yield the same results.
///
/// Per holding, first hit wins:
///   1. ticker as a bare token or $-prefixed (case-insensitive), conf 0.95
///   2. spelled-out index name for index-tracking tickers, conf 0.90
///   3. first significant word (len >= 3) of the display name, conf 0.80
/// A holding contributes at most one entry per item.
pub fn match_item(item_text: &str, holdings: &[Holding]) -> Vec<MatchResult> {
    let text_lower = item_text.to_lowercase();
    let mut results = Vec::new();

    for holding in holdings {
        if let Some(m) = match_holding(item_text, &text_lower, holding) {
            results.push(m);
        }
    }

    results
}

fn match_holding(item_text: &str, text_lower: &str, holding: &Holding) -> Option<MatchResult> {
    if symbol_regex(&holding.symbol).is_match(item_text) {
        return Some(MatchResult {
            holding_symbol: holding.symbol.clone(),
            match_type: MatchType::Symbol,
            confidence: SYMBOL_CONFIDENCE,
        });
    }

    if let Some(index_name) = index_name_for(&holding.symbol) {
        if text_lower.contains(&index_name.to_lowercase()) {
            return Some(MatchResult {
                holding_symbol: holding.symbol.clone(),
                match_type: MatchType::Index,
                confidence: INDEX_CONFIDENCE,
            });
        }
    }

    if let Some(word) = significant_word(&holding.display_name) {
        if text_lower.contains(&word) {
            return Some(MatchResult {
                holding_symbol: holding.symbol.clone(),
                match_type: MatchType::Entity,
                confidence: ENTITY_CONFIDENCE,
            });
        }
    }

    None
}

/// Ticker as a standalone token, optionally $-prefixed. "AAPL" matches
/// "AAPL beats" and "up on $AAPL" but not "AAPLX fund".
fn symbol_regex(symbol: &str) -> Regex {
    let pattern = format!(
        r"(?i)(^|[^A-Za-z0-9])\$?{}($|[^A-Za-z0-9])",
        regex::escape(symbol)
    );
    Regex::new(&pattern).unwrap_or_else(|_| Regex::new(".^").unwrap())
}

fn index_name_for(symbol: &str) -> Option<&'static str> {
    INDEX_NAMES
        .iter()
        .find(|(ticker, _)| *ticker == symbol)
        .map(|(_, name)| *name)
}

/// First word of the display name with length >= 3 (edge punctuation
/// trimmed), lowercased.
fn significant_word(display_name: &str) -> Option<String> {
    display_name
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|w| w.len() >= 3)
        .map(|w| w.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::holding::HoldingKind;

    fn holdings() -> Vec<Holding> {
        vec![
            Holding::new("AAPL", HoldingKind::Stock, "Apple Inc."),
            Holding::new("SPY", HoldingKind::Stock, "SPDR S&P 500 ETF Trust"),
            Holding::new("BTC", HoldingKind::Crypto, "Bitcoin"),
        ]
    }

    #[test]
    fn test_symbol_match_bare_token() {
        let results = match_item("AAPL rallies after earnings", &holdings());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].holding_symbol, "AAPL");
        assert_eq!(results[0].match_type, MatchType::Symbol);
        assert_eq!(results[0].confidence, 0.95);
    }

    #[test]
    fn test_symbol_match_dollar_prefixed_and_case_insensitive() {
        let results = match_item("traders pile into $aapl calls", &holdings());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_type, MatchType::Symbol);
    }

    #[test]
    fn test_symbol_does_not_match_inside_longer_token() {
        let results = match_item("the AAPLX fund filed a prospectus", &holdings());
        // falls through to the entity tier and misses there too
        assert!(results.iter().all(|m| m.holding_symbol != "AAPL"));
    }

    #[test]
    fn test_index_match_for_etf() {
        let results = match_item("The S&P 500 closed at a record high", &holdings());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].holding_symbol, "SPY");
        assert_eq!(results[0].match_type, MatchType::Index);
        assert_eq!(results[0].confidence, 0.90);
    }

    #[test]
    fn test_entity_match_on_display_name_word() {
        let results = match_item("Apple unveils a new chip line", &holdings());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].holding_symbol, "AAPL");
        assert_eq!(results[0].match_type, MatchType::Entity);
        assert_eq!(results[0].confidence, 0.80);
    }

    #[test]
    fn test_symbol_match_suppresses_entity_match() {
        // both the ticker and the company name appear; symbol tier wins
        let results = match_item("Apple (AAPL) raises guidance", &holdings());
        let aapl: Vec<_> = results.iter().filter(|m| m.holding_symbol == "AAPL").collect();
        assert_eq!(aapl.len(), 1);
        assert_eq!(aapl[0].match_type, MatchType::Symbol);
    }

    #[test]
    fn test_one_item_can_match_many_holdings() {
        let results = match_item("BTC slides while AAPL gains", &holdings());
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_no_match_yields_empty() {
        let results = match_item("soybean futures edge lower", &holdings());
        assert!(results.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let text = "Apple (AAPL) and the S&P 500 both rose";
        let first = match_item(text, &holdings());
        let second = match_item(text, &holdings());
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.holding_symbol, b.holding_symbol);
            assert_eq!(a.match_type, b.match_type);
            assert_eq!(a.confidence, b.confidence);
        }
    }

    #[test]
    fn test_short_words_skipped_for_entity() {
        let h = vec![Holding::new("KO", HoldingKind::Stock, "Co of Coca-Cola")];
        // "Co" and "of" are too short; "Coca-Cola" is the significant word
        let results = match_item("coca-cola posts solid volume growth", &h);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_type, MatchType::Entity);
    }
}
