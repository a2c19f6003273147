use serde::{Deserialize, Serialize};

/// Asset class of a tracked holding. Decides which provider chain the
/// price resolver walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingKind {
    #[serde(rename = "stock")]
    Stock,
    #[serde(rename = "crypto")]
    Crypto,
    #[serde(rename = "commodity")]
    Commodity,
}

/// A user-tracked financial instrument. Built once per pipeline run from
/// config input; immutable for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,       // uppercased ticker, unique per holdings list
    pub kind: HoldingKind,
    pub display_name: String, // "Apple Inc.", "Bitcoin", ...
}

impl Holding {
    pub fn new(symbol: &str, kind: HoldingKind, display_name: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            kind,
            display_name: display_name.trim().to_string(),
        }
    }
}

/// One raw candidate news item from the search collaborator. The url is the
/// identity key; everything else is free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    pub url: String,
    pub title: String,
    pub description: String,
    pub source_host: String, // "reuters.com", lowercased, no scheme
}

impl CandidateItem {
    /// Text the classifier and matcher operate on.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}
