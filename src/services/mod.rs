pub mod classifier;
pub mod deep_research;
pub mod escalation;
pub mod matcher;
pub mod news_search;
pub mod pipeline;
pub mod price_resolver;
pub mod providers;
pub mod telemetry;
