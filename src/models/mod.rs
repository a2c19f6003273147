pub mod article;
pub mod error;
pub mod escalation;
pub mod holding;
pub mod price;
pub mod settings;
pub mod telemetry;
