mod config;
mod error;
mod events;
mod identity;
mod orchestrator;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use events::OrchestratorEvent;
pub use identity::{IdentityStore, OnionIdentity};
pub use orchestrator::TorOrchestrator;
