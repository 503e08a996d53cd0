// Essay Agents - a multi-agent pipeline that writes cited long-form essays from local literature

pub mod agents;
pub mod cli;
pub mod config;
pub mod documents;
pub mod driver;
pub mod llm;
pub mod state;
pub mod types;
pub mod utils;
pub mod workflow;

// Re-exports for convenience
pub use config::Config;
pub use driver::{run, run_with_adapter, RunRequest, RunSummary};
pub use state::EssayState;
pub use types::{AppError, AppResult};
