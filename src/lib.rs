pub mod adapters;
pub mod config;
pub mod core;
pub mod github;

pub use config::Settings;
pub use core::orchestrator::{FileOutcome, Orchestrator, RunReport};
pub use github::GithubClient;
