//! critic: AI-assisted pull request reviewer (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod anchor;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod diff;
pub mod env;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod publish;
pub mod response;
