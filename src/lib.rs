//! Natural-language question answering over a DuckDB warehouse.
//!
//! An [`agent::Agent`] drives a hosted model through tool calls against a
//! read-only [`execution::DataLayer`], enriched by a [`semantic::SemanticManifest`].

pub mod agent;
pub mod agent_prompts;
pub mod config;
pub mod error;
pub mod eval;
pub mod execution;
pub mod execution_loop;
pub mod llm;
pub mod semantic;

pub use agent::{Agent, Source};
pub use config::AgentConfig;
pub use error::{AstroError, Result};
pub use execution::DataLayer;
pub use semantic::SemanticManifest;
