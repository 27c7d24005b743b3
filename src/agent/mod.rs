pub mod contracts;
pub mod memory;
pub mod runtime;
pub mod service;
pub mod tools;

pub use contracts::*;
pub use memory::QueryErrorLog;
pub use runtime::{ToolOutcome, ToolRuntime};
pub use service::{Agent, MAX_TURNS_MESSAGE, NO_RESPONSE_MESSAGE};
