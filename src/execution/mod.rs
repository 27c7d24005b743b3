pub mod duckdb_engine;
pub mod result;

pub use duckdb_engine::*;
pub use result::*;
