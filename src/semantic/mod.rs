pub mod manifest;
pub mod loader;

pub use manifest::*;
pub use loader::*;
