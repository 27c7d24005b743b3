//! Configuration
//!
//! Agent tuning knobs plus the environment lookups the CLI performs at
//! startup: `.env` discovery, warehouse auto-detection and credentials.

use crate::error::{AstroError, Result};
use crate::llm::Backend;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How many directories (including the start) upward searches visit.
pub const SEARCH_DEPTH: usize = 6;

pub const WAREHOUSE_RELATIVE_PATH: &str = "warehouse/data.duckdb";
pub const MANIFEST_RELATIVE_PATH: &str = "semantic/manifest.yml";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Model calls allowed per `ask()` before giving up.
    pub max_turns: usize,
    /// Attempts per model call, including the first.
    pub max_retries: u32,
    pub temperature: f32,
    /// First backoff wait; doubles on every further transient failure.
    pub backoff_base: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 25,
            max_retries: 3,
            temperature: 0.1,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl AgentConfig {
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }
}

/// Walk up from `start` looking for `relative`. Stops at the filesystem root.
pub fn find_upwards(start: &Path, relative: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    for _ in 0..SEARCH_DEPTH {
        let dir = current?;
        let candidate = dir.join(relative);
        if candidate.exists() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}

/// Load the nearest `.env`, if any. Returns the file that was loaded.
pub fn load_dotenv_upwards(start: &Path) -> Option<PathBuf> {
    let path = find_upwards(start, ".env")?;
    dotenv::from_path(&path).ok()?;
    Some(path)
}

/// Explicit path if given, otherwise the nearest `warehouse/data.duckdb`.
pub fn resolve_warehouse(explicit: Option<PathBuf>, start: &Path) -> Result<PathBuf> {
    let path = explicit
        .or_else(|| find_upwards(start, WAREHOUSE_RELATIVE_PATH))
        .ok_or_else(|| {
            AstroError::Config(
                "Could not find DuckDB database. Run from the project root or pass --db <path>."
                    .to_string(),
            )
        })?;
    if !path.exists() {
        return Err(AstroError::WarehouseNotFound(path));
    }
    Ok(path)
}

/// Explicit path, then `ASTRO_MANIFEST`, then the nearest `semantic/manifest.yml`.
///
/// `None` means the agent runs without semantic context.
pub fn resolve_manifest(explicit: Option<PathBuf>, start: &Path) -> Option<PathBuf> {
    explicit
        .or_else(|| non_empty_var("ASTRO_MANIFEST").map(PathBuf::from))
        .or_else(|| find_upwards(start, MANIFEST_RELATIVE_PATH))
}

/// `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`, trimmed.
pub fn api_key_from_env() -> Result<String> {
    non_empty_var("GEMINI_API_KEY")
        .or_else(|| non_empty_var("GOOGLE_API_KEY"))
        .ok_or_else(|| AstroError::Config("Set GEMINI_API_KEY or GOOGLE_API_KEY.".to_string()))
}

/// Vertex routing from `GOOGLE_CLOUD_PROJECT` / `GOOGLE_CLOUD_LOCATION`.
pub fn backend_from_env() -> Backend {
    Backend::from_routing(
        non_empty_var("GOOGLE_CLOUD_PROJECT"),
        non_empty_var("GOOGLE_CLOUD_LOCATION"),
    )
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_turns, 25);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base, Duration::from_secs(2));
        assert_eq!(AgentConfig::default().with_max_turns(0).max_turns, 1);
    }

    #[test]
    fn test_find_upwards_from_nested_dir() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("warehouse")).unwrap();
        fs::write(root.path().join(WAREHOUSE_RELATIVE_PATH), b"").unwrap();
        let nested = root.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let found = find_upwards(&nested, WAREHOUSE_RELATIVE_PATH).unwrap();
        assert_eq!(found, root.path().join(WAREHOUSE_RELATIVE_PATH));
    }

    #[test]
    fn test_find_upwards_gives_up_after_depth() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join(".env"), b"X=1").unwrap();
        let deep = root.path().join("1/2/3/4/5/6");
        fs::create_dir_all(&deep).unwrap();

        assert!(find_upwards(&deep, ".env").is_none());
        assert!(find_upwards(&root.path().join("1/2/3/4/5"), ".env").is_some());
    }

    #[test]
    fn test_resolve_warehouse_reports_missing_file() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("nope.duckdb");
        let err = resolve_warehouse(Some(missing.clone()), root.path()).unwrap_err();
        assert!(matches!(err, AstroError::WarehouseNotFound(p) if p == missing));
        assert!(matches!(
            resolve_warehouse(None, root.path()).unwrap_err(),
            AstroError::Config(_)
        ));
    }
}
