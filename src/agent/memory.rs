//! Query error memory: failed SQL and the error it produced, fed back into
//! the system prompt so the model does not repeat the same mistake.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
    pub sql: String,
    pub error: String,
}

/// Append-only for the lifetime of an agent; survives across `ask()` calls.
#[derive(Debug, Clone, Default)]
pub struct QueryErrorLog {
    entries: Vec<QueryError>,
}

impl QueryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sql: impl Into<String>, error: impl Into<String>) {
        self.entries.push(QueryError {
            sql: sql.into(),
            error: error.into(),
        });
    }

    pub fn entries(&self) -> &[QueryError] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prompt section listing every failure verbatim, or `None` when empty.
    pub fn render(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }

        let mut out = String::from(
            "## Previous query errors\nThese queries failed earlier in this session. Do not repeat them; fix the cause instead.\n",
        );
        for (i, entry) in self.entries.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. SQL:\n```sql\n{}\n```\nError: {}\n",
                i + 1,
                entry.sql,
                entry.error
            ));
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log_renders_nothing() {
        assert!(QueryErrorLog::new().render().is_none());
    }

    #[test]
    fn test_render_keeps_sql_and_error_verbatim() {
        let mut log = QueryErrorLog::new();
        log.record("SELECT nope FROM raw.orders", "Binder Error: column \"nope\" not found");
        log.record("SELEC 1", "Parser Error: syntax error at or near \"SELEC\"");

        let rendered = log.render().unwrap();
        assert_eq!(log.len(), 2);
        assert!(rendered.contains("SELECT nope FROM raw.orders"));
        assert!(rendered.contains("Binder Error: column \"nope\" not found"));
        assert!(rendered.contains("2. SQL:"));
    }
}
