//! Agent Prompts - System prompt for the warehouse analyst agent
//!
//! The prompt is rebuilt before every model call: a static instruction block,
//! then the semantic layer digest when a manifest is loaded, then any query
//! errors recorded so far.

use crate::agent::memory::QueryErrorLog;
use crate::semantic::SemanticManifest;

/// Static instructions for the analyst agent
pub const ANALYST_SYSTEM_PROMPT: &str = r#"You are a data analyst agent with access to a DuckDB data warehouse.
Your job is to answer user questions by exploring the schema and running SQL queries.

## Workflow
1. List available schemas to understand the database structure.
2. List tables in the most relevant schema(s).
3. Describe table columns to understand the data model.
4. Optionally sample a few rows to see real values.
5. Write and execute SQL to answer the question.
6. Return a clear, concise natural-language answer with key numbers.

## Rules
- Always explore the schema first. Never assume table or column names.
- Use DuckDB SQL syntax.
- If a query errors, read the message, adjust, and retry.
- Format numbers for readability (commas, 2 decimal places for money).
- If the data cannot answer the question, say so clearly.
- Query results are capped at 100 rows; row_count always reports the full size.

## Charts
- When a trend or comparison is easier to see than to read, call create_chart
  with data you already queried. The chart is shown to the user after your answer.
"#;

const SEMANTIC_LAYER_HEADER: &str = r#"## Semantic layer
The warehouse is described by the manifest below. Entities map to physical
tables; prefer the listed metrics and relationships when they fit the question.
Column names and types still need to be confirmed with describe_table before
writing SQL.
"#;

/// Render the full system prompt for the next model call.
pub fn build_system_prompt(manifest: &SemanticManifest, errors: &QueryErrorLog) -> String {
    let mut prompt = String::from(ANALYST_SYSTEM_PROMPT);

    if !manifest.is_empty() {
        if let Ok(summary) = serde_json::to_string_pretty(&manifest.summary()) {
            prompt.push('\n');
            prompt.push_str(SEMANTIC_LAYER_HEADER);
            prompt.push_str("```json\n");
            prompt.push_str(&summary);
            prompt.push_str("\n```\n");
        }
    }

    if let Some(section) = errors.render() {
        prompt.push('\n');
        prompt.push_str(&section);
    }

    prompt
}
