//! Conversation and provenance types shared by the agent, the tool runtime and
//! the model transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured request from the model to run one named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Result of one tool call, positionally matched to its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub response: Value,
}

/// One model reply: text, tool-call requests, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    #[serde(default)]
    pub text_parts: Vec<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text_parts: vec![text.into()],
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            text_parts: Vec::new(),
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Non-empty text parts joined by newlines, or `None` if there are none.
    pub fn joined_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .text_parts
            .iter()
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// One exchange unit of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Model(ModelMessage),
    ToolResults { results: Vec<ToolResult> },
}

/// What a tool call consulted, surfaced to the caller after `ask()` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    Schemas,
    Tables { schema: String },
    Table { table: String },
    Sample { table: String, row_count: usize },
    Query { sql: String, row_count: usize },
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Schemas => write!(f, "schema listing"),
            Source::Tables { schema } => write!(f, "tables in {}", schema),
            Source::Table { table } => write!(f, "columns of {}", table),
            Source::Sample { table, row_count } => {
                write!(f, "{} sample rows from {}", row_count, table)
            }
            Source::Query { sql, row_count } => write!(f, "{} ({} rows)", sql, row_count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Histogram,
}

/// A chart the model asked for; rendering happens outside the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub chart_type: ChartType,
    #[serde(default)]
    pub x_data: Vec<String>,
    pub y_data: Vec<f64>,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    #[serde(default)]
    pub title: String,
}
