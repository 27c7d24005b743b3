//! Tool Declarations
//!
//! The six operations the model may call. Each entry pairs the wire
//! declaration sent to the model with the typed argument struct the runtime
//! decodes, so the two cannot drift apart silently.

use crate::agent::contracts::ChartRequest;
use crate::execution::DEFAULT_SAMPLE_ROWS;
use crate::llm::FunctionDefinition;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ListSchemas,
    ListTables,
    DescribeTable,
    SampleData,
    ExecuteQuery,
    CreateChart,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::ListSchemas,
        ToolName::ListTables,
        ToolName::DescribeTable,
        ToolName::SampleData,
        ToolName::ExecuteQuery,
        ToolName::CreateChart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListSchemas => "list_schemas",
            ToolName::ListTables => "list_tables",
            ToolName::DescribeTable => "describe_table",
            ToolName::SampleData => "sample_data",
            ToolName::ExecuteQuery => "execute_query",
            ToolName::CreateChart => "create_chart",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {}", s))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListTablesArgs {
    pub schema: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeTableArgs {
    pub schema: String,
    pub table: String,
}

fn default_sample_rows() -> i64 {
    DEFAULT_SAMPLE_ROWS
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleDataArgs {
    pub schema: String,
    pub table: String,
    #[serde(default = "default_sample_rows")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteQueryArgs {
    pub sql: String,
}

pub type CreateChartArgs = ChartRequest;

/// Wire declaration for one tool.
pub fn declaration(tool: ToolName) -> FunctionDefinition {
    let (description, parameters) = match tool {
        ToolName::ListSchemas => (
            "List all available schemas in the database, with the semantic entities mapped into each.",
            None,
        ),
        ToolName::ListTables => (
            "List all tables and views in a schema, including row counts and any semantic description, grain, metrics and relationships.",
            Some(json!({
                "type": "object",
                "properties": {
                    "schema": {"type": "string", "description": "Schema name to list tables from."}
                },
                "required": ["schema"]
            })),
        ),
        ToolName::DescribeTable => (
            "Get column names, data types, nullability and semantic roles for a table.",
            Some(json!({
                "type": "object",
                "properties": {
                    "schema": {"type": "string", "description": "Schema name."},
                    "table": {"type": "string", "description": "Table name."}
                },
                "required": ["schema", "table"]
            })),
        ),
        ToolName::SampleData => (
            "Get sample rows from a table to understand the actual data values and format.",
            Some(json!({
                "type": "object",
                "properties": {
                    "schema": {"type": "string", "description": "Schema name."},
                    "table": {"type": "string", "description": "Table name."},
                    "limit": {"type": "integer", "description": "Number of sample rows (max 10, default 5)."}
                },
                "required": ["schema", "table"]
            })),
        ),
        ToolName::ExecuteQuery => (
            "Execute a read-only SQL query against DuckDB. Results capped at 100 rows; row_count reports the full size.",
            Some(json!({
                "type": "object",
                "properties": {
                    "sql": {"type": "string", "description": "SQL query to execute (DuckDB syntax)."}
                },
                "required": ["sql"]
            })),
        ),
        ToolName::CreateChart => (
            "Render a simple terminal chart for the user from data you already queried.",
            Some(json!({
                "type": "object",
                "properties": {
                    "chart_type": {
                        "type": "string",
                        "enum": ["bar", "line", "scatter", "histogram"],
                        "description": "Kind of chart."
                    },
                    "x_data": {"type": "array", "items": {"type": "string"}, "description": "Category labels or x values."},
                    "y_data": {"type": "array", "items": {"type": "number"}, "description": "Numeric values."},
                    "x_label": {"type": "string", "description": "X axis label."},
                    "y_label": {"type": "string", "description": "Y axis label."},
                    "title": {"type": "string", "description": "Chart title."}
                },
                "required": ["chart_type", "y_data"]
            })),
        ),
    };

    FunctionDefinition {
        name: tool.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Declarations for every tool, in a stable order.
pub fn declarations() -> Vec<FunctionDefinition> {
    ToolName::ALL.iter().map(|t| declaration(*t)).collect()
}

/// Names of the required parameters in a declaration.
pub fn required_params(def: &FunctionDefinition) -> Vec<String> {
    def.parameters
        .as_ref()
        .and_then(|p| p.get("required"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;

    fn placeholder(schema: &Value) -> Value {
        match schema.get("type").and_then(Value::as_str) {
            Some("string") => match schema.get("enum").and_then(Value::as_array) {
                Some(options) => options[0].clone(),
                None => json!("x"),
            },
            Some("integer") | Some("number") => json!(1),
            Some("array") => json!([]),
            _ => Value::Null,
        }
    }

    /// Build an argument object holding only the required parameters.
    fn minimal_args(def: &FunctionDefinition) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(params) = &def.parameters {
            for name in required_params(def) {
                obj.insert(name.clone(), placeholder(&params["properties"][&name]));
            }
        }
        Value::Object(obj)
    }

    fn accepts<T: DeserializeOwned>(args: Value) -> bool {
        serde_json::from_value::<T>(args).is_ok()
    }

    #[test]
    fn test_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
        assert!("drop_database".parse::<ToolName>().is_err());
    }

    #[test]
    fn test_declarations_match_argument_types() {
        for tool in ToolName::ALL {
            let def = declaration(tool);
            let args = minimal_args(&def);
            let ok = match tool {
                ToolName::ListSchemas => def.parameters.is_none(),
                ToolName::ListTables => accepts::<ListTablesArgs>(args),
                ToolName::DescribeTable => accepts::<DescribeTableArgs>(args),
                ToolName::SampleData => accepts::<SampleDataArgs>(args),
                ToolName::ExecuteQuery => accepts::<ExecuteQueryArgs>(args),
                ToolName::CreateChart => accepts::<CreateChartArgs>(args),
            };
            assert!(ok, "declaration for {} does not match its argument type", tool);
        }
    }

    #[test]
    fn test_declared_properties_cover_required() {
        for def in declarations() {
            if let Some(params) = &def.parameters {
                for name in required_params(&def) {
                    assert!(
                        params["properties"].get(&name).is_some(),
                        "{} requires undeclared {}",
                        def.name,
                        name
                    );
                }
            }
        }
    }

    #[test]
    fn test_sample_limit_defaults_to_five() {
        let args: SampleDataArgs =
            serde_json::from_value(json!({"schema": "raw", "table": "orders"})).unwrap();
        assert_eq!(args.limit, 5);
    }
}
