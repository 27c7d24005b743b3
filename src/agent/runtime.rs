//! Tool Dispatch
//!
//! Static table from tool name to typed handler. Nothing raised by the data
//! layer crosses this boundary: failures become `{"error": message}` results
//! and failed queries are also written to the `QueryErrorLog`.

use crate::agent::contracts::{ChartRequest, Source, ToolCall, ToolResult};
use crate::agent::memory::QueryErrorLog;
use crate::agent::tools::{
    CreateChartArgs, DescribeTableArgs, ExecuteQueryArgs, ListTablesArgs, SampleDataArgs, ToolName,
};
use crate::error::{AstroError, Result};
use crate::execution::{DataLayer, QueryOutcome};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

const STEP_SQL_WIDTH: usize = 120;

/// Side effects of one successful handler run, applied by the caller.
#[derive(Debug, Default)]
struct Effects {
    source: Option<Source>,
    chart: Option<ChartRequest>,
    query_error: Option<(String, String)>,
}

type Handler = fn(&DataLayer, &Value, &mut Effects) -> Result<Value>;

struct ToolEntry {
    tool: ToolName,
    handler: Handler,
}

/// Indexed by `ToolName as usize`; entries follow the enum's declaration order.
static TOOL_TABLE: [ToolEntry; 6] = [
    ToolEntry { tool: ToolName::ListSchemas, handler: list_schemas },
    ToolEntry { tool: ToolName::ListTables, handler: list_tables },
    ToolEntry { tool: ToolName::DescribeTable, handler: describe_table },
    ToolEntry { tool: ToolName::SampleData, handler: sample_data },
    ToolEntry { tool: ToolName::ExecuteQuery, handler: execute_query },
    ToolEntry { tool: ToolName::CreateChart, handler: create_chart },
];

/// Result of dispatching one tool call.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub result: ToolResult,
    pub source: Option<Source>,
    pub chart: Option<ChartRequest>,
}

impl ToolOutcome {
    fn new(name: &str, response: Value) -> Self {
        Self {
            result: ToolResult {
                name: name.to_string(),
                response,
            },
            source: None,
            chart: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.result.response.get("error").is_some()
    }
}

pub struct ToolRuntime<'a> {
    data: &'a DataLayer,
}

impl<'a> ToolRuntime<'a> {
    pub fn new(data: &'a DataLayer) -> Self {
        Self { data }
    }

    pub fn execute(&self, call: &ToolCall, errors: &mut QueryErrorLog) -> ToolOutcome {
        let tool = match call.name.parse::<ToolName>() {
            Ok(tool) => tool,
            Err(message) => {
                warn!("Model requested unknown tool '{}'", call.name);
                return ToolOutcome::new(&call.name, json!({ "error": message }));
            }
        };

        info!("> {}", step_description(tool, &call.args));

        let handler = TOOL_TABLE[tool as usize].handler;
        let mut effects = Effects::default();
        match handler(self.data, &call.args, &mut effects) {
            Ok(response) => {
                if let Some((sql, error)) = effects.query_error {
                    warn!("Query error: {}", error);
                    errors.record(sql, error);
                }
                ToolOutcome {
                    result: ToolResult {
                        name: call.name.clone(),
                        response,
                    },
                    source: effects.source,
                    chart: effects.chart,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Tool error ({}): {}", tool, message);
                if tool == ToolName::ExecuteQuery {
                    let sql = call.args.get("sql").and_then(Value::as_str).unwrap_or_default();
                    errors.record(sql, message.clone());
                }
                ToolOutcome::new(&call.name, json!({ "error": message }))
            }
        }
    }
}

/// Human-readable line describing what a tool call is about to do.
pub fn step_description(tool: ToolName, args: &Value) -> String {
    let arg = |key: &str| args.get(key).and_then(Value::as_str).unwrap_or("?").to_string();
    match tool {
        ToolName::ListSchemas => "Exploring database schemas...".to_string(),
        ToolName::ListTables => format!("Listing tables in '{}'...", arg("schema")),
        ToolName::DescribeTable => format!("Describing {}.{}...", arg("schema"), arg("table")),
        ToolName::SampleData => format!("Sampling data from {}.{}...", arg("schema"), arg("table")),
        ToolName::ExecuteQuery => format!("Executing: {}", truncate_sql(&arg("sql"))),
        ToolName::CreateChart => format!("Queueing chart: {}", arg("title")),
    }
}

fn truncate_sql(sql: &str) -> String {
    if sql.chars().count() <= STEP_SQL_WIDTH {
        sql.to_string()
    } else {
        let head: String = sql.chars().take(STEP_SQL_WIDTH - 3).collect();
        format!("{}...", head)
    }
}

fn decode<T: DeserializeOwned>(tool: ToolName, args: &Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|e| AstroError::ToolArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

fn list_schemas(data: &DataLayer, _args: &Value, effects: &mut Effects) -> Result<Value> {
    let schemas = data.list_schemas()?;
    effects.source = Some(Source::Schemas);
    Ok(serde_json::to_value(schemas)?)
}

fn list_tables(data: &DataLayer, args: &Value, effects: &mut Effects) -> Result<Value> {
    let args: ListTablesArgs = decode(ToolName::ListTables, args)?;
    let tables = data.list_tables(&args.schema)?;
    effects.source = Some(Source::Tables { schema: args.schema });
    Ok(serde_json::to_value(tables)?)
}

fn describe_table(data: &DataLayer, args: &Value, effects: &mut Effects) -> Result<Value> {
    let args: DescribeTableArgs = decode(ToolName::DescribeTable, args)?;
    let description = data.describe_table(&args.schema, &args.table)?;
    effects.source = Some(Source::Table {
        table: format!("{}.{}", args.schema, args.table),
    });
    Ok(serde_json::to_value(description)?)
}

fn sample_data(data: &DataLayer, args: &Value, effects: &mut Effects) -> Result<Value> {
    let args: SampleDataArgs = decode(ToolName::SampleData, args)?;
    let sample = data.sample_data(&args.schema, &args.table, args.limit)?;
    effects.source = Some(Source::Sample {
        table: format!("{}.{}", args.schema, args.table),
        row_count: sample.rows.len(),
    });
    Ok(serde_json::to_value(sample)?)
}

fn execute_query(data: &DataLayer, args: &Value, effects: &mut Effects) -> Result<Value> {
    let args: ExecuteQueryArgs = decode(ToolName::ExecuteQuery, args)?;
    let outcome = data.execute_query(&args.sql);
    match &outcome {
        QueryOutcome::Rows(result) => {
            effects.source = Some(Source::Query {
                sql: args.sql.clone(),
                row_count: result.row_count,
            });
        }
        QueryOutcome::Failed { error } => {
            effects.query_error = Some((args.sql.clone(), error.clone()));
        }
    }
    Ok(serde_json::to_value(outcome)?)
}

fn create_chart(_data: &DataLayer, args: &Value, effects: &mut Effects) -> Result<Value> {
    let chart: CreateChartArgs = decode(ToolName::CreateChart, args)?;
    if chart.y_data.is_empty() {
        return Err(AstroError::ToolArguments {
            tool: ToolName::CreateChart.to_string(),
            message: "y_data must not be empty".to_string(),
        });
    }
    if !chart.x_data.is_empty() && chart.x_data.len() != chart.y_data.len() {
        return Err(AstroError::ToolArguments {
            tool: ToolName::CreateChart.to_string(),
            message: format!(
                "x_data has {} values but y_data has {}",
                chart.x_data.len(),
                chart.y_data.len()
            ),
        });
    }
    effects.chart = Some(chart);
    Ok(json!({ "status": "chart_queued" }))
}
