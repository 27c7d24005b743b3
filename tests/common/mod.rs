#![allow(dead_code)]

use astro::agent::{ModelMessage, ToolCall, Turn};
use astro::execution::DataLayer;
use astro::execution_loop::TransportError;
use astro::llm::{ModelRequest, ModelTransport};
use astro::semantic::load_from_yaml;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const MANIFEST: &str = r#"
entities:
  - name: orders
    schema: raw
    table: orders
    description: One row per customer order.
    grain: one order
    primary_key: order_id
    entity_type: fact
    columns:
      - name: order_id
        semantic_type: key
      - name: customer_id
        semantic_type: key
      - name: amount
        semantic_type: measure
        description: Order total in USD
        format: currency
      - name: status
        semantic_type: dimension
  - name: customers
    schema: raw
    table: customers
    description: Customer master data.
    grain: one customer
    primary_key: customer_id
relationships:
  - name: order_customer
    from_entity: orders
    from_column: customer_id
    to_entity: customers
    to_column: customer_id
metrics:
  - name: total_revenue
    entity: orders
    description: Sum of order amounts
    sql: SUM(amount)
"#;

/// Scratch warehouse on disk. Keep it alive for as long as the data layer.
pub struct Warehouse {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl Warehouse {
    pub fn build() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.duckdb");
        let csv = dir.path().join("events.csv");
        fs::write(&csv, "id,kind\n1,click\n2,view\n").unwrap();

        {
            let conn = duckdb::Connection::open(&path).unwrap();
            conn.execute_batch(&format!(
                "CREATE SCHEMA raw;
                 CREATE TABLE raw.orders AS
                     SELECT i AS order_id,
                            i % 7 AS customer_id,
                            (i * 2.5)::DOUBLE AS amount,
                            CASE WHEN i % 2 = 0 THEN 'shipped' ELSE 'pending' END AS status
                     FROM range(1, 43) t(i);
                 CREATE TABLE raw.customers AS
                     SELECT i AS customer_id, 'customer_' || i AS name
                     FROM range(0, 7) t(i);
                 CREATE TABLE raw.big AS SELECT i AS n FROM range(0, 250) t(i);
                 CREATE TABLE raw.floats AS
                     SELECT 'nan'::DOUBLE AS x, 'inf'::DOUBLE AS y, 1.5::DOUBLE AS z;
                 CREATE VIEW raw.events AS SELECT * FROM read_csv_auto('{}');",
                csv.display()
            ))
            .unwrap();
        }

        // The view stays in the catalog but can no longer be read.
        fs::remove_file(&csv).unwrap();

        Self { dir, path }
    }

    pub fn open(&self) -> DataLayer {
        let manifest = load_from_yaml(MANIFEST).unwrap();
        DataLayer::open(&self.path, Arc::new(manifest)).unwrap()
    }
}

type Responder = Box<dyn Fn(&[Turn]) -> ModelMessage + Send + Sync>;

/// One scripted model reply.
pub enum Step {
    Reply(ModelMessage),
    /// Build the reply from the conversation so far.
    Compute(Responder),
    Fail(TransportError),
    /// Never answers within any reasonable test timeout.
    Hang,
}

impl Step {
    pub fn text(text: &str) -> Self {
        Step::Reply(ModelMessage::text(text))
    }

    pub fn call(name: &str, args: Value) -> Self {
        Step::Reply(ModelMessage::tool_calls(vec![ToolCall::new(name, args)]))
    }

    pub fn calls(calls: Vec<(&str, Value)>) -> Self {
        Step::Reply(ModelMessage::tool_calls(
            calls.into_iter().map(|(n, a)| ToolCall::new(n, a)).collect(),
        ))
    }

    pub fn compute(f: impl Fn(&[Turn]) -> ModelMessage + Send + Sync + 'static) -> Self {
        Step::Compute(Box::new(f))
    }
}

/// What the agent sent on one (non-preflight) model call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub tool_names: Vec<String>,
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    fallback: Option<ModelMessage>,
    preflight_error: Option<TransportError>,
    calls: Vec<RecordedCall>,
}

/// `ModelTransport` that replays a fixed script. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().steps = steps.into();
        transport
    }

    /// Answer every call with `message` once the script runs out.
    pub fn with_fallback(self, message: ModelMessage) -> Self {
        self.state.lock().unwrap().fallback = Some(message);
        self
    }

    pub fn failing_preflight(self, error: TransportError) -> Self {
        self.state.lock().unwrap().preflight_error = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn boxed(&self) -> Box<dyn ModelTransport> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelMessage, TransportError> {
        let step = {
            let mut state = self.state.lock().unwrap();

            if request.max_output_tokens == Some(1) {
                return match state.preflight_error.clone() {
                    Some(e) => Err(e),
                    None => Ok(ModelMessage::text("pong")),
                };
            }

            state.calls.push(RecordedCall {
                system_prompt: request.system_prompt.unwrap_or_default().to_string(),
                turns: request.turns.to_vec(),
                tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            });

            match state.steps.pop_front() {
                Some(step) => step,
                None => match state.fallback.clone() {
                    Some(message) => Step::Reply(message),
                    None => Step::Fail(TransportError::fatal("script exhausted")),
                },
            }
        };

        match step {
            Step::Reply(message) => Ok(message),
            Step::Compute(f) => Ok(f(request.turns)),
            Step::Fail(e) => Err(e),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::fatal("hung call resumed"))
            }
        }
    }
}

/// Response of the most recent tool result batch.
pub fn last_tool_results(turns: &[Turn]) -> Vec<Value> {
    turns
        .iter()
        .rev()
        .find_map(|t| match t {
            Turn::ToolResults { results } => {
                Some(results.iter().map(|r| r.response.clone()).collect())
            }
            _ => None,
        })
        .unwrap_or_default()
}
