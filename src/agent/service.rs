//! Agent
//!
//! Drives one question to an answer: model call, tool execution, repeat,
//! bounded by `AgentConfig::max_turns`. Conversation history and the query
//! error log persist across questions on the same agent.

use crate::agent::contracts::{ChartRequest, ModelMessage, Source, Turn};
use crate::agent::memory::QueryErrorLog;
use crate::agent::runtime::ToolRuntime;
use crate::agent::tools;
use crate::agent_prompts::build_system_prompt;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::execution::DataLayer;
use crate::llm::{Backend, FunctionDefinition, GeminiTransport, LlmClient, ModelTransport};
use tracing::{debug, info, warn};

pub const MAX_TURNS_MESSAGE: &str =
    "(Agent reached maximum turns without a final answer. Try a more specific question.)";
pub const NO_RESPONSE_MESSAGE: &str = "(No response from model)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    ExecutingTools,
}

/// One conversation against one warehouse. Not for concurrent use.
pub struct Agent<'a> {
    data: &'a DataLayer,
    llm: LlmClient,
    config: AgentConfig,
    tools: Vec<FunctionDefinition>,
    conversation: Vec<Turn>,
    error_log: QueryErrorLog,
    sources: Vec<Source>,
    charts: Vec<ChartRequest>,
    /// Conversation length when the current `ask()` started; cleared on completion.
    in_flight: Option<usize>,
}

impl<'a> Agent<'a> {
    /// Connect to Gemini and run the preflight check.
    pub async fn new(
        data: &'a DataLayer,
        api_key: impl Into<String>,
        model: impl Into<String>,
        backend: Backend,
        config: AgentConfig,
    ) -> Result<Agent<'a>> {
        let transport = GeminiTransport::new(api_key, backend);
        Self::with_transport(data, Box::new(transport), model, config).await
    }

    /// Build an agent on any transport. Runs the preflight check.
    pub async fn with_transport(
        data: &'a DataLayer,
        transport: Box<dyn ModelTransport>,
        model: impl Into<String>,
        config: AgentConfig,
    ) -> Result<Agent<'a>> {
        let llm = LlmClient::new(transport, model, &config);
        llm.preflight().await?;
        info!("Agent ready (model={})", llm.model());

        Ok(Self {
            data,
            llm,
            config,
            tools: tools::declarations(),
            conversation: Vec::new(),
            error_log: QueryErrorLog::new(),
            sources: Vec::new(),
            charts: Vec::new(),
            in_flight: None,
        })
    }

    /// Answer `question`, exploring the warehouse through tool calls.
    ///
    /// Running out of turns is not an error; it returns `MAX_TURNS_MESSAGE`.
    /// A call that fails or is dropped mid-flight leaves no partial exchange
    /// in the history.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        self.rollback_interrupted();
        self.sources.clear();
        self.charts.clear();

        let start_len = self.conversation.len();
        self.in_flight = Some(start_len);
        self.conversation.push(Turn::User {
            text: question.to_string(),
        });

        match self.run_loop().await {
            Ok(answer) => {
                self.in_flight = None;
                Ok(answer)
            }
            Err(e) => {
                warn!("ask() failed, discarding partial exchange: {}", e);
                self.conversation.truncate(start_len);
                self.charts.clear();
                self.in_flight = None;
                Err(e)
            }
        }
    }

    async fn run_loop(&mut self) -> Result<String> {
        let mut state = LoopState::AwaitingModel;

        for turn in 0..self.config.max_turns {
            debug!("Turn {} of {} ({:?})", turn + 1, self.config.max_turns, state);

            let system_prompt = build_system_prompt(self.data.manifest(), &self.error_log);
            let message = self
                .llm
                .generate(&system_prompt, &self.conversation, &self.tools)
                .await?;

            if !message.has_tool_calls() {
                let answer = match message.joined_text() {
                    Some(text) => {
                        self.conversation.push(Turn::Model(message));
                        text
                    }
                    None => {
                        warn!("Model returned neither text nor tool calls");
                        self.conversation
                            .push(Turn::Model(ModelMessage::text(NO_RESPONSE_MESSAGE)));
                        NO_RESPONSE_MESSAGE.to_string()
                    }
                };
                return Ok(answer);
            }

            let calls = message.tool_calls.clone();
            self.conversation.push(Turn::Model(message));
            state = LoopState::ExecutingTools;
            debug!("{:?}: {} tool calls", state, calls.len());

            let runtime = ToolRuntime::new(self.data);
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let outcome = runtime.execute(call, &mut self.error_log);
                if let Some(source) = outcome.source {
                    self.sources.push(source);
                }
                if let Some(chart) = outcome.chart {
                    self.charts.push(chart);
                }
                results.push(outcome.result);
            }
            self.conversation.push(Turn::ToolResults { results });
            state = LoopState::AwaitingModel;
        }

        info!(
            "Reached {} turns without a final answer (last state {:?})",
            self.config.max_turns, state
        );
        Ok(MAX_TURNS_MESSAGE.to_string())
    }

    /// Drop whatever a previously interrupted `ask()` left behind.
    fn rollback_interrupted(&mut self) {
        if let Some(len) = self.in_flight.take() {
            warn!(
                "Previous question was interrupted; discarding {} partial turns",
                self.conversation.len().saturating_sub(len)
            );
            self.conversation.truncate(len);
        }
    }

    /// What the most recent `ask()` consulted.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Charts queued by the most recent successful `ask()`, for an external
    /// renderer.
    pub fn take_charts(&mut self) -> Vec<ChartRequest> {
        std::mem::take(&mut self.charts)
    }

    pub fn conversation(&self) -> &[Turn] {
        &self.conversation
    }

    pub fn error_log(&self) -> &QueryErrorLog {
        &self.error_log
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }
}
