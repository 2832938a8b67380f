//! The conversation loop implementation.

use std::collections::HashSet;
use std::sync::Arc;

use fractalbot_core::asset::Asset;
use fractalbot_core::error::{Error, ToolError};
use fractalbot_core::message::Message;
use fractalbot_core::provider::{Provider, ProviderRequest};
use fractalbot_core::tool::{ToolCall, ToolRegistry};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::contract::{self, BackendReply};
use crate::formatter;
use crate::prompt::build_system_prompt;
use crate::side_effects::{SideEffects, ToolUse};
use crate::stream_event::{LoopEvent, StatusEvent};

/// Default cap on backend calls per message.
pub const MAX_ITERATIONS: usize = 5;

/// What the loop was asked to handle.
#[derive(Debug, Clone, Default)]
pub struct LoopInput {
    pub message: String,
    pub history: Vec<Message>,
    pub assets: Vec<Asset>,
    /// Asset ids already taken; generated assets never reuse them.
    pub reserved_asset_ids: HashSet<String>,
}

/// How a run ended without a fatal error.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    Final(SideEffects),
    IterationLimit { tool_use_history: Vec<ToolUse> },
}

/// The outcome plus the working history the backend saw.
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub outcome: LoopOutcome,
    pub history: Vec<Message>,
    pub iterations: usize,
}

/// Drives the backend/tool cycle for one message at a time.
///
/// Cheap to clone: the provider and tool registry are shared, and every
/// run owns its own working history.
#[derive(Clone)]
pub struct ConversationLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: usize,
}

impl ConversationLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of backend calls per message.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the max tokens per backend response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the loop to completion.
    ///
    /// Returns `Err` for protocol violations, unknown tools and backend
    /// failures. Hitting the iteration cap is an `Ok` outcome.
    pub async fn run(&self, input: LoopInput) -> Result<LoopReport, Error> {
        self.drive(input, None).await
    }

    /// Run the loop on a background task, reporting progress as events.
    ///
    /// The stream always ends with a `token` event followed by either
    /// `complete` or `error`.
    pub fn run_stream(&self, input: LoopInput) -> mpsc::Receiver<LoopEvent> {
        let (tx, rx) = mpsc::channel::<LoopEvent>(128);
        let this = self.clone();

        tokio::spawn(async move {
            let result = this.drive(input, Some(&tx)).await;
            let (reply, terminal) = match result {
                Ok(report) => {
                    let reply = formatter::format_outcome(&report.outcome);
                    let terminal = StatusEvent::Complete {
                        side_effects: serde_json::Value::Object(reply.side_effects.clone()),
                    };
                    (reply, terminal)
                }
                Err(e) => (
                    formatter::format_error(&e),
                    StatusEvent::Error {
                        message: e.to_string(),
                    },
                ),
            };

            let _ = tx
                .send(LoopEvent::Token {
                    token: reply.message.content,
                    metadata: reply.message.metadata,
                })
                .await;
            let _ = tx.send(terminal.into()).await;
        });

        rx
    }

    async fn drive(
        &self,
        input: LoopInput,
        events: Option<&mpsc::Sender<LoopEvent>>,
    ) -> Result<LoopReport, Error> {
        let system_prompt = build_system_prompt(&self.tools.definitions(), &input.assets);

        let mut reserved_ids = input.reserved_asset_ids;
        reserved_ids.extend(input.assets.iter().map(|a| a.asset_id.clone()));

        let mut history = input.history;
        history.push(Message::user(input.message));

        info!(
            history = history.len(),
            assets = input.assets.len(),
            max_iterations = self.max_iterations,
            "Processing message"
        );

        let mut trace: Vec<ToolUse> = Vec::new();

        for iteration in 1..=self.max_iterations {
            emit(events, StatusEvent::Thinking { iteration }).await;
            debug!(iteration, "Requesting backend response");

            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(Message::system(&system_prompt));
            messages.extend(history.iter().cloned());

            let response = self
                .provider
                .complete(ProviderRequest {
                    model: self.model.clone(),
                    messages,
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                })
                .await?;

            let raw = response.message.content;
            let reply = contract::parse_reply(&raw).inspect_err(|e| {
                warn!(iteration, error = %e, raw = %raw, "Backend reply violated the JSON contract");
            })?;

            match reply {
                BackendReply::Tool(invocation) => {
                    if !self.tools.contains(&invocation.name) {
                        warn!(iteration, tool = %invocation.name, "Backend requested an unknown tool");
                        return Err(ToolError::NotFound(invocation.name).into());
                    }

                    let call_id = Uuid::new_v4().to_string();
                    info!(iteration, tool = %invocation.name, call_id = %call_id, "Executing tool");
                    emit(
                        events,
                        StatusEvent::ToolCall {
                            iteration,
                            id: call_id.clone(),
                            tool: invocation.clone(),
                        },
                    )
                    .await;

                    let call = ToolCall {
                        id: call_id.clone(),
                        name: invocation.name.clone(),
                        arguments: serde_json::Value::Object(invocation.parameters.clone()),
                    };
                    let results = match self.tools.execute(&call).await {
                        Ok(results) => results,
                        Err(ToolError::NotFound(name)) => {
                            return Err(ToolError::NotFound(name).into());
                        }
                        Err(e) => {
                            warn!(iteration, tool = %invocation.name, error = %e, "Tool execution failed");
                            json!({ "error": e.to_string() })
                        }
                    };

                    history.push(Message::assistant(
                        json!({ "type": "tool", "tool": &invocation }).to_string(),
                    ));
                    history.push(Message::assistant(
                        json!({
                            "type": "tool_result",
                            "id": &call_id,
                            "tool": &invocation.name,
                            "results": &results,
                        })
                        .to_string(),
                    ));

                    emit(
                        events,
                        StatusEvent::ToolResult {
                            iteration,
                            id: call_id.clone(),
                            tool: invocation.name.clone(),
                            results: results.clone(),
                        },
                    )
                    .await;

                    trace.push(ToolUse {
                        iteration,
                        id: call_id,
                        tool: invocation,
                        results,
                    });
                }
                BackendReply::FinalResponse(final_response) => {
                    info!(iteration, tool_calls = trace.len(), "Received final response");
                    return Ok(LoopReport {
                        outcome: LoopOutcome::Final(SideEffects::from_final_reserving(
                            final_response,
                            trace,
                            &reserved_ids,
                        )),
                        history,
                        iterations: iteration,
                    });
                }
            }
        }

        warn!(max_iterations = self.max_iterations, "Maximum iterations reached");
        Ok(LoopReport {
            outcome: LoopOutcome::IterationLimit {
                tool_use_history: trace,
            },
            history,
            iterations: self.max_iterations,
        })
    }
}

async fn emit(events: Option<&mpsc::Sender<LoopEvent>>, event: StatusEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event.into()).await;
    }
}
