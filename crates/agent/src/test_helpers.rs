//! Shared test doubles for the loop and router tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fractalbot_core::error::{ProviderError, ToolError};
use fractalbot_core::message::Message;
use fractalbot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use fractalbot_core::tool::{Tool, ToolRegistry};
use serde_json::{Value, json};

/// A provider that returns a sequence of scripted reply texts.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        if index >= self.replies.len() {
            panic!(
                "ScriptedProvider: no more replies (call #{}, have {})",
                index,
                self.replies.len()
            );
        }
        let model = request.model.clone();
        requests.push(request);

        Ok(ProviderResponse {
            message: Message::assistant(&self.replies[index]),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

/// A provider whose every call fails with the given error.
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(self.error.clone())
    }
}

/// A tool returning a fixed payload. Clones share the call log.
#[derive(Clone)]
pub struct StubTool {
    name: String,
    payload: Value,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl StubTool {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_arguments(&self) -> Value {
        self.calls.lock().unwrap().last().cloned().unwrap_or(Value::Null)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "stub tool"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push(arguments);
        Ok(self.payload.clone())
    }
}

/// A tool that always fails.
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: "upstream unavailable".into(),
        })
    }
}

/// `search` and `retrieve` stubs returning empty payloads.
pub fn stub_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(StubTool::new("search", json!({ "results": [] }))));
    registry.register(Box::new(StubTool::new("retrieve", json!({ "content": [] }))));
    registry
}

pub fn tool_reply(name: &str, parameters: Value) -> String {
    json!({ "type": "tool", "tool": { "name": name, "parameters": parameters } }).to_string()
}

pub fn final_reply(text: &str) -> String {
    json!({ "type": "final_response", "response": text }).to_string()
}
