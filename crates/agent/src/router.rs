//! Message router: the entry point for one user turn.
//!
//! Validates the request, hands it to the [`ConversationLoop`] and turns
//! whatever comes back into a [`ChatResponse`]. Only request validation
//! surfaces as `Err`; everything the loop reports becomes a reply.

use std::collections::HashSet;

use fractalbot_core::asset::Asset;
use fractalbot_core::error::Error;
use fractalbot_core::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::formatter::{self, ChatResponse};
use crate::loop_runner::{ConversationLoop, LoopInput};
use crate::stream_event::LoopEvent;

/// Body of a bot run request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotRequest {
    pub message: String,

    #[serde(default)]
    pub history: Vec<Message>,

    #[serde(default)]
    pub assets: Vec<Asset>,

    /// Ids already in use server-side; never read from the wire.
    #[serde(skip)]
    pub reserved_asset_ids: HashSet<String>,
}

impl BotRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            assets: Vec::new(),
            reserved_asset_ids: HashSet::new(),
        }
    }

    /// Keep generated assets off these ids.
    pub fn with_reserved_asset_ids(mut self, ids: HashSet<String>) -> Self {
        self.reserved_asset_ids = ids;
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.message.trim().is_empty() {
            return Err(Error::InvalidRequest("Message cannot be empty".into()));
        }
        Ok(())
    }

    fn into_input(self) -> LoopInput {
        LoopInput {
            message: self.message,
            history: self.history,
            assets: self.assets,
            reserved_asset_ids: self.reserved_asset_ids,
        }
    }
}

#[derive(Clone)]
pub struct MessageRouter {
    agent: ConversationLoop,
}

impl MessageRouter {
    pub fn new(agent: ConversationLoop) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &ConversationLoop {
        &self.agent
    }

    /// Run one turn and format the result.
    pub async fn process(&self, request: BotRequest) -> Result<ChatResponse, Error> {
        request.validate()?;
        info!(
            history = request.history.len(),
            assets = request.assets.len(),
            "Routing bot message"
        );

        let reply = match self.agent.run(request.into_input()).await {
            Ok(report) => formatter::format_outcome(&report.outcome),
            Err(e) => {
                error!(error = %e, "Bot run failed");
                formatter::format_error(&e)
            }
        };
        Ok(reply)
    }

    /// Run one turn on a background task, streaming progress events.
    pub fn process_stream(&self, request: BotRequest) -> Result<mpsc::Receiver<LoopEvent>, Error> {
        request.validate()?;
        info!(history = request.history.len(), "Routing streaming bot message");
        Ok(self.agent.run_stream(request.into_input()))
    }
}

/// Assets carried in a reply's `sideEffects`, if any.
pub fn generated_assets(side_effects: &Map<String, Value>) -> Vec<Asset> {
    side_effects
        .get("assets")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::ITERATION_LIMIT_REPLY;
    use crate::test_helpers::*;
    use fractalbot_core::error::ProviderError;
    use serde_json::json;
    use std::sync::Arc;

    fn router(replies: Vec<String>) -> MessageRouter {
        let provider = Arc::new(ScriptedProvider::new(replies));
        MessageRouter::new(ConversationLoop::new(provider, Arc::new(stub_registry()), "m", 0.0))
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let router = router(vec![]);
        let err = router.process(BotRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(router.process_stream(BotRequest::new("")).is_err());
    }

    #[tokio::test]
    async fn final_reply_is_formatted() {
        let router = router(vec![final_reply("Hello!")]);
        let reply = router.process(BotRequest::new("Hi")).await.unwrap();
        assert_eq!(reply.message.content, "Hello!");
        assert!(!reply.message.is_error());
    }

    #[tokio::test]
    async fn protocol_error_becomes_error_reply() {
        let router = router(vec!["{\"type\": \"chitchat\"}".into()]);
        let reply = router.process(BotRequest::new("Hi")).await.unwrap();
        assert!(reply.message.is_error());
        assert!(reply.message.content.contains("Invalid response type: chitchat"));
        assert!(reply.side_effects.is_empty());
    }

    #[tokio::test]
    async fn provider_error_becomes_error_reply() {
        let agent = ConversationLoop::new(
            Arc::new(FailingProvider::new(ProviderError::AuthenticationFailed("bad key".into()))),
            Arc::new(stub_registry()),
            "m",
            0.0,
        );
        let reply = MessageRouter::new(agent)
            .process(BotRequest::new("Hi"))
            .await
            .unwrap();
        assert!(reply.message.content.starts_with("Error processing message: "));
        assert!(reply.message.content.contains("bad key"));
    }

    #[tokio::test]
    async fn iteration_limit_reply() {
        let replies = (0..5).map(|_| tool_reply("search", json!({"query": "q"}))).collect();
        let reply = router(replies).process(BotRequest::new("Hi")).await.unwrap();
        assert_eq!(reply.message.content, ITERATION_LIMIT_REPLY);
        assert_eq!(reply.message.metadata["max_iterations_reached"], true);
        assert_eq!(reply.side_effects["tool_use_history"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn generated_assets_are_extracted() {
        let reply_text = json!({
            "type": "final_response",
            "response": "Here is your poem",
            "assets": [{ "name": "Poem", "fileType": "txt", "content": "Roses" }]
        })
        .to_string();
        let reply = router(vec![reply_text]).process(BotRequest::new("poem")).await.unwrap();

        let assets = generated_assets(&reply.side_effects);
        assert_eq!(assets.len(), 1);
        assert!(!assets[0].asset_id.is_empty());
        assert_eq!(reply.message.metadata["asset_references"][0], assets[0].asset_id.as_str());
    }

    #[test]
    fn request_body_defaults() {
        let req: BotRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(req.history.is_empty());
        assert!(req.assets.is_empty());
        assert!(req.reserved_asset_ids.is_empty());
    }

    #[tokio::test]
    async fn reserved_ids_are_not_reused() {
        let reply_text = json!({
            "type": "final_response",
            "response": "Overwrote it",
            "assets": [{ "asset_id": "user-notes", "name": "Bot copy", "fileType": "txt" }]
        })
        .to_string();
        let request = BotRequest::new("overwrite")
            .with_reserved_asset_ids(["user-notes".to_string()].into());
        let reply = router(vec![reply_text]).process(request).await.unwrap();

        let assets = generated_assets(&reply.side_effects);
        assert_ne!(assets[0].asset_id, "user-notes");
        assert_eq!(reply.message.metadata["asset_references"][0], assets[0].asset_id.as_str());
    }
}
