//! End-to-end tests for the FractalBot pipeline.
//!
//! These run a request through the HTTP gateway, the conversation loop,
//! a real backend client and the real tools, with every outside service
//! replaced by a local mock server.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fractalbot_agent::{BotRequest, ConversationLoop, MessageRouter};
use fractalbot_config::{AppConfig, ProviderConfig};
use fractalbot_core::error::ProviderError;
use fractalbot_core::message::Message;
use fractalbot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use fractalbot_gateway::{ApiState, build_message_router, build_router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEATHER_PAGE: &str = r#"<html>
<head><style>body { color: red; }</style></head>
<body>
  <script>trackVisitor();</script>
  <h1>Weather today</h1>
  <p>Paris is sunny with a high of 21 degrees.</p>
  <p>London stays cloudy.</p>
</body>
</html>"#;

// ── Helpers ──────────────────────────────────────────────────────────────

/// A backend returning scripted reply texts in order.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedProvider exhausted");
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: None,
            model: request.model,
        })
    }
}

fn tool_reply(name: &str, parameters: Value) -> String {
    json!({ "type": "tool", "tool": { "name": name, "parameters": parameters } }).to_string()
}

fn anthropic_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_e2e",
        "model": "claude-3-5-sonnet-20241022",
        "content": [{ "type": "text", "text": text }],
        "usage": { "input_tokens": 100, "output_tokens": 20 }
    }))
}

/// Config pointing the backend and the search API at `server`.
fn config_for(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.api_key = Some("sk-ant-e2e".into());
    config.providers.insert(
        "anthropic".into(),
        ProviderConfig {
            api_url: Some(server.uri()),
            ..ProviderConfig::default()
        },
    );
    config.search.api_key = Some("gkey".into());
    config.search.engine_id = Some("cx-e2e".into());
    config.search.base_url = format!("{}/customsearch/v1", server.uri());
    config
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn weather_question_searches_retrieves_and_answers() {
    let server = MockServer::start().await;
    let page_url = format!("{}/paris-weather", server.uri());

    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("q", "weather in Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "title": "Paris Weather",
                "link": &page_url,
                "snippet": "Today's forecast for Paris",
                "displayLink": "weather.example"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/paris-weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WEATHER_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    // Backend replies, consumed in registration order.
    let replies = [
        tool_reply("search", json!({ "query": "weather in Paris" })),
        format!(
            "```json\n{}\n```",
            tool_reply("retrieve", json!({ "url": page_url, "query": "Paris" }))
        ),
        json!({
            "type": "final_response",
            "response": "It's sunny in Paris today, around 21 degrees."
        })
        .to_string(),
    ];
    for reply in &replies {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(anthropic_text(reply))
            .up_to_n_times(1)
            .mount(&server)
            .await;
    }

    let config = config_for(&server);
    let state = Arc::new(ApiState::new(build_message_router(&config).unwrap()));
    let app = build_router(state, &config.gateway);

    let response = app
        .oneshot(post_json(
            "/api/bot/run",
            json!({ "message": "What's the weather in Paris?", "history": [], "assets": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let reply: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(
        reply["message"]["content"],
        "It's sunny in Paris today, around 21 degrees."
    );
    assert!(reply["message"]["metadata"].get("error").is_none());

    let trace = reply["sideEffects"]["tool_use_history"].as_array().unwrap();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0]["iteration"], 1);
    assert_eq!(trace[0]["tool"]["name"], "search");
    assert_eq!(trace[0]["results"]["results"][0]["url"], page_url.as_str());
    assert_eq!(trace[1]["iteration"], 2);
    assert_eq!(trace[1]["tool"]["name"], "retrieve");
    assert_eq!(trace[1]["results"]["query"], "paris");
    assert_eq!(
        trace[1]["results"]["content"],
        json!(["Paris is sunny with a high of 21 degrees."])
    );

    let backend_calls = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v1/messages")
        .count();
    assert_eq!(backend_calls, 3);
}

#[tokio::test]
async fn five_tool_calls_hit_the_iteration_limit() {
    let replies = (0..6)
        .map(|i| tool_reply("search", json!({ "query": format!("attempt {i}") })))
        .collect();
    let provider = Arc::new(ScriptedProvider::new(replies));
    let tools = Arc::new(fractalbot_tools::default_registry(&AppConfig::default()));
    let router = MessageRouter::new(ConversationLoop::new(provider.clone(), tools, "m", 0.0));

    let reply = router.process(BotRequest::new("keep searching")).await.unwrap();

    assert_eq!(provider.calls(), 5);
    assert!(reply.message.is_error());
    assert_eq!(reply.message.metadata["max_iterations_reached"], true);
    let trace = reply.side_effects["tool_use_history"].as_array().unwrap();
    assert_eq!(trace.len(), 5);
    // Without credentials the search tool reports an error payload instead of failing.
    assert!(trace[0]["results"]["error"].is_string());
}

#[tokio::test]
async fn malformed_first_reply_invokes_no_tool() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(anthropic_text("Sure! Let me search for that."))
        .expect(1)
        .mount(&server)
        .await;

    let router = build_message_router(&config_for(&server)).unwrap();
    let reply = router.process(BotRequest::new("search please")).await.unwrap();

    assert!(reply.message.is_error());
    assert!(reply.message.content.starts_with("Error processing message: "));
    assert!(reply.side_effects.is_empty());
}

#[tokio::test]
async fn backend_auth_failure_becomes_error_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let router = build_message_router(&config_for(&server)).unwrap();
    let reply = router.process(BotRequest::new("hello")).await.unwrap();

    assert!(reply.message.is_error());
    assert!(reply.message.content.contains("Authentication failed"));
}

#[tokio::test]
async fn resubmitted_assets_get_distinct_ids() {
    let final_with_asset = json!({
        "type": "final_response",
        "response": "Saved the forecast.",
        "assets": [{ "name": "Forecast", "fileType": "txt", "content": "Sunny" }],
        "agent_jobs": [{
            "agentType": "email_summarizer",
            "input_asset_ids": "asset-emails",
            "output_asset_configs": [{ "name": "Summary", "fileType": "txt", "dataType": "unstructured" }]
        }]
    })
    .to_string();
    let provider = Arc::new(ScriptedProvider::new(vec![
        final_with_asset.clone(),
        final_with_asset,
    ]));
    let tools = Arc::new(fractalbot_tools::default_registry(&AppConfig::default()));
    let router = MessageRouter::new(ConversationLoop::new(provider, tools, "m", 0.0));

    let first = router.process(BotRequest::new("save it")).await.unwrap();
    let second = router.process(BotRequest::new("save it")).await.unwrap();

    let first_id = &first.message.metadata["asset_references"][0];
    let second_id = &second.message.metadata["asset_references"][0];
    assert!(first_id.is_string());
    assert_ne!(first_id, second_id);

    let job = &first.message.metadata["agent_jobs"][0];
    assert_eq!(job["input_asset_ids"], json!(["asset-emails"]));
    assert_eq!(job["metadata"]["priority"], "medium");
    assert_eq!(job["metadata"]["estimated_duration"], "5m");
}

#[tokio::test]
async fn streaming_run_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(anthropic_text(
            &json!({ "type": "final_response", "response": "Hi from the stream" }).to_string(),
        ))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let state = Arc::new(ApiState::new(build_message_router(&config).unwrap()));
    let response = build_router(state, &config.gateway)
        .oneshot(post_json("/api/bot/run/stream", json!({ "message": "Hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let thinking = text.find("\"status\":\"thinking\"").unwrap();
    let token = text.find("\"token\":\"Hi from the stream\"").unwrap();
    let complete = text.find("\"status\":\"complete\"").unwrap();
    assert!(thinking < token && token < complete);
}
