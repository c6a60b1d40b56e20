//! Shared test fixtures: a server over the scripted runtime
#![allow(dead_code)]

use scripted_story::ScriptedStoryFactory;
use serde_json::Value;
use std::sync::Arc;
use story_mcp_server::tools::handle_tool_call;
use story_mcp_server::{ServerConfig, StoryServer};

/// Lines with one watched-variable change on the second step
pub const GOLD_SCRIPT: &str = "\
VAR gold = 10
Step one.
~ gold = 15
Step two.
Step three.
~ gold = 15
Step four.
";

/// Never stops continuing
pub const LOOP_SCRIPT: &str = "\
=== loop
The wheel turns.
-> loop
";

/// Opens directly on a choice set
pub const CHOICE_SCRIPT: &str = "\
* Left -> END
* Right -> END
";

pub fn server() -> Arc<StoryServer> {
    server_with(ServerConfig::default())
}

pub fn server_with(config: ServerConfig) -> Arc<StoryServer> {
    Arc::new(StoryServer::new(
        Arc::new(ScriptedStoryFactory::new()),
        config,
    ))
}

/// Invoke a tool and parse its single text payload as JSON.
///
/// Error payloads are plain text; those come back as a JSON string value.
pub async fn call(server: &StoryServer, name: &str, args: Value) -> (Value, bool) {
    let result = handle_tool_call(server, name, args).await;
    let payload = result.payload().to_string();
    let value = serde_json::from_str(&payload).unwrap_or(Value::String(payload));
    (value, result.is_error)
}

/// Start a session over `source` and return its id
pub async fn start(server: &StoryServer, source: &str) -> String {
    let (value, is_error) = call(server, "start_session", serde_json::json!({ "source": source })).await;
    assert!(!is_error, "start_session failed: {value}");
    value["session_id"].as_str().unwrap().to_string()
}
