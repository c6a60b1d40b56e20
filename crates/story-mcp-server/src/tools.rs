//! Tool dispatch and handlers

use serde::Serialize;
use serde_json::Value;
use story_mcp_core::{ContinueResult, Result, StoryMcpError};
use tracing::warn;

use crate::StoryServer;
use crate::debug::BreakpointKind;

/// Uniform success/error envelope returned by every tool invocation
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// A single content block inside a tool result
#[derive(Debug, Clone, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".into(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".into(),
                text: text.into(),
            }],
            is_error: true,
        }
    }

    /// The single text payload
    pub fn payload(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

/// Resolve a tool name and invoke its handler.
///
/// Errors never escape this boundary: every failure becomes an error-flagged
/// result carrying the error class and message.
pub async fn handle_tool_call(server: &StoryServer, name: &str, arguments: Value) -> ToolResult {
    let result = match name {
        "compile" => compile(server, &arguments).await,
        "start_session" => start_session(server, &arguments).await,
        "start_session_from_state" => start_session_from_state(server, &arguments).await,
        "continue_story" => continue_story(server, &arguments).await,
        "choose" => choose(server, &arguments).await,
        "get_variable" => get_variable(server, &arguments).await,
        "set_variable" => set_variable(server, &arguments).await,
        "evaluate_function" => evaluate_function(server, &arguments).await,
        "save_state" => save_state(server, &arguments).await,
        "load_state" => load_state(server, &arguments).await,
        "get_global_tags" => get_global_tags(server, &arguments).await,
        "list_sessions" => list_sessions(server).await,
        "end_session" => end_session(server, &arguments).await,
        "start_debug" if server.debug_enabled() => start_debug(server, &arguments).await,
        "end_debug" if server.debug_enabled() => end_debug(server, &arguments).await,
        "add_breakpoint" if server.debug_enabled() => add_breakpoint(server, &arguments).await,
        "remove_breakpoint" if server.debug_enabled() => {
            remove_breakpoint(server, &arguments).await
        }
        "add_watch" if server.debug_enabled() => add_watch(server, &arguments).await,
        "debug_step" if server.debug_enabled() => debug_step(server, &arguments).await,
        "debug_continue" if server.debug_enabled() => debug_continue(server, &arguments).await,
        "debug_inspect" if server.debug_enabled() => debug_inspect(server, &arguments).await,
        "debug_trace" if server.debug_enabled() => debug_trace(server, &arguments).await,
        _ => {
            if let Some(collaborator) = server.collaborator(name) {
                collaborator.call(arguments).await
            } else {
                return ToolResult::error(format!("Unknown tool: {name}"));
            }
        }
    };

    match result {
        Ok(value) => ToolResult::text(value.to_string()),
        Err(e) => {
            warn!(tool = name, error = %e, "Tool call failed");
            let text = match &e {
                // Argument errors carry the bare message naming the field
                StoryMcpError::MissingArgument(_) => e.to_string(),
                _ => format!("{}: {}", e.class_name(), e),
            };
            ToolResult::error(text)
        }
    }
}

// --- argument extraction -------------------------------------------------
//
// Each tool owns its validation; these are only the shared pulls.

fn required_str<'a>(args: &'a Value, field: &'static str) -> Result<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or(StoryMcpError::MissingArgument(field.to_string()))
}

fn required_u64(args: &Value, field: &'static str) -> Result<u64> {
    args.get(field)
        .and_then(Value::as_u64)
        .ok_or(StoryMcpError::MissingArgument(field.to_string()))
}

fn required_value(args: &Value, field: &'static str) -> Result<Value> {
    args.get(field)
        .cloned()
        .ok_or(StoryMcpError::MissingArgument(field.to_string()))
}

fn optional_str(args: &Value, field: &str) -> Option<String> {
    args.get(field).and_then(Value::as_str).map(str::to_owned)
}

fn optional_u64(args: &Value, field: &str) -> Option<u64> {
    args.get(field).and_then(Value::as_u64)
}

// --- session tools -------------------------------------------------------

struct StartSessionArgs {
    source: String,
    session_id: Option<String>,
}

impl StartSessionArgs {
    fn from_args(args: &Value) -> Result<Self> {
        Ok(Self {
            source: required_str(args, "source")?.to_owned(),
            session_id: optional_str(args, "session_id"),
        })
    }
}

struct RestoreSessionArgs {
    source: String,
    state_json: String,
    session_id: Option<String>,
}

impl RestoreSessionArgs {
    fn from_args(args: &Value) -> Result<Self> {
        Ok(Self {
            source: required_str(args, "source")?.to_owned(),
            state_json: required_str(args, "state_json")?.to_owned(),
            session_id: optional_str(args, "session_id"),
        })
    }
}

async fn compile(server: &StoryServer, args: &Value) -> Result<Value> {
    let source = required_str(args, "source")?;
    let result = server.factory().compile(source).await?;
    Ok(serde_json::to_value(result)?)
}

/// Session id plus the first continuation (or a snapshot when the story
/// opens directly on choices)
fn session_started(session_id: &str, initial: ContinueResult) -> Result<Value> {
    let mut value = serde_json::to_value(initial)?;
    value["session_id"] = Value::String(session_id.to_string());
    Ok(value)
}

async fn start_session(server: &StoryServer, args: &Value) -> Result<Value> {
    let p = StartSessionArgs::from_args(args)?;
    let runtime = server.factory().create(&p.source).await?;
    let session = server.sessions().create(runtime, p.session_id).await?;

    let mut runtime = session.runtime().await;
    let initial = if runtime.can_continue() {
        runtime.continue_story().await?
    } else {
        ContinueResult::snapshot(false, runtime.current_choices())
    };
    session_started(session.id(), initial)
}

async fn start_session_from_state(server: &StoryServer, args: &Value) -> Result<Value> {
    let p = RestoreSessionArgs::from_args(args)?;
    let runtime = server.factory().restore(&p.source, &p.state_json).await?;
    let session = server.sessions().create(runtime, p.session_id).await?;

    // Restored mid-story: report where we stand without advancing
    let runtime = session.runtime().await;
    let snapshot = ContinueResult::snapshot(runtime.can_continue(), runtime.current_choices());
    session_started(session.id(), snapshot)
}

async fn continue_story(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let session = server.sessions().get(session_id)?;
    let mut runtime = session.runtime().await;
    if !runtime.can_continue() {
        return Err(StoryMcpError::StoryEnded(
            "story has ended or is awaiting a choice".into(),
        ));
    }
    let result = runtime.continue_story().await?;
    Ok(serde_json::to_value(result)?)
}

async fn choose(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let index = required_u64(args, "choice_index")? as usize;
    let session = server.sessions().get(session_id)?;
    let mut runtime = session.runtime().await;
    let result = runtime.choose(index).await?;
    Ok(serde_json::to_value(result)?)
}

async fn get_variable(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let name = required_str(args, "name")?;
    let session = server.sessions().get(session_id)?;
    let runtime = session.runtime().await;
    let value = runtime.get_variable(name).await?;
    Ok(serde_json::json!({ "name": name, "value": value }))
}

async fn set_variable(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let name = required_str(args, "name")?;
    let value = required_value(args, "value")?;
    let session = server.sessions().get(session_id)?;
    let mut runtime = session.runtime().await;
    runtime.set_variable(name, value.clone()).await?;
    Ok(serde_json::json!({ "name": name, "value": value }))
}

async fn evaluate_function(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let function_name = required_str(args, "function_name")?;
    let fn_args: Vec<Value> = match args.get("args") {
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(StoryMcpError::Protocol(format!(
                "args must be an array, got {other}"
            )));
        }
        None => Vec::new(),
    };
    let session = server.sessions().get(session_id)?;
    let mut runtime = session.runtime().await;
    let result = runtime.evaluate_function(function_name, &fn_args).await?;
    Ok(serde_json::json!({ "result": result }))
}

async fn save_state(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let session = server.sessions().get(session_id)?;
    let state_json = {
        let runtime = session.runtime().await;
        runtime.save_state().await?
    };
    session.remember_state(state_json.clone()).await;
    Ok(serde_json::json!({ "state_json": state_json }))
}

async fn load_state(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let session = server.sessions().get(session_id)?;
    let state_json = match optional_str(args, "state_json") {
        Some(blob) => blob,
        None => session.last_saved_state().await.ok_or_else(|| {
            StoryMcpError::Runtime("no saved state on this session; pass state_json".into())
        })?,
    };
    let mut runtime = session.runtime().await;
    runtime.load_state(&state_json).await?;
    Ok(serde_json::json!({ "loaded": true }))
}

async fn get_global_tags(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let session = server.sessions().get(session_id)?;
    let runtime = session.runtime().await;
    Ok(serde_json::json!({ "tags": runtime.global_tags() }))
}

async fn list_sessions(server: &StoryServer) -> Result<Value> {
    Ok(serde_json::json!({ "sessions": server.sessions().list() }))
}

async fn end_session(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let ended = server.sessions().end(session_id).await;
    Ok(serde_json::json!({ "ended": ended }))
}

// --- debug tools ---------------------------------------------------------

struct AddBreakpointArgs {
    session_id: String,
    kind: BreakpointKind,
    target: String,
}

impl AddBreakpointArgs {
    fn from_args(args: &Value) -> Result<Self> {
        Ok(Self {
            session_id: required_str(args, "session_id")?.to_owned(),
            kind: BreakpointKind::parse(required_str(args, "type")?)?,
            target: required_str(args, "target")?.to_owned(),
        })
    }
}

async fn start_debug(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    // Debugging requires a live session; NotFound surfaces otherwise
    server.sessions().get(session_id)?;
    server.debug().start(session_id);
    Ok(serde_json::json!({ "session_id": session_id, "debugging": true }))
}

async fn end_debug(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let ended = server.debug().end(session_id);
    Ok(serde_json::json!({ "ended": ended }))
}

async fn add_breakpoint(server: &StoryServer, args: &Value) -> Result<Value> {
    let p = AddBreakpointArgs::from_args(args)?;
    let breakpoint = server
        .debug()
        .add_breakpoint(&p.session_id, p.kind, p.target)
        .await?;
    Ok(serde_json::to_value(breakpoint)?)
}

async fn remove_breakpoint(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let id = required_u64(args, "id")?;
    let removed = server.debug().remove_breakpoint(session_id, id).await?;
    Ok(serde_json::json!({ "removed": removed }))
}

async fn add_watch(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let variable = required_str(args, "variable")?;
    let session = server.sessions().get(session_id)?;
    let baseline = server.debug().add_watch(session_id, &session, variable).await?;
    Ok(serde_json::json!({ "variable": variable, "value": baseline }))
}

async fn debug_step(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let session = server.sessions().get(session_id)?;
    let outcome = server.debug().step(session_id, &session).await?;
    Ok(serde_json::to_value(outcome)?)
}

async fn debug_continue(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let max_steps = optional_u64(args, "max_steps").unwrap_or(server.default_max_steps());
    let session = server.sessions().get(session_id)?;
    let outcome = server
        .debug()
        .continue_run(session_id, &session, max_steps)
        .await?;
    Ok(serde_json::to_value(outcome)?)
}

async fn debug_inspect(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let snapshot = server.debug().inspect(session_id).await?;
    Ok(serde_json::to_value(snapshot)?)
}

async fn debug_trace(server: &StoryServer, args: &Value) -> Result<Value> {
    let session_id = required_str(args, "session_id")?;
    let last_n = optional_u64(args, "last_n").unwrap_or(20) as usize;
    let entries = server.debug().trace(session_id, last_n).await?;
    Ok(serde_json::json!({ "entries": entries }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_wire_shape() {
        let result = ToolResult::text("{\"ok\":true}");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["isError"], false);

        let err = ToolResult::error("boom");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["text"], "boom");
    }

    #[test]
    fn required_str_names_the_missing_field() {
        let args = serde_json::json!({});
        let err = required_str(&args, "session_id").unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument: session_id");
    }

    #[test]
    fn add_breakpoint_args_validate_kind() {
        let args = serde_json::json!({
            "session_id": "s1",
            "type": "pattern",
            "target": "dragon"
        });
        let parsed = AddBreakpointArgs::from_args(&args).unwrap();
        assert_eq!(parsed.kind, BreakpointKind::Pattern);

        let bad = serde_json::json!({
            "session_id": "s1",
            "type": "line",
            "target": "x"
        });
        assert!(AddBreakpointArgs::from_args(&bad).is_err());
    }
}
