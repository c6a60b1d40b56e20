//! Tool catalog assembly

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use story_mcp_core::Result;

/// Tool definition for MCP tools/list
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A capability owned by an external collaborator, forwarded by the
/// dispatcher after the built-in tools. Its catalog entry only exists when
/// the collaborator was actually supplied, so the advertised catalog always
/// matches what can succeed.
#[async_trait]
pub trait CollaboratorTool: Send + Sync {
    fn definition(&self) -> ToolDef;
    async fn call(&self, arguments: Value) -> Result<Value>;
}

/// Assemble the tool catalog once at server construction.
pub fn build_catalog(
    debug_enabled: bool,
    collaborators: &[Arc<dyn CollaboratorTool>],
) -> Vec<ToolDef> {
    let mut tools = session_tools();
    if debug_enabled {
        tools.extend(debug_tools());
    }
    tools.extend(collaborators.iter().map(|c| c.definition()));
    tools
}

fn session_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "compile".into(),
            description: "Compile story source without starting a session. Returns success flag, compiled JSON, errors and warnings.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "source": {
                        "type": "string",
                        "description": "Story source text to compile"
                    }
                },
                "required": ["source"]
            }),
        },
        ToolDef {
            name: "start_session".into(),
            description: "Compile source and start a new story session. Returns the session id and the first continuation result.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "source": {
                        "type": "string",
                        "description": "Story source text"
                    },
                    "session_id": {
                        "type": "string",
                        "description": "Optional caller-supplied session id; generated when omitted"
                    }
                },
                "required": ["source"]
            }),
        },
        ToolDef {
            name: "start_session_from_state".into(),
            description: "Start a session from source plus a previously saved state blob.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "source": {
                        "type": "string",
                        "description": "Story source text"
                    },
                    "state_json": {
                        "type": "string",
                        "description": "Opaque state blob from save_state"
                    },
                    "session_id": {
                        "type": "string",
                        "description": "Optional caller-supplied session id"
                    }
                },
                "required": ["source", "state_json"]
            }),
        },
        ToolDef {
            name: "continue_story".into(),
            description: "Advance a session by one continuation unit. Returns text, canContinue, choices and tags.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "choose".into(),
            description: "Select a pending choice by index and continue the story.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "choice_index": {
                        "type": "integer",
                        "description": "Zero-based index into the current choice set"
                    }
                },
                "required": ["session_id", "choice_index"]
            }),
        },
        ToolDef {
            name: "get_variable".into(),
            description: "Read a story variable from a session.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "name": { "type": "string", "description": "Variable name" }
                },
                "required": ["session_id", "name"]
            }),
        },
        ToolDef {
            name: "set_variable".into(),
            description: "Write a story variable in a session.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "name": { "type": "string", "description": "Variable name" },
                    "value": { "description": "New value (any JSON)" }
                },
                "required": ["session_id", "name", "value"]
            }),
        },
        ToolDef {
            name: "evaluate_function".into(),
            description: "Evaluate a story function and return its result.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "function_name": { "type": "string" },
                    "args": {
                        "type": "array",
                        "description": "Positional arguments",
                        "default": []
                    }
                },
                "required": ["session_id", "function_name"]
            }),
        },
        ToolDef {
            name: "save_state".into(),
            description: "Serialize the full session state to an opaque JSON blob.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "load_state".into(),
            description: "Restore session state from a blob (or from the session's last save_state when omitted).".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "state_json": {
                        "type": "string",
                        "description": "Blob from save_state; defaults to the last one saved on this session"
                    }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "get_global_tags".into(),
            description: "List the tags declared at the top of the story.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "list_sessions".into(),
            description: "List the ids of all live sessions.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDef {
            name: "end_session".into(),
            description: "End a session and release its runtime. Idempotent.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
    ]
}

fn debug_tools() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "start_debug".into(),
            description: "Attach debug instrumentation to an existing session (breakpoints, watches, trace). Restarting clears previous instrumentation.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "end_debug".into(),
            description: "Detach debug instrumentation. The underlying session keeps running.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "add_breakpoint".into(),
            description: "Add a breakpoint. Types: knot, stitch (location heuristics on output text), pattern (regex, substring fallback), variable_change (watched variable changed).".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "type": {
                        "type": "string",
                        "enum": ["knot", "stitch", "pattern", "variable_change"]
                    },
                    "target": {
                        "type": "string",
                        "description": "Knot/stitch name, regex pattern, or variable name"
                    }
                },
                "required": ["session_id", "type", "target"]
            }),
        },
        ToolDef {
            name: "remove_breakpoint".into(),
            description: "Remove a breakpoint by id. Returns whether anything was removed.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "id": { "type": "integer", "description": "Breakpoint id" }
                },
                "required": ["session_id", "id"]
            }),
        },
        ToolDef {
            name: "add_watch".into(),
            description: "Watch a variable; its value is re-read every debug step and changes are counted.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "variable": { "type": "string", "description": "Variable name to watch" }
                },
                "required": ["session_id", "variable"]
            }),
        },
        ToolDef {
            name: "debug_step".into(),
            description: "Advance the story by exactly one continuation unit, updating watches and evaluating breakpoints.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "debug_continue".into(),
            description: "Step repeatedly until a breakpoint hits, the story stops or offers choices, or max_steps is exhausted.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "max_steps": {
                        "type": "integer",
                        "description": "Upper bound on steps taken by this call"
                    }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "debug_inspect".into(),
            description: "Snapshot of the debug session: step count, paused flag, breakpoints, watch values, last output.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" }
                },
                "required": ["session_id"]
            }),
        },
        ToolDef {
            name: "debug_trace".into(),
            description: "The most recent N execution trace entries.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "session_id": { "type": "string" },
                    "last_n": {
                        "type": "integer",
                        "description": "How many entries to return (default 20)"
                    }
                },
                "required": ["session_id"]
            }),
        },
    ]
}
