//! Error types for story-mcp

use thiserror::Error;

/// Result type for story-mcp operations
pub type Result<T> = std::result::Result<T, StoryMcpError>;

/// story-mcp error types
#[derive(Debug, Error)]
pub enum StoryMcpError {
    /// No session with the given id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No debug session for the given session id
    #[error("No debug session for session: {0}")]
    DebugSessionNotFound(String),

    /// Caller-supplied session id already in use
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// Choice index outside the current choice set
    #[error("Invalid choice index {index}, {available} choices available")]
    InvalidChoice { index: usize, available: usize },

    /// Variable unknown to the story runtime
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Story cannot continue (ended, or waiting on a choice)
    #[error("Story cannot continue: {0}")]
    StoryEnded(String),

    /// Source failed to compile
    #[error("Compile failed: {0}")]
    CompileFailed(String),

    /// Tool invoked without a required argument
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// Story runtime failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl StoryMcpError {
    /// Variant name, embedded into error-flagged tool results alongside the
    /// message so clients can tell a missing session from a runtime fault.
    pub fn class_name(&self) -> &'static str {
        match self {
            StoryMcpError::SessionNotFound(_) => "SessionNotFound",
            StoryMcpError::DebugSessionNotFound(_) => "DebugSessionNotFound",
            StoryMcpError::SessionExists(_) => "SessionExists",
            StoryMcpError::InvalidChoice { .. } => "InvalidChoice",
            StoryMcpError::VariableNotFound(_) => "VariableNotFound",
            StoryMcpError::StoryEnded(_) => "StoryEnded",
            StoryMcpError::CompileFailed(_) => "CompileFailed",
            StoryMcpError::MissingArgument(_) => "MissingArgument",
            StoryMcpError::Runtime(_) => "RuntimeError",
            StoryMcpError::Serialization(_) => "SerializationError",
            StoryMcpError::Protocol(_) => "ProtocolError",
        }
    }
}

impl From<serde_json::Error> for StoryMcpError {
    fn from(err: serde_json::Error) -> Self {
        StoryMcpError::Serialization(err.to_string())
    }
}

/// JSON-RPC error codes used by the transport
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}
