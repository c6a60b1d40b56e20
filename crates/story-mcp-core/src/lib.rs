//! # story-mcp-core
//!
//! Core types and traits for the story-mcp protocol.
//!
//! This crate provides the foundational pieces shared by the server and by
//! runtime bridges:
//! - The [`StoryRuntime`] / [`StoryRuntimeFactory`] traits
//! - Continuation and compilation wire types
//! - The error taxonomy and JSON-RPC error codes

pub mod error;
pub mod runtime;
pub mod story;

pub use error::{error_codes, Result, StoryMcpError};
pub use runtime::{StoryRuntime, StoryRuntimeFactory};
pub use story::{Choice, CompileResult, ContinueResult};
