//! Story runtime trait

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::story::{Choice, CompileResult, ContinueResult};

/// Trait for driving one live story interpreter instance.
///
/// One instance exists per session and is never shared between sessions; the
/// server serializes access per session, so `&mut self` methods see each
/// other's post-state.
#[async_trait]
pub trait StoryRuntime: Send + Sync + 'static {
    /// Whether the story can advance without a choice being made
    fn can_continue(&self) -> bool;

    /// Advance by exactly one continuation unit
    async fn continue_story(&mut self) -> Result<ContinueResult>;

    /// Choices currently on offer
    fn current_choices(&self) -> Vec<Choice>;

    /// Select a choice by index, then advance one continuation unit
    async fn choose(&mut self, index: usize) -> Result<ContinueResult>;

    /// Read a story variable
    async fn get_variable(&self, name: &str) -> Result<Value>;

    /// Write a story variable
    async fn set_variable(&mut self, name: &str, value: Value) -> Result<()>;

    /// Evaluate a story function with the given arguments
    async fn evaluate_function(&mut self, name: &str, args: &[Value]) -> Result<Value>;

    /// Serialize the full story state to an opaque JSON blob
    async fn save_state(&self) -> Result<String>;

    /// Restore state previously produced by [`save_state`](Self::save_state)
    async fn load_state(&mut self, json: &str) -> Result<()>;

    /// Tags declared at the top of the story
    fn global_tags(&self) -> Vec<String>;

    /// Release any execution context held by the runtime.
    ///
    /// Must complete before session teardown returns, so "ended" means
    /// "resources reclaimed".
    async fn shutdown(&mut self) -> Result<()>;
}

/// Factory for creating story runtime instances.
///
/// Compilation is stateless; each `create`/`restore` call yields an
/// internally isolated runtime.
#[async_trait]
pub trait StoryRuntimeFactory: Send + Sync + 'static {
    /// Compile source without starting a session
    async fn compile(&self, source: &str) -> Result<CompileResult>;

    /// Compile source and create a fresh runtime at the story start
    async fn create(&self, source: &str) -> Result<Box<dyn StoryRuntime>>;

    /// Compile source and restore a previously saved state into it
    async fn restore(&self, source: &str, state_json: &str) -> Result<Box<dyn StoryRuntime>>;
}
