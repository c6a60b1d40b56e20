//! # story-mcp-server
//!
//! MCP server for driving interactive-fiction story runtimes.
//!
//! This crate provides:
//! - A concurrent session registry, one isolated `StoryRuntime` per session
//! - A debug engine: breakpoints, variable watches, single-stepping, a
//!   bounded execution trace
//! - A tool catalog and dispatcher with per-tool argument validation
//! - MCP JSON-RPC protocol handling over HTTP, streamed (SSE) or direct

pub mod debug;
pub mod mcp;
pub mod registry;
pub mod sessions;
pub mod tools;
pub mod transport;

pub use debug::DebugEngine;
pub use registry::{CollaboratorTool, ToolDef};
pub use sessions::SessionManager;
pub use tools::ToolResult;

use std::sync::Arc;
use story_mcp_core::{Result, StoryRuntimeFactory};
use tokio::net::TcpListener;

/// Server tunables, fixed at construction
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name reported by `initialize`
    pub name: String,
    /// Advertise and dispatch the debug tool group
    pub debug_enabled: bool,
    /// Execution trace trailing-window size per debug session
    pub trace_limit: usize,
    /// Step cap for `debug_continue` when the client omits `max_steps`
    pub default_max_steps: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "story-mcp".to_string(),
            debug_enabled: true,
            trace_limit: 256,
            default_max_steps: 64,
        }
    }
}

/// The story MCP server: session table, debug engine, and tool catalog
/// around a story runtime factory.
pub struct StoryServer {
    factory: Arc<dyn StoryRuntimeFactory>,
    sessions: SessionManager,
    debug: DebugEngine,
    collaborators: Vec<Arc<dyn CollaboratorTool>>,
    catalog: Vec<ToolDef>,
    config: ServerConfig,
}

impl StoryServer {
    pub fn new(factory: Arc<dyn StoryRuntimeFactory>, config: ServerConfig) -> Self {
        let debug = DebugEngine::new(config.trace_limit);
        let catalog = registry::build_catalog(config.debug_enabled, &[]);
        Self {
            factory,
            sessions: SessionManager::new(),
            debug,
            collaborators: Vec::new(),
            catalog,
            config,
        }
    }

    /// Attach an external collaborator tool. The catalog is rebuilt so the
    /// advertised tools always match what can succeed.
    pub fn add_collaborator(&mut self, tool: Arc<dyn CollaboratorTool>) {
        self.collaborators.push(tool);
        self.catalog = registry::build_catalog(self.config.debug_enabled, &self.collaborators);
    }

    pub fn factory(&self) -> &dyn StoryRuntimeFactory {
        self.factory.as_ref()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn debug(&self) -> &DebugEngine {
        &self.debug
    }

    pub fn catalog(&self) -> &[ToolDef] {
        &self.catalog
    }

    pub fn collaborator(&self, name: &str) -> Option<&dyn CollaboratorTool> {
        self.collaborators
            .iter()
            .find(|c| c.definition().name == name)
            .map(|c| c.as_ref())
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn debug_enabled(&self) -> bool {
        self.config.debug_enabled
    }

    pub fn default_max_steps(&self) -> u64 {
        self.config.default_max_steps
    }

    /// Serve the protocol over HTTP (SSE + direct) on the given listener
    pub async fn run_http(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        transport::http::serve(self, listener).await
    }
}
