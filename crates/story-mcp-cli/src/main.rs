//! story-mcp server binary
//!
//! Serves the MCP protocol over HTTP (SSE stream + direct requests) with
//! the scripted story runtime as the backing interpreter.

use anyhow::Result;
use clap::Parser;
use scripted_story::ScriptedStoryFactory;
use std::sync::Arc;
use story_mcp_server::{ServerConfig, StoryServer};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "story-mcp-server", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "STORY_MCP_BIND", default_value = "127.0.0.1:3456")]
    bind: String,

    /// Execution trace entries kept per debug session
    #[arg(long, env = "STORY_MCP_TRACE_LIMIT", default_value_t = 256)]
    trace_limit: usize,

    /// Default step cap for debug_continue
    #[arg(long, env = "STORY_MCP_MAX_STEPS", default_value_t = 64)]
    max_steps: u64,

    /// Disable the debug tool group
    #[arg(long)]
    no_debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ServerConfig {
        debug_enabled: !args.no_debug,
        trace_limit: args.trace_limit,
        default_max_steps: args.max_steps,
        ..ServerConfig::default()
    };

    let factory = Arc::new(ScriptedStoryFactory::new());
    let server = Arc::new(StoryServer::new(factory, config));

    let listener = TcpListener::bind(&args.bind).await?;
    info!(bind = %args.bind, "story-mcp server starting");

    server.run_http(listener).await?;
    Ok(())
}
