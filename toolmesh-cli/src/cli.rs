use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "toolmesh", version)]
#[command(about = "toolmesh - MCP tool servers, tool aggregation and a tool-calling reasoning loop")]
pub struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. "info", "toolmesh_agent=debug")
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolSet {
    Math,
    Weather,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve a built-in tool set over MCP streamable HTTP
    Serve {
        #[arg(long, value_enum)]
        tools: ToolSet,
        /// Overrides TOOLMESH_HOST
        #[arg(long)]
        host: Option<String>,
        /// Overrides TOOLMESH_PORT; defaults to 8000 for math, 8001 for weather
        #[arg(long)]
        port: Option<u16>,
        /// Overrides TOOLMESH_MCP_PATH
        #[arg(long)]
        path: Option<String>,
        /// Reply with buffered JSON instead of an event stream
        #[arg(long)]
        json_response: bool,
    },
    /// List the merged catalog of the configured servers
    Tools {
        #[arg(long, default_value = "toolmesh.yaml")]
        config: PathBuf,
    },
    /// Run one query through the reasoning loop and print the answer
    Ask {
        #[arg(long, default_value = "toolmesh.yaml")]
        config: PathBuf,
        query: String,
    },
    /// Serve POST /invoke and GET /health
    Gateway {
        #[arg(long, default_value = "toolmesh.yaml")]
        config: PathBuf,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}
