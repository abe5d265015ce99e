use eyre::{Result, WrapErr};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use toolmesh_agent::gateway::DEFAULT_DRAIN_TIMEOUT;
use toolmesh_agent::{AgentConfig, ChatCompletionsOracle, Gateway, ReasoningLoop, ToolAggregator};
use toolmesh_mcp::config::McpServerConfigBuilder;
use toolmesh_mcp::{McpServer, ResponseMode, ServerInfo, shutdown_signal};
use toolmesh_tools::ToolRegistry;
use toolmesh_tools::standard::{math, weather};
use tracing::info;

use crate::cli::ToolSet;

pub struct ServeArgs {
    pub tools: ToolSet,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub json_response: bool,
}

pub async fn serve(args: ServeArgs) -> Result<()> {
    let mut registry = ToolRegistry::new();
    let (name, default_port) = match args.tools {
        ToolSet::Math => {
            math::register(&mut registry)?;
            ("math", 8000)
        }
        ToolSet::Weather => {
            let provider = Arc::new(weather::StaticWeatherProvider::with_sample_data());
            weather::register(&mut registry, provider)?;
            ("weather", 8001)
        }
    };

    let mut builder = McpServerConfigBuilder::from_env()?;
    if std::env::var_os("TOOLMESH_PORT").is_none() {
        builder = builder.port(default_port);
    }
    if let Some(host) = args.host {
        builder = builder.host(host);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(path) = args.path {
        builder = builder.path(path);
    }
    if args.json_response {
        builder = builder.response_mode(ResponseMode::Json);
    }
    let config = builder.build()?;

    let server = McpServer::new(Arc::new(registry), config).with_info(ServerInfo::new(name));
    let listener = server
        .bind()
        .await
        .wrap_err_with(|| format!("failed to bind {}", server.config().bind_address()))?;
    server.serve(listener, shutdown_signal()).await?;
    Ok(())
}

pub async fn tools(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let aggregator_config = config.aggregator_config();
    let aggregator = ToolAggregator::connect(config.servers, aggregator_config).await?;
    let catalog = aggregator.catalog();

    for entry in catalog.entries() {
        println!("{:<12} {}", entry.endpoint.name, entry.descriptor.signature());
        if !entry.descriptor.description.is_empty() {
            println!("{:<12}   {}", "", entry.descriptor.description);
        }
    }
    for unavailable in catalog.unavailable_endpoints() {
        println!(
            "unavailable: {} ({})",
            unavailable.endpoint, unavailable.reason
        );
    }
    Ok(())
}

pub async fn ask(config_path: &Path, query: &str) -> Result<()> {
    let gateway = build_gateway(config_path).await?;
    let answer = gateway.invoke(query).await?;
    println!("{}", answer);
    Ok(())
}

pub async fn gateway(config_path: &Path, host: &str, port: u16) -> Result<()> {
    let gateway = build_gateway(config_path).await?;
    let address = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("failed to bind {}", address))?;
    gateway
        .serve(listener, shutdown_signal(), DEFAULT_DRAIN_TIMEOUT)
        .await?;
    Ok(())
}

fn load_config(path: &Path) -> Result<AgentConfig> {
    AgentConfig::from_file(path)
        .wrap_err_with(|| format!("failed to load {}", path.display()))
}

async fn build_gateway(config_path: &Path) -> Result<Gateway> {
    let config = load_config(config_path)?;
    let aggregator = ToolAggregator::connect(config.servers.clone(), config.aggregator_config()).await?;
    let oracle = ChatCompletionsOracle::new(config.oracle_config()?)?;
    info!(
        model = %oracle.config().model,
        tools = aggregator.catalog().len(),
        "Reasoning loop ready"
    );

    let reasoning =
        ReasoningLoop::new(Arc::new(aggregator), Arc::new(oracle)).with_config(config.loop_config());
    Ok(Gateway::new(Arc::new(reasoning)))
}
