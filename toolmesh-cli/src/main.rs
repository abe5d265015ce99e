use clap::Parser;
use eyre::Result;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, LogFormat};
use commands::ServeArgs;

fn init_tracing(level: &str, format: LogFormat) {
    // RUST_LOG wins over --log-level
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Serve {
            tools,
            host,
            port,
            path,
            json_response,
        } => {
            commands::serve(ServeArgs {
                tools,
                host,
                port,
                path,
                json_response,
            })
            .await
        }
        Commands::Tools { config } => commands::tools(&config).await,
        Commands::Ask { config, query } => commands::ask(&config, &query).await,
        Commands::Gateway { config, host, port } => commands::gateway(&config, &host, port).await,
    }
}
