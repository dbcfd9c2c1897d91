use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

const DEFAULT_LOG_FILTER: &str = "callbridge=info";

#[derive(Parser)]
#[command(
    name = "callbridge",
    about = "callbridge: multiplexed RPC calls over a single transport bridge",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to a callbridge.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override [channel].host
    #[arg(long, global = true)]
    host: Option<String>,
    /// Override [channel].insecure
    #[arg(long, global = true)]
    insecure: bool,
    /// Request metadata as `key=value`; repeatable
    #[arg(short = 'H', long = "header", value_parser = commands::parse_header, global = true)]
    headers: Vec<(String, String)>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Echo one message with a unary call
    Unary { message: String },
    /// Echo each word of a message as its own response
    ServerStream { message: String },
    /// Send several messages, receive them joined
    ClientStream {
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Send several messages, receive each echoed as it arrives
    Bidi {
        #[arg(required = true)]
        messages: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref(), cli.host, cli.insecure)?;
    let filter = config
        .logging
        .filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(filter.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let metadata = commands::metadata(cli.headers);
    let echo = callbridge_echo::EchoClient::in_process(config);

    let result = match cli.command {
        Commands::Unary { message } => commands::echo::unary(&echo, &message, metadata).await,
        Commands::ServerStream { message } => {
            commands::echo::server_stream(&echo, &message, metadata).await
        }
        Commands::ClientStream { messages } => {
            commands::echo::client_stream(&echo, &messages, metadata).await
        }
        Commands::Bidi { messages } => commands::echo::bidi(&echo, &messages, metadata).await,
    };

    echo.client().shutdown().await;
    result
}
