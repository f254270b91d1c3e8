use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pixelhub",
    about = "Real-time collaborative pixel canvas server",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the canvas server
    Serve {
        /// Port to listen on (default: 8080)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show resolved settings
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pixelhub.json"));

    let mut config = pixelhub_core::config::Config::load(&config_path)?;

    match cli.command {
        Commands::Serve { port } => {
            let (warnings, errors) = config.validate();
            for warning in warnings {
                tracing::warn!("{warning}");
            }
            if !errors.is_empty() {
                for error in &errors {
                    tracing::error!("{error}");
                }
                anyhow::bail!("Invalid configuration");
            }

            let port = port.unwrap_or_else(|| config.server_port());
            let (width, height) = config.canvas_size();
            tracing::info!(
                width,
                height,
                slots = config.pool_slots(),
                "Starting pixelhub gateway on port {port}"
            );

            let state = Arc::new(pixelhub_gateway::GatewayState::new(Arc::new(config)));
            pixelhub_gateway::start_gateway(state, port).await?;
        }
        Commands::Status => {
            let (width, height) = config.canvas_size();
            println!("pixelhub v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Canvas: {width}x{height}");
            println!("Slots: {}", config.pool_slots());
            println!("Queue depth: {}", config.queue_depth());
            println!("Port: {}", config.server_port());
            println!("Selections: {}", config.selections_path().display());
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{value}"),
                None => println!("null"),
            },
            ConfigAction::Set { key, value } => {
                let value = serde_json::from_str(&value)
                    .unwrap_or(serde_json::Value::String(value));
                config.set_path(&key, value)?;
                config.save(&config_path)?;
                println!("Updated {key}");
            }
        },
    }

    Ok(())
}
