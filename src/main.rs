use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::info;

use waav_call::{CallConfig, HttpSessionClient, SessionProvider, SessionRequest};

/// WaaV Call - realtime voice call toolkit
#[derive(Parser, Debug)]
#[command(name = "waav-call")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate configuration, then print it
    CheckConfig,

    /// Mint an ephemeral session token against the configured endpoint
    Token {
        /// Instructions sent with the session request
        #[arg(short = 'i', long = "instructions", default_value = "")]
        instructions: String,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<CallConfig> {
    match path {
        Some(config_path) => {
            info!("Loading configuration from {}", config_path.display());
            CallConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))
        }
        None => {
            let config = CallConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
            config.validate().map_err(|e| anyhow!(e.to_string()))?;
            Ok(config)
        }
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(6).collect();
    format!("{visible}…")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::CheckConfig => {
            let rendered = serde_yaml::to_string(&CallConfig {
                session_api_key: config.session_api_key.as_ref().map(|_| "<set>".to_string()),
                ..config
            })?;
            println!("Configuration is valid:\n{rendered}");
        }
        Commands::Token { instructions } => {
            let client = HttpSessionClient::new(&config)?;
            let request = SessionRequest::from_config(&config, instructions, Vec::new());
            let token = client.create_session(&request).await?;
            println!(
                "Session minted at {}: secret {} expires at {}",
                client.endpoint(),
                mask(&token.client_secret),
                token.expires_at
            );
        }
    }

    Ok(())
}
