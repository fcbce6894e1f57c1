use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tea_olive::build_info;
use tea_olive::check::{CheckFailure, CheckRequest, run_check};
use tea_olive::config::{Config, Settings};
use tea_olive::llm::{ProviderId, ProviderRegistry};
use tea_olive::server::{self, AppState};

#[derive(Parser)]
#[command(name = build_info::NAME, version = build_info::VERSION)]
#[command(about = "Check OpenAI, Claude and Gemini API keys")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Path to the YAML config file
        #[arg(short, long, default_value = "tea-olive.yaml")]
        config: PathBuf,

        /// Override the configured listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one prompt to a provider and print the result envelope
    Check {
        /// Provider to check (openai, claude, gemini)
        #[arg(long)]
        provider: ProviderId,

        /// Prompt to send
        #[arg(long)]
        prompt: String,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// System instruction override
        #[arg(long)]
        system: Option<String>,
    },

    /// List providers and whether their keys are configured
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid provider environment")?;
    let registry = ProviderRegistry::from_settings(&settings, reqwest::Client::new());

    match cli.command {
        Command::Serve { config, host, port } => {
            let mut config = Config::load(&config)
                .await
                .with_context(|| format!("failed to load {}", config.display()))?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let state = AppState {
                providers: registry,
                stream_idle_timeout: Duration::from_secs(config.server.idle_timeout_seconds),
            };
            server::serve(&config.server, state).await?;
        }
        Command::Check {
            provider,
            prompt,
            model,
            system,
        } => {
            let outcome = match CheckRequest::new(provider, prompt, model, system) {
                Ok(request) => run_check(&registry, request).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(envelope) => println!("{}", serde_json::to_string_pretty(&envelope)?),
                Err(e) => {
                    println!("{}", serde_json::to_string_pretty(&CheckFailure::new(&e))?);
                    std::process::exit(1);
                }
            }
        }
        Command::Providers => {
            for entry in registry.entries() {
                let state = if entry.configured {
                    "configured"
                } else {
                    "missing key"
                };
                println!(
                    "{:<8} {:<8} {:<32} {} ({})",
                    entry.profile.id,
                    entry.profile.label,
                    entry.profile.default_model,
                    state,
                    entry.profile.env_key
                );
            }
        }
    }

    Ok(())
}
