use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use callflow_core::config::Config;
use callflow_gateway::GatewayState;
use callflow_gateway::api::HealthReport;
use callflow_pipeline::CallPipeline;
use callflow_providers::ProviderSet;

mod logging;

#[derive(Parser)]
#[command(
    name = "callflow",
    about = "Voice call pipeline: speech-to-text, language model reply, text-to-speech",
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
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one audio file through the pipeline
    Call {
        /// Recorded caller audio
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the synthesized reply
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Probe every configured provider
    Health,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (secrets redacted)
    Show,
    /// Get a specific config value by dotted path
    Get { key: String },
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let config_path = cli
        .config
        .as_deref()
        .map(Config::expand_path)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    logging::init(&config.logging(), cli.verbose);

    match cli.command {
        Commands::Serve { port } => serve(config, port).await?,
        Commands::Call { input, output } => call(&config, &input, &output).await?,
        Commands::Health => {
            if !health(&config).await? {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("Config: {}", config_path.display());
                let mut json = serde_json::to_value(&config)?;
                redact_secrets(&mut json);
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", render_config_value(&key, value)?),
                None => anyhow::bail!("'{key}' is not set"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("Configuration has {} error(s)", errors.len());
                }
                println!("Configuration OK ({})", config_path.display());
            }
        },
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> anyhow::Result<CallPipeline> {
    let providers = ProviderSet::from_config(config).context("Failed to configure providers")?;
    Ok(CallPipeline::from_providers(providers))
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let (warnings, errors) = config.validate();
    for w in &warnings {
        tracing::warn!("{w}");
    }
    if !errors.is_empty() {
        anyhow::bail!("Invalid configuration: {}", errors.join("; "));
    }

    let pipeline = build_pipeline(&config)?;
    let port = port.unwrap_or_else(|| config.server_port());

    let state = GatewayState::new(Arc::new(config), pipeline);
    #[cfg(feature = "metrics")]
    let state = state.with_metrics(callflow_gateway::metrics::install_prometheus_recorder()?);

    tracing::info!("Starting Callflow gateway on port {port}");
    callflow_gateway::start_gateway(Arc::new(state), port).await
}

async fn call(config: &Config, input: &Path, output: &Path) -> anyhow::Result<()> {
    let audio = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let pipeline = build_pipeline(config)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let speech = pipeline
        .handle_call_cancellable(Bytes::from(audio), &cancel)
        .await?;

    tokio::fs::write(output, &speech)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {} bytes of {} to {}",
        speech.len(),
        pipeline.media_type(),
        output.display()
    );
    Ok(())
}

/// Print the aggregate health report. Returns whether every provider is up.
async fn health(config: &Config) -> anyhow::Result<bool> {
    let pipeline = build_pipeline(config)?;
    let providers = pipeline.health_check().await;
    let report = HealthReport {
        status: providers.status(),
        providers,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(providers.is_healthy())
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "***".to_string()
    } else {
        format!("{visible}***")
    }
}

/// Replace every `api_key` string in a config tree with a masked value.
fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                match v {
                    Value::String(s) if key == "api_key" => *s = mask(s),
                    other => redact_secrets(other),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

/// Format a `config get` result with every secret in it masked.
fn render_config_value(key: &str, value: Value) -> anyhow::Result<String> {
    match value {
        Value::String(s) if key.rsplit('.').next() == Some("api_key") => Ok(mask(&s)),
        mut other => {
            redact_secrets(&mut other);
            Ok(serde_json::to_string_pretty(&other)?)
        }
    }
}
