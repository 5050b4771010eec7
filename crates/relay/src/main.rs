use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pr_domain::config::{Config, LogFormat, ObservabilityConfig};
use pr_relay::bootstrap;
use pr_relay::cli::{Cli, Command, ConfigCommand};
use pr_relay::telegram::{self, BotApi, Dispatcher, TelegramClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            let (config, config_path) = pr_relay::cli::load_config()?;
            init_tracing(&config.observability);
            run_server(Arc::new(config), config_path).await
        }
        Some(Command::Run {
            message,
            user,
            mode,
            json,
        }) => {
            init_cli_tracing();
            let (config, _) = pr_relay::cli::load_config()?;
            pr_relay::cli::run::run(Arc::new(config), message, user, mode, json).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = pr_relay::cli::load_config()?;
            let valid = pr_relay::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = pr_relay::cli::load_config()?;
            pr_relay::cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("persona-relay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured tracing for the `serve` command. `RUST_LOG`
/// overrides the configured filter.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.filter));

    match obs.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init(),
    }
}

/// Initialize compact stderr-only tracing for CLI one-shot commands.
///
/// Defaults to `warn` level so diagnostic output does not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Run the Telegram relay until ctrl-c.
async fn run_server(config: Arc<Config>, config_path: String) -> anyhow::Result<()> {
    tracing::info!(config_path = %config_path, "persona-relay starting");

    let state = bootstrap::build_app_state(config.clone())?;
    bootstrap::spawn_background_tasks(&state);

    let client = Arc::new(
        TelegramClient::from_config(&config.telegram).context("configuring Telegram client")?,
    );
    let me = client.get_me().await.context("checking Telegram bot token")?;
    tracing::info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or(""),
        "telegram bot authenticated"
    );

    let api: Arc<dyn BotApi> = client.clone();
    let dispatcher = Arc::new(Dispatcher::new(
        api,
        state.processor.clone(),
        config.replies.clone(),
    ));

    let shutdown = Arc::new(tokio::sync::Notify::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
            shutdown.notify_one();
        });
    }

    telegram::run_polling(client, dispatcher, config.telegram.poll_timeout_secs, shutdown).await;

    tracing::info!(users = state.processor.store().len(), "persona-relay stopped");
    Ok(())
}
