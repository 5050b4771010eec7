pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

/// persona-relay: a persona chat relay between Telegram and hosted inference.
#[derive(Debug, Parser)]
#[command(name = "persona-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start Telegram polling (default when no subcommand is given).
    Serve,
    /// Send a single message through the relay and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Conversation key to use.
        #[arg(long, default_value_t = 0)]
        user: i64,
        /// Persona to switch to before the turn (neo, morpheus, trinity).
        #[arg(long)]
        mode: Option<String>,
        /// Output the outcome as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `PR_CONFIG` (or `config.toml`),
/// then apply `HF_*` model overrides from the environment. A missing file
/// yields the defaults.
pub fn load_config() -> anyhow::Result<(pr_domain::config::Config, String)> {
    let config_path = std::env::var("PR_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        pr_domain::config::Config::default()
    };
    config.apply_env_overrides();

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["persona-relay"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn run_flags() {
        let cli = Cli::try_parse_from([
            "persona-relay",
            "run",
            "hello there",
            "--user",
            "42",
            "--mode",
            "trinity",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Run {
                message,
                user,
                mode,
                json,
            }) => {
                assert_eq!(message, "hello there");
                assert_eq!(user, 42);
                assert_eq!(mode.as_deref(), Some("trinity"));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_subcommands() {
        let cli = Cli::try_parse_from(["persona-relay", "config", "show"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Show))));
    }
}
