pub mod config;

use clap::{Parser, Subcommand};

/// TicketPilot, an AI support-ticket conversation orchestrator.
#[derive(Debug, Parser)]
#[command(name = "ticketpilot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
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

/// Load the configuration from the path specified by `TP_CONFIG` (or
/// `config.toml` by default). A missing file yields the defaults.
pub fn load_config() -> anyhow::Result<(tp_domain::config::Config, String)> {
    let config_path = std::env::var("TP_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = config::read(std::path::Path::new(&config_path))?;
    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["ticketpilot"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::parse_from(["ticketpilot", "config", "validate"]);
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Validate))));
        let cli = Cli::parse_from(["ticketpilot", "config", "show"]);
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Show))));
    }
}
