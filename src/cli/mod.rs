//! CLI command definitions for kegtap
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod map;
pub mod parse;

use crate::config::ConfigTier;
use clap::{Parser, Subcommand};
use map::MapAddArgs;
use parse::ParseArgs;

/// Locate kegs and manage layered kegtap configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Explicit user config file (sets KEGTAP_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the keg for a project directory (default: the current directory)
    Resolve {
        #[arg(value_name = "PATH")]
        path: Option<String>,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a locator and show how it was classified
    Parse(ParseArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage the alias table
    #[command(subcommand)]
    Alias(AliasCommand),

    /// Set the default keg alias
    Default {
        name: String,

        /// Layer to write
        #[arg(long, default_value = "user")]
        tier: ConfigTier,
    },

    /// Manage path routing rules
    #[command(subcommand)]
    Map(MapCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration, or one layer with --tier
    Show {
        #[arg(long)]
        tier: Option<ConfigTier>,
    },

    /// Print the file behind each layer
    Paths,
}

#[derive(Subcommand, Debug)]
pub enum AliasCommand {
    /// List aliases from the merged configuration
    List,

    /// Bind an alias to a locator
    Set {
        name: String,
        locator: String,

        /// Layer to write
        #[arg(long, default_value = "user")]
        tier: ConfigTier,
    },

    /// Remove an alias
    Rm {
        name: String,

        /// Layer to write
        #[arg(long, default_value = "user")]
        tier: ConfigTier,
    },
}

#[derive(Subcommand, Debug)]
pub enum MapCommand {
    /// List routing rules from the merged configuration, in precedence order
    List,

    /// Add a rule, replacing any existing rule for the same alias in place
    Add(MapAddArgs),

    /// Remove the rule for an alias
    Rm {
        alias: String,

        /// Layer to write
        #[arg(long, default_value = "user")]
        tier: ConfigTier,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tier_defaults_to_user() {
        let cli = Cli::parse_from(["kegtap", "alias", "set", "notes", "~/notes"]);
        match cli.command {
            Command::Alias(AliasCommand::Set { name, locator, tier }) => {
                assert_eq!(name, "notes");
                assert_eq!(locator, "~/notes");
                assert_eq!(tier, ConfigTier::User);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["kegtap", "resolve", "/tmp/x", "-v", "--log", "0"]);
        assert!(cli.verbose);
        assert_eq!(cli.log.as_deref(), Some("0"));
    }

    #[test]
    fn test_bad_tier_is_rejected() {
        assert!(Cli::try_parse_from(["kegtap", "default", "notes", "--tier", "global"]).is_err());
    }
}
