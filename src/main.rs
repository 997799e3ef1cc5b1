//! kegtap
//!
//! Command-line front end: resolves the keg for a project and edits the
//! layered configuration without disturbing hand-written comments.

use anyhow::{Result, bail};
use clap::Parser;
use kegtap::cli::parse::ParseReport;
use kegtap::cli::{AliasCommand, Cli, Command, ConfigCommand, MapCommand};
use kegtap::config::{Config, ConfigLoader, ConfigTier};
use kegtap::env::{Env, OsEnv};
use kegtap::locator::Target;
use std::fs::OpenOptions;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut env = OsEnv;

    // An explicit config file replaces the user layer
    if let Some(config_path) = &cli.config {
        env.set("KEGTAP_CONFIG", config_path);
    }

    let mut loader = ConfigLoader::load(&env, None)?;
    init_logging(cli.verbose, cli.log.as_deref(), loader.config())?;

    match cli.command {
        Command::Resolve { path, json } => {
            let path = path.unwrap_or_else(|| ".".to_string());
            let resolution = loader.resolve(&env, &path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
            } else {
                println!("{}\t{}", resolution.alias, resolution.target);
            }
        }
        Command::Parse(args) => {
            let report = ParseReport::new(&args.locator)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.to_text());
            }
        }
        Command::Config(ConfigCommand::Show { tier }) => match tier {
            Some(tier) => match loader.layer(tier) {
                Some(layer) => print!("{}", layer.document.to_yaml()),
                None => bail!("no {} layer is loaded", tier),
            },
            None => print!("{}", loader.merged().render()?),
        },
        Command::Config(ConfigCommand::Paths) => {
            for tier in ConfigTier::ALL {
                match loader.layer_path(tier) {
                    Some(path) if path.exists() => println!("{}\t{}", tier, path.display()),
                    Some(path) => println!("{}\t{} (missing)", tier, path.display()),
                    None if tier == ConfigTier::Defaults => println!("{}\t(embedded)", tier),
                    None => println!("{}\t(none)", tier),
                }
            }
        }
        Command::Alias(AliasCommand::List) => {
            let config = loader.config();
            for (name, target) in &config.kegs {
                let marker = if config.default_alias() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}\t{}", marker, name, target);
            }
        }
        Command::Alias(AliasCommand::Set {
            name,
            locator,
            tier,
        }) => {
            let target = Target::parse(&locator)?;
            let shown = target.to_string();
            loader.update_layer(tier, |config| {
                config.kegs.insert(name.clone(), target);
            })?;
            info!(%name, %tier, "alias set");
            println!("{} -> {} ({} layer)", name, shown, tier);
        }
        Command::Alias(AliasCommand::Rm { name, tier }) => {
            if !layer_config(&loader, tier)?.kegs.contains_key(&name) {
                bail!("alias {} is not set in the {} layer", name, tier);
            }
            loader.update_layer(tier, |config| config.kegs.remove(&name))?;
            println!("removed alias {} ({} layer)", name, tier);
        }
        Command::Default { name, tier } => {
            if !loader.config().kegs.contains_key(&name) {
                warn!(alias = %name, "default keg is not in the alias table yet");
            }
            loader.update_layer(tier, |config| config.default_keg = Some(name.clone()))?;
            println!("default keg is now {} ({} layer)", name, tier);
        }
        Command::Map(MapCommand::List) => {
            for rule in &loader.config().keg_map {
                match (rule.regex_pattern(), rule.prefix_str()) {
                    (Some(regex), _) => println!("{}\tregex  {}", rule.alias, regex),
                    (None, Some(prefix)) => println!("{}\tprefix {}", rule.alias, prefix),
                    (None, None) => println!("{}\t(no matcher)", rule.alias),
                }
            }
        }
        Command::Map(MapCommand::Add(args)) => {
            let rule = args.rule();
            loader.update_layer(args.tier, |config| config.upsert_rule(rule))?;
            println!("rule for {} saved ({} layer)", args.alias, args.tier);
        }
        Command::Map(MapCommand::Rm { alias, tier }) => {
            if layer_config(&loader, tier)?.rule(&alias).is_none() {
                bail!("no rule for {} in the {} layer", alias, tier);
            }
            loader.update_layer(tier, |config| config.keg_map.retain(|r| r.alias != alias))?;
            println!("removed rule for {} ({} layer)", alias, tier);
        }
    }

    Ok(())
}

/// Typed view of one loaded layer.
fn layer_config(loader: &ConfigLoader, tier: ConfigTier) -> Result<Config> {
    match loader.layer(tier) {
        Some(layer) => Ok(layer.config()?),
        None => Ok(Config::default()),
    }
}

/// Initialize logging based on --log/--verbose, then the config's logFile/logLevel.
///
/// `RUST_LOG`, when set, overrides the level.
fn init_logging(verbose: bool, log: Option<&str>, config: &Config) -> Result<()> {
    let level = log_level(verbose, config);
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    };

    let target = log
        .or(config.log_file.as_deref().filter(|s| !s.is_empty()))
        .unwrap_or("2");

    match target {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

/// `-v` means debug; otherwise the config's `logLevel`, falling back to info.
fn log_level(verbose: bool, config: &Config) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config
        .log_level
        .as_deref()
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_sources() {
        let mut config = Config::default();
        assert_eq!(log_level(false, &config), Level::INFO);

        config.log_level = Some("warn".into());
        assert_eq!(log_level(false, &config), Level::WARN);
        assert_eq!(log_level(true, &config), Level::DEBUG);

        config.log_level = Some("chatty".into());
        assert_eq!(log_level(false, &config), Level::INFO);
    }

    #[test]
    fn test_level_is_a_valid_filter_directive() {
        for level in [Level::TRACE, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR] {
            assert!(EnvFilter::try_new(level.as_str()).is_ok());
        }
    }
}
