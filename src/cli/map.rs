//! `map add` arguments.

use crate::config::{ConfigTier, KegMapRule};
use clap::{ArgGroup, Args};

/// Arguments for `map add`
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("matcher").required(true).args(["prefix", "regex"])))]
pub struct MapAddArgs {
    /// Alias the rule routes to
    pub alias: String,

    /// Match project paths starting with this prefix (`~` and `$VAR` allowed)
    #[arg(long, value_name = "PATH")]
    pub prefix: Option<String>,

    /// Match project paths with this regular expression
    #[arg(long, value_name = "PATTERN")]
    pub regex: Option<String>,

    /// Layer to write
    #[arg(long, default_value = "user")]
    pub tier: ConfigTier,
}

impl MapAddArgs {
    /// The rule to store.
    pub fn rule(&self) -> KegMapRule {
        KegMapRule {
            alias: self.alias.clone(),
            path_prefix: self.prefix.clone(),
            path_regex: self.regex.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command, MapCommand};
    use crate::config::KegMapRule;
    use clap::Parser;

    fn add_args(args: &[&str]) -> Result<KegMapRule, clap::Error> {
        let mut argv = vec!["kegtap", "map", "add"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv)?.command {
            Command::Map(MapCommand::Add(add)) => Ok(add.rule()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_prefix_rule() {
        assert_eq!(
            add_args(&["work", "--prefix", "~/work"]).unwrap(),
            KegMapRule::prefix("work", "~/work")
        );
    }

    #[test]
    fn test_regex_rule() {
        assert_eq!(
            add_args(&["tmp", "--regex", "^/tmp/"]).unwrap(),
            KegMapRule::regex("tmp", "^/tmp/")
        );
    }

    #[test]
    fn test_exactly_one_matcher() {
        assert!(add_args(&["work"]).is_err());
        assert!(add_args(&["work", "--prefix", "/a", "--regex", "^/a"]).is_err());
    }
}
