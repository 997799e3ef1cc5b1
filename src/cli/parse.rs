//! `parse` subcommand: show how a locator is classified.

use crate::error::Result;
use crate::locator::{Scheme, Target, classify};
use clap::Args;
use serde::Serialize;

/// Arguments for the parse subcommand
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Locator to parse, e.g. `~/notes`, `example.com/team/kegs` or `hub:alice/notes`
    pub locator: String,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// What the parser made of a locator.
#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub input: String,
    /// Name of the classifier rule that claimed the input.
    pub rule: &'static str,
    pub scheme: Scheme,
    pub canonical: String,
    pub target: Target,
}

impl ParseReport {
    pub fn new(input: &str) -> Result<Self> {
        let target = Target::parse(input)?;
        Ok(Self {
            input: input.to_string(),
            rule: classify(input.trim()).name,
            scheme: target.scheme(),
            canonical: target.to_string(),
            target,
        })
    }

    /// Plain-text rendering for the terminal.
    pub fn to_text(&self) -> String {
        format!(
            "scheme:    {}\ncanonical: {}\nrule:      {}\n",
            self.scheme, self.canonical, self.rule
        )
    }
}
