// src/cli/mod.rs

use crate::core::config_loader::Overrides;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// arara: the cool TeX automation tool.
///
/// Reads the directives embedded in the comments of each FILE and runs the
/// matching rules.
#[derive(Parser, Debug)]
#[command(
    name = "arara",
    author,
    version,
    about,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    /// Write a debug log to `arara.log` in the working directory.
    #[arg(short, long)]
    pub log: bool,

    /// Show the output of the commands being run.
    #[arg(short, long, conflicts_with = "silent")]
    pub verbose: bool,

    /// Hide the output of the commands being run.
    #[arg(short, long)]
    pub silent: bool,

    /// Go through the motions without running any command.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Only read directives from the header of each file.
    #[arg(short = 'H', long)]
    pub header: bool,

    /// Kill commands running longer than this many milliseconds.
    #[arg(short, long, value_name = "MILLISECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Maximum number of iterations of `while`/`until` directives.
    #[arg(short, long, value_name = "NUMBER", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_loops: Option<u32>,

    /// Directory rules and commands run in.
    #[arg(short = 'd', long, value_name = "DIRECTORY", default_value = ".")]
    pub working_directory: PathBuf,

    /// Pass a property to the rules, readable as `getSession()['arg:<key>']`.
    #[arg(short = 'P', long = "call-property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// The files to process. The extension may be omitted.
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<String>,
}

impl Cli {
    /// Command line settings that override the configuration file.
    pub fn overrides(&self) -> Overrides {
        let verbose = match (self.verbose, self.silent) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Overrides {
            max_loops: self.max_loops,
            timeout: self.timeout.map(Duration::from_millis),
            verbose,
            dry_run: self.dry_run,
            header: self.header,
        }
    }

    /// The `-P` properties, later ones winning.
    pub fn properties(&self) -> BTreeMap<String, String> {
        self.properties.iter().cloned().collect()
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("'{}' is not a KEY=VALUE pair", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "arara", "-v", "-n", "-t", "2000", "-m", "3", "-P", "engine=xelatex", "doc",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.verbose, Some(true));
        assert!(overrides.dry_run);
        assert_eq!(overrides.timeout, Some(Duration::from_millis(2000)));
        assert_eq!(overrides.max_loops, Some(3));
        assert_eq!(cli.properties().get("engine").map(String::as_str), Some("xelatex"));
        assert_eq!(cli.files, vec!["doc".to_string()]);
    }

    #[test]
    fn invalid_invocations_are_rejected() {
        assert!(Cli::try_parse_from(["arara"]).is_err());
        assert!(Cli::try_parse_from(["arara", "-v", "-s", "doc"]).is_err());
        assert!(Cli::try_parse_from(["arara", "-m", "0", "doc"]).is_err());
        assert!(Cli::try_parse_from(["arara", "-P", "novalue", "doc"]).is_err());
    }

    #[test]
    fn silent_wins_over_configuration() {
        let cli = Cli::try_parse_from(["arara", "--silent", "doc.tex"]).unwrap();
        assert_eq!(cli.overrides().verbose, Some(false));
        assert_eq!(cli.working_directory, PathBuf::from("."));
    }
}
