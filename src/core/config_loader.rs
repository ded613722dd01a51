//! # Config Loader
//!
//! Builds the [`ExecutionOptions`] for a run from three layers, lowest
//! precedence first: built-in defaults, the first configuration file found
//! in the working directory or the home directory, and command line flags.
use crate::{
    constants::{CONFIG_FILENAMES, REFERENCE_STORE_FILENAME, RULES_DIRNAME, TEX_COMMENT_PATTERN},
    models::{ExecutionMode, ExecutionOptions, FileType},
};
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// The on-disk configuration file.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Extra rule directories, searched before the built-in rules.
    pub paths: Vec<String>,
    /// Maximum iterations of looping directives.
    pub maxloops: Option<u32>,
    /// Process timeout in milliseconds.
    pub timeout: Option<u64>,
    /// Halt a file at its first failed command.
    pub halt_on_errors: Option<bool>,
    /// Show the output of the commands.
    pub verbose: Option<bool>,
    /// Only read directives from the file header.
    pub header: Option<bool>,
    /// Reference store path; an empty string disables persistence.
    pub reference: Option<String>,
    /// File types added to, or replacing, the defaults.
    pub filetypes: Vec<FileTypeEntry>,
}

/// One `filetypes` entry.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileTypeEntry {
    /// Extension, without the dot.
    pub extension: String,
    /// Comment prefix regex; required for extensions not known by default.
    pub pattern: Option<String>,
}

/// Settings given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// `--max-loops`.
    pub max_loops: Option<u32>,
    /// `--timeout`.
    pub timeout: Option<Duration>,
    /// `--verbose` / `--silent`.
    pub verbose: Option<bool>,
    /// `--dry-run`.
    pub dry_run: bool,
    /// `--header`.
    pub header: bool,
}

/// Returns the first configuration file found in `working_directory`, then
/// in the user's home directory.
pub fn find_config_file(working_directory: &Path) -> Option<PathBuf> {
    let mut search = vec![working_directory.to_path_buf()];
    search.extend(dirs::home_dir());
    first_config_in(&search)
}

fn first_config_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Reads and parses one configuration file.
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file '{}'", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse configuration file '{}'", path.display()))
}

/// Builds the options for a run rooted at `working_directory`.
pub fn resolve_options(working_directory: &Path, overrides: &Overrides) -> Result<ExecutionOptions> {
    let working_directory = dunce::canonicalize(working_directory).with_context(|| {
        format!(
            "The working directory '{}' is not accessible",
            working_directory.display()
        )
    })?;

    let config = match find_config_file(&working_directory) {
        Some(path) => {
            log::debug!("Using configuration file '{}'", path.display());
            load_config_file(&path)?
        }
        None => {
            log::debug!("No configuration file found, using defaults");
            ConfigFile::default()
        }
    };

    let mut options = apply_config(&config, &working_directory)?;
    options.rule_paths.extend(builtin_rules_dir());
    apply_overrides(&mut options, overrides);
    log::debug!("Resolved options: {:?}", options);
    Ok(options)
}

/// Defaults overlaid with a configuration file. Built-in rules are not added.
pub fn apply_config(config: &ConfigFile, working_directory: &Path) -> Result<ExecutionOptions> {
    let mut options = ExecutionOptions {
        working_directory: working_directory.to_path_buf(),
        reference: Some(working_directory.join(REFERENCE_STORE_FILENAME)),
        ..ExecutionOptions::default()
    };

    for raw in &config.paths {
        options
            .rule_paths
            .push(expand_path(raw, working_directory)?);
    }
    if let Some(max_loops) = config.maxloops {
        if max_loops == 0 {
            return Err(anyhow!("'maxloops' must be greater than zero"));
        }
        options.max_loops = max_loops;
    }
    if let Some(ms) = config.timeout {
        options.timeout = Some(Duration::from_millis(ms));
    }
    if let Some(halt) = config.halt_on_errors {
        options.halt_on_errors = halt;
    }
    if let Some(verbose) = config.verbose {
        options.verbose = verbose;
    }
    if let Some(header) = config.header {
        options.parse_only_header = header;
    }
    if let Some(reference) = &config.reference {
        options.reference = if reference.trim().is_empty() {
            None
        } else {
            Some(expand_path(reference, working_directory)?)
        };
    }

    for entry in &config.filetypes {
        merge_file_type(&mut options.file_types, entry)?;
    }
    Ok(options)
}

/// A configured type replaces the pattern of a known extension or adds a
/// new one. New extensions must bring their own pattern.
fn merge_file_type(file_types: &mut Vec<FileType>, entry: &FileTypeEntry) -> Result<()> {
    let existing = file_types
        .iter()
        .position(|t| t.extension == entry.extension);
    let pattern = match (&entry.pattern, existing) {
        (Some(pattern), _) => pattern.as_str(),
        (None, Some(_)) => TEX_COMMENT_PATTERN,
        (None, None) => {
            return Err(anyhow!(
                "The file type '{}' is not known and needs a pattern",
                entry.extension
            ));
        }
    };
    let file_type = FileType::new(entry.extension.clone(), pattern)
        .with_context(|| format!("Invalid pattern for file type '{}'", entry.extension))?;
    match existing.and_then(|index| file_types.get_mut(index)) {
        Some(slot) => *slot = file_type,
        None => file_types.push(file_type),
    }
    Ok(())
}

/// Applies the command line layer on top of `options`.
pub fn apply_overrides(options: &mut ExecutionOptions, overrides: &Overrides) {
    if let Some(max_loops) = overrides.max_loops {
        options.max_loops = max_loops;
    }
    if let Some(timeout) = overrides.timeout {
        options.timeout = Some(timeout);
    }
    if let Some(verbose) = overrides.verbose {
        options.verbose = verbose;
    }
    if overrides.dry_run {
        options.mode = ExecutionMode::DryRun;
    }
    if overrides.header {
        options.parse_only_header = true;
    }
}

/// Expands `~` and environment variables, then anchors relative paths at
/// the working directory.
fn expand_path(raw: &str, working_directory: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| anyhow!("Failed to expand path '{}': {}", raw, e))?;
    let path = PathBuf::from(expanded.into_owned());
    Ok(if path.is_absolute() {
        path
    } else {
        working_directory.join(path)
    })
}

/// The `rules` directory next to the executable, if there is one.
fn builtin_rules_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?.join(RULES_DIRNAME);
    dir.is_dir().then_some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_files_are_found_in_lookup_order() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(second.path().join("arararc.toml"), "").unwrap();
        fs::write(second.path().join(".araraconfig.toml"), "").unwrap();

        let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            first_config_in(&dirs),
            Some(second.path().join(".araraconfig.toml"))
        );
        assert_eq!(first_config_in(&dirs[..1]), None);
    }

    #[test]
    fn config_values_overlay_defaults() {
        let dir = tempdir().unwrap();
        let config: ConfigFile = toml::from_str(
            r#"
paths = ["rules", "/opt/arara/rules"]
maxloops = 5
timeout = 1500
halt_on_errors = false
header = true
reference = "build/arara.ref"
filetypes = [
    { extension = "tex", pattern = '^\s*%%\s+' },
    { extension = "Rnw", pattern = '^\s*%\s+' },
]
"#,
        )
        .unwrap();

        let options = apply_config(&config, dir.path()).unwrap();
        assert_eq!(options.max_loops, 5);
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert!(!options.halt_on_errors);
        assert!(options.parse_only_header);
        assert_eq!(
            options.rule_paths,
            vec![dir.path().join("rules"), PathBuf::from("/opt/arara/rules")]
        );
        assert_eq!(options.reference, Some(dir.path().join("build/arara.ref")));
        assert_eq!(options.file_types.len(), 6);
        assert_eq!(options.file_types[0].pattern.as_str(), r"^\s*%%\s+");
        assert_eq!(options.file_types[5].extension, "Rnw");
    }

    #[test]
    fn defaults_without_a_config_file() {
        let dir = tempdir().unwrap();
        let options = apply_config(&ConfigFile::default(), dir.path()).unwrap();
        assert_eq!(options.max_loops, 10);
        assert!(options.halt_on_errors);
        assert_eq!(options.reference, Some(dir.path().join("arara.reference")));
    }

    #[test]
    fn empty_reference_disables_persistence() {
        let dir = tempdir().unwrap();
        let config = ConfigFile {
            reference: Some(String::new()),
            ..ConfigFile::default()
        };
        assert_eq!(apply_config(&config, dir.path()).unwrap().reference, None);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let dir = tempdir().unwrap();
        let unknown_type = ConfigFile {
            filetypes: vec![FileTypeEntry {
                extension: "md".into(),
                pattern: None,
            }],
            ..ConfigFile::default()
        };
        assert!(apply_config(&unknown_type, dir.path()).is_err());
        assert!(toml::from_str::<ConfigFile>("colour = true").is_err());

        let zero_loops = ConfigFile {
            maxloops: Some(0),
            ..ConfigFile::default()
        };
        assert!(apply_config(&zero_loops, dir.path()).is_err());
    }

    #[test]
    fn command_line_wins() {
        let dir = tempdir().unwrap();
        let config = ConfigFile {
            maxloops: Some(5),
            verbose: Some(true),
            ..ConfigFile::default()
        };
        let mut options = apply_config(&config, dir.path()).unwrap();
        apply_overrides(
            &mut options,
            &Overrides {
                max_loops: Some(2),
                verbose: Some(false),
                dry_run: true,
                ..Overrides::default()
            },
        );
        assert_eq!(options.max_loops, 2);
        assert!(!options.verbose);
        assert!(options.is_dry_run());
    }
}
