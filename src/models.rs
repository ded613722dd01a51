// src/models.rs

use crate::{constants, eval::Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// --- DIRECTIVES ---

/// The looping/guard discipline attached to a directive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DirectiveConditional {
    /// Run the commands exactly once.
    #[default]
    None,
    /// Run once if the expression holds before the first attempt.
    If(String),
    /// Run once if the expression does not hold before the first attempt.
    Unless(String),
    /// Run, then repeat while the expression holds.
    While(String),
    /// Run, then repeat until the expression holds.
    Until(String),
}

impl DirectiveConditional {
    /// Builds a conditional from its keyword as written in a directive.
    pub fn from_keyword(keyword: &str, expression: String) -> Option<Self> {
        match keyword {
            "if" => Some(Self::If(expression)),
            "unless" => Some(Self::Unless(expression)),
            "while" => Some(Self::While(expression)),
            "until" => Some(Self::Until(expression)),
            _ => None,
        }
    }
}

impl fmt::Display for DirectiveConditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::If(e) => write!(f, "if {}", e),
            Self::Unless(e) => write!(f, "unless {}", e),
            Self::While(e) => write!(f, "while {}", e),
            Self::Until(e) => write!(f, "until {}", e),
        }
    }
}

/// One build instruction extracted from a source file.
///
/// `parameters` always carries the `reference` key, the absolute path of the
/// file the directive applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Rule to invoke.
    pub identifier: String,
    /// Directive parameters, `reference` included.
    pub parameters: BTreeMap<String, Value>,
    /// How the directive repeats or is guarded.
    pub conditional: DirectiveConditional,
    /// Source lines the directive was read from.
    pub line_numbers: Vec<usize>,
}

impl Directive {
    /// The file this directive applies to, if the reference was injected.
    pub fn reference(&self) -> Option<&Value> {
        self.parameters.get(constants::REFERENCE_KEY)
    }
}

// --- RULES (what is read from a rule file) ---

/// A reusable definition of arguments and commands a directive can invoke.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Must match the file name the rule was resolved from.
    pub identifier: String,
    /// Human label used when reporting; falls back to the identifier.
    pub name: Option<String>,
    /// People to credit in dry-run reports.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Arguments a directive may supply, in binding order.
    #[serde(default)]
    pub arguments: Vec<RuleArgument>,
    /// Commands run in order on each iteration.
    #[serde(default)]
    pub commands: Vec<RuleCommand>,
}

impl Rule {
    /// The label to report the rule under.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.identifier)
    }
}

/// A named input of a rule.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RuleArgument {
    /// Unique name.
    pub identifier: String,
    /// A directive must supply this argument.
    #[serde(default)]
    pub required: bool,
    /// Evaluated only when the directive supplies this argument.
    pub flag: Option<String>,
    /// Evaluated only when the directive does not supply this argument.
    pub default: Option<String>,
}

/// One command template of a rule.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RuleCommand {
    /// Task label shown when the command runs.
    pub name: Option<String>,
    /// Template rendering to booleans and command lines.
    pub command: String,
    /// Success check over the exit code; `value == 0` when absent.
    pub exit: Option<String>,
}

// --- EXECUTION ---

/// Terminal status of a directive, a file or a whole run.
///
/// Variants are ordered by severity so statuses aggregate with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ExecutionStatus {
    #[default]
    Processing,
    ExternalCallFailed,
    CaughtException,
}

impl ExecutionStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Processing => 0,
            Self::ExternalCallFailed => 1,
            Self::CaughtException => 2,
        }
    }

    /// Maps a custom completion code, as stored by `halt`, to a status.
    pub fn from_halt_code(code: i64) -> Self {
        if code != 0 {
            Self::ExternalCallFailed
        } else {
            Self::Processing
        }
    }
}

/// Whether processes are actually spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Normal,
    /// Go through all the motions without spawning any process.
    DryRun,
}

/// A file type: an extension and the regex matching its comment prefix.
#[derive(Debug, Clone)]
pub struct FileType {
    /// Extension, without the dot.
    pub extension: String,
    /// Matches the comment prefix of a line.
    pub pattern: Regex,
}

impl FileType {
    /// Builds a file type, compiling its comment pattern.
    pub fn new(extension: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            extension: extension.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// The TeX-like file types recognized out of the box.
    pub fn defaults() -> Vec<Self> {
        constants::DEFAULT_FILE_TYPES
            .iter()
            .filter_map(|ext| Self::new(*ext, constants::TEX_COMMENT_PATTERN).ok())
            .collect()
    }
}

impl PartialEq for FileType {
    fn eq(&self, other: &Self) -> bool {
        self.extension == other.extension && self.pattern.as_str() == other.pattern.as_str()
    }
}

/// A file scheduled for processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Type the file was resolved with.
    pub file_type: FileType,
}

impl ProjectFile {
    /// A file to process, of type `file_type`.
    pub fn new(path: impl Into<PathBuf>, file_type: FileType) -> Self {
        Self {
            path: path.into(),
            file_type,
        }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bare file name, used for display.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Engine configuration, owned by the caller.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Bound on iterations of `while`/`until` directives.
    pub max_loops: u32,
    /// Kill processes running longer than this.
    pub timeout: Option<Duration>,
    /// Halt a file at its first failed command.
    pub halt_on_errors: bool,
    /// Normal or dry run.
    pub mode: ExecutionMode,
    /// Show process output instead of discarding it.
    pub verbose: bool,
    /// Stop reading directives at the first non-comment line.
    pub parse_only_header: bool,
    /// Rule directories, searched in order.
    pub rule_paths: Vec<PathBuf>,
    /// Directory commands run in, unless they set their own.
    pub working_directory: PathBuf,
    /// Where the change-detection cache persists; `None` keeps it in memory.
    pub reference: Option<PathBuf>,
    /// Known file types, in resolution order.
    pub file_types: Vec<FileType>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_loops: constants::DEFAULT_MAX_LOOPS,
            timeout: None,
            halt_on_errors: true,
            mode: ExecutionMode::Normal,
            verbose: false,
            parse_only_header: false,
            rule_paths: Vec::new(),
            working_directory: PathBuf::from("."),
            reference: None,
            file_types: FileType::defaults(),
        }
    }
}

impl ExecutionOptions {
    /// Whether processes are only reported.
    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecutionMode::DryRun
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_severity_ordering() {
        assert!(ExecutionStatus::Processing < ExecutionStatus::ExternalCallFailed);
        assert!(ExecutionStatus::ExternalCallFailed < ExecutionStatus::CaughtException);
        assert_eq!(
            ExecutionStatus::Processing.max(ExecutionStatus::ExternalCallFailed),
            ExecutionStatus::ExternalCallFailed
        );
    }

    #[test]
    fn halt_codes_map_to_statuses() {
        assert_eq!(ExecutionStatus::from_halt_code(0).exit_code(), 0);
        assert_eq!(ExecutionStatus::from_halt_code(3).exit_code(), 1);
        assert_eq!(ExecutionStatus::from_halt_code(-1).exit_code(), 1);
    }

    #[test]
    fn conditional_keywords() {
        assert_eq!(
            DirectiveConditional::from_keyword("until", "x".into()),
            Some(DirectiveConditional::Until("x".into()))
        );
        assert_eq!(DirectiveConditional::from_keyword("when", "x".into()), None);
        assert_eq!(DirectiveConditional::If("a".into()).to_string(), "if a");
    }

    #[test]
    fn default_file_types_match_tex_comments() {
        let types = FileType::defaults();
        assert_eq!(types.len(), 5);
        assert!(types.iter().all(|t| t.pattern.is_match("% arara: pdflatex")));
    }
}
