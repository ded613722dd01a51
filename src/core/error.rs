// src/core/error.rs

use crate::eval::EvalError;
use crate::system::executor::ExecutionError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Everything that can abort the processing of a directive.
#[derive(Error, Debug)]
pub enum AraraError {
    #[error("I could not find a rule named '{identifier}' in the rule paths: {}", join_paths(.paths))]
    RuleNotFound {
        identifier: String,
        paths: Vec<PathBuf>,
    },

    #[error("I found unknown arguments for this rule: {}", .keys.join(", "))]
    UnknownArgument { keys: Vec<String> },

    #[error("The argument '{identifier}' is required but it was not provided.")]
    MissingRequiredArgument { identifier: String },

    #[error("Failed to evaluate the {kind} of argument '{identifier}': {source}")]
    ArgumentEvaluation {
        identifier: String,
        kind: &'static str,
        #[source]
        source: EvalError,
    },

    #[error("The directive '{identifier}' reached the maximum of {max_loops} loops.")]
    LoopBoundExceeded { identifier: String, max_loops: u32 },

    #[error("The exit expression must yield a boolean, found a {found}.")]
    NonBooleanExitCheck { found: String },

    #[error("A command must yield a boolean or a command, found a {found}.")]
    UnsupportedResultType { found: String },

    #[error("The rule file '{}' is invalid: {message}", .path.display())]
    RuleParse { path: PathBuf, message: String },

    #[error("The command {command} timed out after {} ms.", .timeout.as_millis())]
    ProcessTimeout { command: String, timeout: Duration },

    #[error("The command {command} could not be started: {message}")]
    ProcessSpawn { command: String, message: String },

    #[error("Invalid directive at line {line}: {message}")]
    DirectiveParse { line: usize, message: String },

    #[error(transparent)]
    Evaluation(#[from] EvalError),

    #[error("I could not find the file '{name}'.")]
    FileNotFound { name: String },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{identifier}] ({}) {source}", .location.display())]
    InRule {
        identifier: String,
        location: PathBuf,
        source: Box<AraraError>,
    },
}

impl AraraError {
    /// An I/O failure on `path`.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Prefixes the error with the rule identifier and the directory of the
    /// rule file. Resolution failures have no rule file yet and pass through.
    pub fn in_rule(self, identifier: &str, rule_file: &Path) -> Self {
        match self {
            Self::RuleNotFound { .. } | Self::InRule { .. } => self,
            other => Self::InRule {
                identifier: identifier.to_string(),
                location: rule_file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| rule_file.to_path_buf()),
                source: Box::new(other),
            },
        }
    }

    /// The error without any rule context.
    pub fn root(&self) -> &AraraError {
        match self {
            Self::InRule { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ExecutionError> for AraraError {
    fn from(error: ExecutionError) -> Self {
        match error {
            ExecutionError::TimedOut { command, timeout } => Self::ProcessTimeout { command, timeout },
            ExecutionError::CommandFailed(command, e) => Self::ProcessSpawn {
                command,
                message: e.to_string(),
            },
            ExecutionError::EmptyCommand => Self::ProcessSpawn {
                command: "[]".to_string(),
                message: "no program given".to_string(),
            },
            ExecutionError::InvalidUtf8Output { command, source } => Self::ProcessSpawn {
                command,
                message: source.to_string(),
            },
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}
