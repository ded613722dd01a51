// src/eval/value.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// An executable command produced by a rule, not yet spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program followed by its arguments.
    pub arguments: Vec<String>,
    /// Overrides the configured working directory when set.
    pub working_directory: Option<PathBuf>,
}

impl CommandLine {
    /// A command run in the working directory of the session.
    pub fn new(arguments: Vec<String>) -> Self {
        Self {
            arguments,
            working_directory: None,
        }
    }

    /// Runs the command in `dir` instead.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted = shlex::try_join(self.arguments.iter().map(String::as_str))
            .unwrap_or_else(|_| self.arguments.join(" "));
        write!(f, "[{}]", quoted)
    }
}

/// A dynamically typed value flowing through expressions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Command(CommandLine),
}

impl Value {
    /// Name of the type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Command(_) => "command",
        }
    }

    /// The boolean inside, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string inside, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Emptiness as understood by the `isEmpty` family.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Str(s) => s.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Map(m) => m.is_empty(),
            Self::Command(c) => c.arguments.is_empty(),
            Self::Bool(_) | Self::Int(_) => false,
        }
    }

    /// Whether the value renders as whitespace only.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Str(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Recursively flattens nested lists into a single sequence.
    pub fn flatten(self) -> Vec<Value> {
        match self {
            Self::List(items) => items.into_iter().flat_map(Value::flatten).collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Self::Command(c) => write!(f, "{}", c),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<CommandLine> for Value {
    fn from(c: CommandLine) -> Self {
        Self::Command(c)
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(yaml: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Y;
        match yaml {
            Y::Null => Self::Null,
            Y::Bool(b) => Self::Bool(b),
            Y::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Str(n.to_string()),
            },
            Y::String(s) => Self::Str(s),
            Y::Sequence(items) => Self::List(items.into_iter().map(Value::from).collect()),
            Y::Mapping(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(k), Value::from(v)))
                    .collect(),
            ),
            Y::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => Value::from(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_nested_lists() {
        let nested = Value::List(vec![
            Value::from("a"),
            Value::List(vec![Value::from("b"), Value::List(vec![Value::from(true)])]),
        ]);
        assert_eq!(
            nested.flatten(),
            vec![Value::from("a"), Value::from("b"), Value::from(true)]
        );
    }

    #[test]
    fn blank_and_empty() {
        assert!(Value::from("   ").is_blank());
        assert!(!Value::from("   ").is_empty());
        assert!(Value::Null.is_blank());
        assert!(!Value::from(false).is_blank());
    }

    #[test]
    fn command_display_quotes_arguments() {
        let cmd = CommandLine::new(vec!["pdflatex".into(), "my file.tex".into()]);
        assert_eq!(cmd.to_string(), "[pdflatex 'my file.tex']");
    }

    #[test]
    fn yaml_values_convert() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("{ shell: yes, passes: 2, files: [a.tex, b.tex] }").unwrap();
        let Value::Map(map) = Value::from(yaml) else {
            panic!("expected a map");
        };
        assert_eq!(map.get("shell"), Some(&Value::from("yes")));
        assert_eq!(map.get("passes"), Some(&Value::Int(2)));
        assert_eq!(
            map.get("files"),
            Some(&Value::List(vec![Value::from("a.tex"), Value::from("b.tex")]))
        );
    }
}
