//! # Expression Evaluation
//!
//! Rules carry small expressions: argument flags and defaults, command
//! templates, exit checks and directive conditionals. The engine only ever
//! talks to the [`Evaluator`] trait; [`TemplateEvaluator`] is the stock
//! implementation.
//!
//! ## Modules
//!
//! - **`value`**: the dynamically typed [`Value`] and the [`CommandLine`] handle.
//! - **`parser`**: tokenizer and recursive descent parser for expressions.
//! - **`template`**: `@{ ... }` template rendering and the tree-walking interpreter.
//! - **`helpers`**: the static table of helper functions rules may call.

/// Helper table.
pub mod helpers;
/// Expression parser.
pub mod parser;
/// Template rendering.
pub mod template;
/// Runtime values.
pub mod value;

pub use template::TemplateEvaluator;
pub use value::{CommandLine, Value};

use crate::core::session::Session;
use crate::models::{ExecutionOptions, ProjectFile};
use std::collections::BTreeMap;
use thiserror::Error;

/// A fault raised while parsing or evaluating an expression.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Unknown variable '{0}'.")]
    UnknownIdentifier(String),
    #[error("Unknown function '{0}'.")]
    UnknownFunction(String),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Function '{function}' failed: {message}")]
    Helper { function: String, message: String },
    #[error("{0}")]
    Raised(String),
}

impl EvalError {
    pub(crate) fn helper(function: &str, message: impl Into<String>) -> Self {
        Self::Helper {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// Named values visible to an expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    values: BTreeMap<String, Value>,
}

impl ExecutionContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Builder form of [`ExecutionContext::insert`].
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// The value bound to `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether `key` is bound.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The bindings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl From<BTreeMap<String, Value>> for ExecutionContext {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

/// The mutable engine state an evaluation may touch through helper functions.
///
/// Passed explicitly down the interpreter, command runner and evaluator chain.
#[derive(Debug)]
pub struct Runtime<'a> {
    /// Session state helpers read and write.
    pub session: &'a mut Session,
    /// Options of the current run.
    pub options: &'a ExecutionOptions,
    /// The file being processed.
    pub file: &'a ProjectFile,
}

impl<'a> Runtime<'a> {
    /// Bundles the state an evaluation may touch.
    pub fn new(
        session: &'a mut Session,
        options: &'a ExecutionOptions,
        file: &'a ProjectFile,
    ) -> Self {
        Self {
            session,
            options,
            file,
        }
    }
}

/// The capability the engine needs from an expression language.
///
/// Implementations must surface any internal fault as a single error and be
/// deterministic for a given input, apart from the side effects of helpers.
pub trait Evaluator: std::fmt::Debug {
    /// Renders a template. A template made of exactly one `@{ ... }` block
    /// yields that block's typed value; anything else yields a string.
    fn render(
        &self,
        template: &str,
        context: &ExecutionContext,
        runtime: &mut Runtime<'_>,
    ) -> Result<Value, EvalError>;

    /// Evaluates a bare expression.
    fn evaluate(
        &self,
        expression: &str,
        context: &ExecutionContext,
        runtime: &mut Runtime<'_>,
    ) -> Result<Value, EvalError>;
}
