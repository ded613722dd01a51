// src/core/binder.rs

use crate::constants::REFERENCE_KEY;
use crate::core::error::AraraError;
use crate::eval::{EvalError, Evaluator, ExecutionContext, Runtime, Value};
use crate::models::{Directive, Rule};
use log::trace;
use std::collections::BTreeSet;

/// Binds the parameters of `directive` to the arguments declared by `rule`.
///
/// Unknown parameters are rejected before anything is evaluated. For each
/// declared argument, in order: a supplied value goes through the `flag`
/// template, an absent one through `default`, and an argument with neither
/// binds to the empty string. `reference` is always bound verbatim.
pub fn bind(
    rule: &Rule,
    directive: &Directive,
    evaluator: &dyn Evaluator,
    runtime: &mut Runtime<'_>,
) -> Result<ExecutionContext, AraraError> {
    let declared: BTreeSet<&str> = rule
        .arguments
        .iter()
        .map(|a| a.identifier.as_str())
        .collect();
    let unknown: Vec<String> = directive
        .parameters
        .keys()
        .filter(|key| key.as_str() != REFERENCE_KEY && !declared.contains(key.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(AraraError::UnknownArgument { keys: unknown });
    }

    let scope = argument_scope(directive);
    let mut bound = ExecutionContext::new();
    bound.insert(
        REFERENCE_KEY,
        directive.reference().cloned().unwrap_or_default(),
    );

    for argument in &rule.arguments {
        let supplied = directive.parameters.contains_key(&argument.identifier);
        if argument.required && !supplied {
            return Err(AraraError::MissingRequiredArgument {
                identifier: argument.identifier.clone(),
            });
        }

        let value = match (supplied, &argument.flag, &argument.default) {
            (true, Some(flag), _) => evaluate(evaluator, flag, &scope, runtime)
                .map_err(|source| evaluation_error(&argument.identifier, "flag", source))?,
            (_, _, Some(default)) => {
                evaluate(evaluator, default, &scope, runtime)
                    .map_err(|source| evaluation_error(&argument.identifier, "default", source))?
            }
            _ => Value::from(""),
        };
        trace!("Bound argument '{}' to {:?}", argument.identifier, value);
        bound.insert(argument.identifier.clone(), value);
    }

    Ok(bound)
}

/// The context flags and defaults are evaluated in: every parameter under
/// its own name, all of them under `parameters`, and the reference.
fn argument_scope(directive: &Directive) -> ExecutionContext {
    let mut scope = ExecutionContext::from(directive.parameters.clone());
    scope.insert("parameters", Value::Map(directive.parameters.clone()));
    scope.insert(
        REFERENCE_KEY,
        directive.reference().cloned().unwrap_or_default(),
    );
    scope
}

fn evaluate(
    evaluator: &dyn Evaluator,
    template: &str,
    scope: &ExecutionContext,
    runtime: &mut Runtime<'_>,
) -> Result<Value, EvalError> {
    evaluator.render(template, scope, runtime)
}

fn evaluation_error(identifier: &str, kind: &'static str, source: EvalError) -> AraraError {
    AraraError::ArgumentEvaluation {
        identifier: identifier.to_string(),
        kind,
        source,
    }
}
