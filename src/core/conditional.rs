// src/core/conditional.rs

use crate::core::error::AraraError;
use crate::eval::{EvalError, Evaluator, ExecutionContext, Runtime};
use crate::models::DirectiveConditional;
use log::debug;

/// Decides whether a directive runs at all.
///
/// Only `if` and `unless` look at their expression here; loops always run
/// their body at least once.
pub fn pre_check(
    conditional: &DirectiveConditional,
    context: &ExecutionContext,
    evaluator: &dyn Evaluator,
    runtime: &mut Runtime<'_>,
) -> Result<bool, AraraError> {
    let run = match conditional {
        DirectiveConditional::If(expression) => {
            condition(expression, context, evaluator, runtime)?
        }
        DirectiveConditional::Unless(expression) => {
            !condition(expression, context, evaluator, runtime)?
        }
        DirectiveConditional::None
        | DirectiveConditional::While(_)
        | DirectiveConditional::Until(_) => true,
    };
    debug!("Pre-check for conditional '{}': {}", conditional, run);
    Ok(run)
}

/// Decides, after the body ran, whether it runs again.
///
/// `none`, `if` and `unless` never repeat.
pub fn re_check(
    conditional: &DirectiveConditional,
    context: &ExecutionContext,
    evaluator: &dyn Evaluator,
    runtime: &mut Runtime<'_>,
) -> Result<bool, AraraError> {
    let again = match conditional {
        DirectiveConditional::While(expression) => {
            condition(expression, context, evaluator, runtime)?
        }
        DirectiveConditional::Until(expression) => {
            !condition(expression, context, evaluator, runtime)?
        }
        DirectiveConditional::None
        | DirectiveConditional::If(_)
        | DirectiveConditional::Unless(_) => false,
    };
    debug!("Re-check for conditional '{}': {}", conditional, again);
    Ok(again)
}

fn condition(
    expression: &str,
    context: &ExecutionContext,
    evaluator: &dyn Evaluator,
    runtime: &mut Runtime<'_>,
) -> Result<bool, AraraError> {
    let value = evaluator.evaluate(expression, context, runtime)?;
    value.as_bool().ok_or_else(|| {
        AraraError::Evaluation(EvalError::Type(format!(
            "the conditional '{}' must yield a boolean, found a {}",
            expression,
            value.type_name()
        )))
    })
}
