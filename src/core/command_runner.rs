// src/core/command_runner.rs

use crate::constants::EXIT_VALUE_KEY;
use crate::core::display;
use crate::core::error::AraraError;
use crate::eval::{CommandLine, Evaluator, ExecutionContext, Runtime, Value};
use crate::models::{DirectiveConditional, Rule, RuleCommand};
use crate::system::executor::{self, OutputMode};
use log::{debug, info};

/// Exit check applied when a command declares none.
const DEFAULT_EXIT_CHECK: &str = "value == 0";

/// Runs one rule command and reports whether it succeeded.
///
/// The rendered value is flattened and blank entries are dropped. Each
/// remaining entry is either a boolean, taken as the outcome, or a command,
/// which is spawned and judged by the `exit` expression. With
/// `halt_on_errors` the remaining entries are skipped after a failure, and
/// they are always skipped once an entry halts the current file.
pub fn run(
    rule: &Rule,
    command: &RuleCommand,
    conditional: &DirectiveConditional,
    context: &ExecutionContext,
    evaluator: &dyn Evaluator,
    runtime: &mut Runtime<'_>,
) -> Result<bool, AraraError> {
    let rendered = evaluator.render(&command.command, context, runtime)?;
    let results: Vec<Value> = rendered
        .flatten()
        .into_iter()
        .filter(|value| !value.is_blank())
        .collect();

    let task = command.name.as_deref();
    let mut success = true;
    for result in results {
        let outcome = match result {
            Value::Bool(value) => {
                info!("Boolean value: {}", value);
                if runtime.options.is_dry_run() {
                    display::print_dry_run_boolean(rule, task, conditional, value);
                } else {
                    display::print_entry_start(rule, task, runtime.options.verbose);
                    display::print_entry_result(value, runtime.options.verbose);
                }
                value
            }
            Value::Command(line) => spawn(rule, command, conditional, &line, evaluator, runtime)?,
            other => {
                return Err(AraraError::UnsupportedResultType {
                    found: other.type_name().to_string(),
                });
            }
        };

        success &= outcome;
        if !outcome && runtime.options.halt_on_errors {
            break;
        }
        if runtime.session.is_halted(&runtime.file.path) {
            debug!("Halt requested, skipping the remaining results");
            break;
        }
    }
    Ok(success)
}

fn spawn(
    rule: &Rule,
    command: &RuleCommand,
    conditional: &DirectiveConditional,
    line: &CommandLine,
    evaluator: &dyn Evaluator,
    runtime: &mut Runtime<'_>,
) -> Result<bool, AraraError> {
    let options = runtime.options;
    let directory = line
        .working_directory
        .clone()
        .unwrap_or_else(|| options.working_directory.clone());
    info!("System command: {} @ {}", line, directory.display());

    let task = command.name.as_deref();
    if options.is_dry_run() {
        display::print_dry_run_command(rule, task, conditional, line, &directory);
        return Ok(true);
    }

    display::print_entry_start(rule, task, options.verbose);
    let output = if options.verbose {
        OutputMode::Inherit
    } else {
        OutputMode::Discard
    };
    let exit_code = match executor::run_command(line, &directory, options.timeout, output) {
        Ok(code) => code,
        Err(e) => {
            display::print_entry_result(false, options.verbose);
            return Err(e.into());
        }
    };
    info!("Process exited with code {}", exit_code);

    let check = command.exit.as_deref().unwrap_or(DEFAULT_EXIT_CHECK);
    let scope = ExecutionContext::new().with(EXIT_VALUE_KEY, Value::Int(exit_code));
    let verdict = evaluator.evaluate(check, &scope, runtime)?;
    let success = verdict
        .as_bool()
        .ok_or_else(|| AraraError::NonBooleanExitCheck {
            found: verdict.type_name().to_string(),
        })?;

    display::print_entry_result(success, options.verbose);
    Ok(success)
}
