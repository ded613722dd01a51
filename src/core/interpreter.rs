// src/core/interpreter.rs

use crate::core::error::AraraError;
use crate::core::session::Session;
use crate::core::{binder, command_runner, conditional, display, resolver, rule_loader};
use crate::eval::{Evaluator, ExecutionContext, Runtime};
use crate::models::{Directive, ExecutionOptions, ExecutionStatus, ProjectFile, Rule};
use log::{debug, info};
use std::path::Path;

/// What happens after a batch of commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Go on with the next command or iteration.
    Continue,
    /// Stop processing the file with this terminal status.
    Halt(ExecutionStatus),
}

/// Executes the directives of one file.
#[derive(Debug)]
pub struct Interpreter<'a> {
    options: &'a ExecutionOptions,
    session: &'a mut Session,
    file: &'a ProjectFile,
    evaluator: &'a dyn Evaluator,
}

impl<'a> Interpreter<'a> {
    /// An interpreter for the directives of `file`.
    pub fn new(
        options: &'a ExecutionOptions,
        session: &'a mut Session,
        file: &'a ProjectFile,
        evaluator: &'a dyn Evaluator,
    ) -> Self {
        Self {
            options,
            session,
            file,
            evaluator,
        }
    }

    /// Whether a rule halted processing of the current file.
    pub fn is_halted(&self) -> bool {
        self.session.is_halted(&self.file.path)
    }

    /// Runs one directive and returns its terminal status.
    ///
    /// Any error other than a failed resolution comes back prefixed with
    /// the rule identifier and the location of the rule file. Once the file
    /// is halted, further directives are not run and report the halt status.
    pub fn execute(&mut self, directive: &Directive) -> Result<ExecutionStatus, AraraError> {
        if let Some(code) = self.session.halt_code(&self.file.path) {
            debug!(
                "Skipping directive '{}': the file was already halted",
                directive.identifier
            );
            return Ok(ExecutionStatus::from_halt_code(code));
        }

        let rule_path = resolver::resolve(&directive.identifier, &self.options.rule_paths)?;
        info!(
            "Rule location: '{}'",
            rule_path.parent().unwrap_or(&rule_path).display()
        );
        self.execute_rule(directive, &rule_path)
            .map_err(|e| e.in_rule(&directive.identifier, &rule_path))
    }

    fn execute_rule(
        &mut self,
        directive: &Directive,
        rule_path: &Path,
    ) -> Result<ExecutionStatus, AraraError> {
        let rule = rule_loader::load(rule_path, &directive.identifier)?;
        let evaluator = self.evaluator;
        let mut runtime = Runtime::new(&mut *self.session, self.options, self.file);
        let context = binder::bind(&rule, directive, evaluator, &mut runtime)?;

        let available = conditional::pre_check(&directive.conditional, &context, evaluator, &mut runtime)?;
        // Flags, defaults and the guard may halt the file themselves.
        if let Some(terminal) = halted(&runtime) {
            return Ok(terminal);
        }
        if !available {
            info!(
                "Directive '{}' skipped by its conditional '{}'",
                directive.identifier, directive.conditional
            );
            return Ok(ExecutionStatus::Processing);
        }

        let mut status = ExecutionStatus::Processing;
        let mut iterations: u32 = 0;
        loop {
            iterations += 1;
            debug!(
                "Running '{}', iteration {} of at most {}",
                directive.identifier, iterations, self.options.max_loops
            );
            if let Outcome::Halt(terminal) =
                run_commands(&rule, directive, &context, evaluator, &mut runtime, &mut status)?
            {
                return Ok(terminal);
            }

            let again = conditional::re_check(&directive.conditional, &context, evaluator, &mut runtime)?;
            if let Some(terminal) = halted(&runtime) {
                return Ok(terminal);
            }
            if !again {
                break;
            }
            if iterations >= self.options.max_loops {
                return Err(AraraError::LoopBoundExceeded {
                    identifier: directive.identifier.clone(),
                    max_loops: self.options.max_loops,
                });
            }
        }
        Ok(status)
    }
}

/// The terminal status of the current file if an expression halted it.
fn halted(runtime: &Runtime<'_>) -> Option<ExecutionStatus> {
    let code = runtime.session.halt_code(&runtime.file.path)?;
    info!("Halt requested with code {}", code);
    display::print_halted(code);
    Some(ExecutionStatus::from_halt_code(code))
}

/// Runs every command of the rule once, checking for a halt after each.
fn run_commands(
    rule: &Rule,
    directive: &Directive,
    context: &ExecutionContext,
    evaluator: &dyn Evaluator,
    runtime: &mut Runtime<'_>,
    status: &mut ExecutionStatus,
) -> Result<Outcome, AraraError> {
    for command in &rule.commands {
        let success =
            command_runner::run(rule, command, &directive.conditional, context, evaluator, runtime)?;

        if !success {
            *status = ExecutionStatus::ExternalCallFailed;
            if runtime.options.halt_on_errors {
                debug!("Command failed, halting '{}'", runtime.file.path.display());
                let failed = ExecutionStatus::ExternalCallFailed;
                runtime.session.halt(&runtime.file.path, i64::from(failed.exit_code()));
                return Ok(Outcome::Halt(failed));
            }
        }

        if let Some(terminal) = halted(runtime) {
            return Ok(Outcome::Halt(terminal));
        }
    }
    Ok(Outcome::Continue)
}
