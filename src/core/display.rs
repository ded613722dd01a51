// src/core/display.rs

use crate::eval::CommandLine;
use crate::models::{DirectiveConditional, ProjectFile, Rule};
use colored::*;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Width of the entry lines, dots included.
const LINE_WIDTH: usize = 65;
const RESULT_WIDTH: usize = 7;

/// Announces the file about to be processed.
pub fn print_file_header(file: &ProjectFile) {
    let size = fs::metadata(&file.path)
        .map(|m| human_size(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!(
        "{}",
        format!(t!("display.processing_file"), name = file.name(), size = size).bold()
    );
}

/// Tells the user a file had nothing to run.
pub fn print_no_directives(file: &ProjectFile) {
    println!(
        "{}",
        format!(t!("display.no_directives"), name = file.name()).yellow()
    );
}

/// `(Rule name) Task name ......` without the trailing result.
fn entry_label(rule: &Rule, task: Option<&str>) -> String {
    format!(
        "({}) {} ",
        rule.display_name(),
        task.unwrap_or(t!("display.unnamed_task"))
    )
}

/// Starts an entry line. In verbose mode the process output follows on its
/// own lines, so the label is printed as a header instead.
pub fn print_entry_start(rule: &Rule, task: Option<&str>, verbose: bool) {
    let label = entry_label(rule, task);
    if verbose {
        println!("\n{}", label.bold());
        println!("{}", "-".repeat(LINE_WIDTH));
    } else {
        let dots = LINE_WIDTH.saturating_sub(label.chars().count() + RESULT_WIDTH + 1);
        print!("{}{} ", label, ".".repeat(dots));
        io::stdout().flush().ok();
    }
}

/// Closes an entry line with its result.
pub fn print_entry_result(success: bool, verbose: bool) {
    let result = if success {
        t!("display.entry.success").green().bold()
    } else {
        t!("display.entry.failure").red().bold()
    };
    if verbose {
        println!("{}", "-".repeat(LINE_WIDTH));
        println!("{:>width$}", result, width = LINE_WIDTH);
    } else {
        println!("{}", result);
    }
}

fn print_dry_run_header(rule: &Rule, task: Option<&str>, conditional: &DirectiveConditional) {
    println!("\n{} {}", "[DR]".cyan().bold(), entry_label(rule, task).bold());
    println!("{}", "-".repeat(LINE_WIDTH));
    if rule.authors.is_empty() {
        println!("{}", t!("display.dry_run.no_authors"));
    } else {
        println!(
            "{}",
            format!(t!("display.dry_run.authors"), authors = rule.authors.join(", "))
        );
    }
    println!(
        "{}",
        format!(t!("display.dry_run.conditional"), conditional = conditional)
    );
}

/// Reports a command a dry run would have spawned.
pub fn print_dry_run_command(
    rule: &Rule,
    task: Option<&str>,
    conditional: &DirectiveConditional,
    command: &CommandLine,
    directory: &Path,
) {
    print_dry_run_header(rule, task, conditional);
    println!(
        "{}",
        format!(
            t!("display.dry_run.command"),
            command = command,
            directory = dunce::simplified(directory).display()
        )
    );
}

/// Reports a boolean result during a dry run.
pub fn print_dry_run_boolean(
    rule: &Rule,
    task: Option<&str>,
    conditional: &DirectiveConditional,
    value: bool,
) {
    print_dry_run_header(rule, task, conditional);
    println!("{}", format!(t!("display.dry_run.boolean"), value = value));
}

/// Notes that a rule halted the current file.
pub fn print_halted(code: i64) {
    println!("{}", format!(t!("display.halted"), code = code).yellow());
}

/// Prints the elapsed time of the run.
pub fn print_total_time(elapsed: Duration) {
    println!(
        "\n{}",
        format!(
            t!("display.total_time"),
            seconds = format!("{:.2}", elapsed.as_secs_f64())
        )
    );
}

/// Prints an error to stderr.
pub fn print_error(message: &str) {
    eprintln!("\n{}: {}", t!("display.error").red().bold(), message);
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["kB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1000.0;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS.get(unit).copied().unwrap_or("TB"))
}
