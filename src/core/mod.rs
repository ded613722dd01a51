// src/core/mod.rs

/// Directive parameters to rule arguments.
pub mod binder;
/// CRC-32 change detection.
pub mod cache;
/// Runs one rule command.
pub mod command_runner;
/// `if`/`unless`/`while`/`until` checks.
pub mod conditional;
/// Configuration files and command line overrides.
pub mod config_loader;
/// Directive extraction from source lines.
pub mod directives;
/// Terminal output.
pub mod display;
/// The engine error type.
pub mod error;
/// Files given on the command line.
pub mod files;
/// Runs one directive.
pub mod interpreter;
/// Runs files and their directives in order.
pub mod linear_executor;
/// Finds rule files.
pub mod resolver;
/// Reads and validates rule files.
pub mod rule_loader;
/// Per-run mutable state.
pub mod session;
