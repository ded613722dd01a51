include!(concat!(env!("OUT_DIR"), "/translations.rs"));

/// Command line surface.
pub mod cli;
/// Names and defaults shared across the crate.
pub mod constants;
/// The directive execution engine.
pub mod core;
/// Rule expressions and helper functions.
pub mod eval;
/// Plain data types: directives, rules, files and options.
pub mod models;
/// Process spawning.
pub mod system;
