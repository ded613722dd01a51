//! # System Interaction Layer
//!
//! The boundary between the engine and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns external processes in a working directory, enforces
//!   the optional timeout by killing the child, and captures output for the
//!   helper functions that need it. Falls back to `cmd /C` for Windows built-ins.

/// Process spawning with timeouts.
pub mod executor;
