//! Gradepilot library crate
//!
//! Exposes core modules so integration tests and external tooling can
//! exercise the suggestion pipeline without going through CLI startup.

pub mod config;
pub mod grading;
pub mod keyring;
pub mod spinner;
pub mod suggest;
pub mod util;
