//! Diagnostics CLI
//!
//! Thin drivers over the library for exercising the pipeline from a
//! terminal: classify text, format it, run a multi-file submission, extract
//! a file, and inspect provider health. The HTTP route layer of the board
//! calls the same entry points.

pub mod commands;
pub mod output;

pub use output::Output;
