// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]
// Error rendering writes directly to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

//! devfetch command-line interface.
//!
//! The binary in `main.rs` is a thin shell over this library: [`cli`] holds
//! argument parsing, error mapping and exit codes, [`commands`] the command
//! implementations, and [`tracing`] logging setup.

pub mod cli;
pub mod commands;
pub mod tracing;
