// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! Core types for devfetch.
//!
//! This crate holds the data model shared by the tool crates and the CLI:
//! tool specifications, platform detection, the error type, manifest
//! configuration, and conventional install paths. It performs no network
//! access of its own.

pub mod config;
mod error;
pub mod paths;
pub mod tools;

pub use error::{Error, ErrorKind, Result, Step};
