//! Row-Level Policy Common Types
//!
//! Shared types, configuration, and error handling for the row-level
//! policy compiler.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{CombinationStrategy, CompilerConfig, DefaultPolicy, ResolverConfig};
pub use error::{Error, Result};
pub use types::{Operation, QualifiedTable};
