//! Row-Level Policy Compiler for `LumaDB`
//!
//! Selects the access rules that apply to a table operation and compiles
//! them into a single SQL predicate for the query layer.
//!
//! # Features
//!
//! - **Rule selection** - Glob targets, priorities, enabled flags
//! - **Combination strategies** - first match, all (AND), any (OR)
//! - **Predicate compilation** - Constant folding, escaping, bound parameters
//! - **Rule files** - TOML or JSON rule sets with compiler settings

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod resolver;
pub mod rules_file;
pub mod store;

pub use rls_common as common;
pub use rls_policy as policy;

pub use resolver::{PolicyResolver, Resolution};
pub use rules_file::RulesFile;
pub use store::RuleStore;
