//! Row-Level Policy Compiler
//!
//! Turns declarative access rules into SQL row predicates:
//! - Policy tree taxonomy (owner, membership, hierarchy, temporal, ...)
//! - Rule target matching with glob patterns and priorities
//! - Predicate compilation with constant folding
//! - Identifier and literal escaping, optional bound parameters

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builders;
pub mod compiler;
pub mod context;
mod leaves;
pub mod matcher;
pub mod node;
pub mod rule;
pub mod sql;

pub use compiler::{compile, CompiledPredicate};
pub use context::CompileContext;
pub use matcher::{find_matching, glob_matches, matches};
pub use node::{BoolOp, PolicyNode};
pub use rule::{AuthorizationRule, RuleTarget};
