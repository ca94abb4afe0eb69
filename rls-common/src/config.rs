//! Configuration types for the row-level policy compiler

use serde::{Deserialize, Serialize};

/// Default schema holding membership and hierarchy tables
pub const DEFAULT_PRIVATE_SCHEMA: &str = "app_private";

/// Default SQL expression yielding the current actor id
pub const DEFAULT_ACTOR_ID_EXPR: &str = "jwt_public.current_user_id()";

/// Predicate compiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Schema holding `*_memberships_sprt` and hierarchy tables (default: "app_private")
    pub private_schema_name: String,
    /// SQL expression for the current actor id
    pub current_actor_id_expr: String,
    /// Emit `$n` placeholders instead of inline literals
    pub parameterized: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            private_schema_name: DEFAULT_PRIVATE_SCHEMA.to_string(),
            current_actor_id_expr: DEFAULT_ACTOR_ID_EXPR.to_string(),
            parameterized: false,
        }
    }
}

/// How several matching rules are combined into one predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationStrategy {
    /// Highest-priority matching rule only
    #[default]
    First,
    /// Every matching rule must hold (AND)
    All,
    /// At least one matching rule must hold (OR)
    Any,
}

/// Outcome when no rule matches a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    Allow,
    #[default]
    Deny,
}

/// Rule resolution settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Combination strategy for matching rules (default: first)
    pub strategy: CombinationStrategy,
    /// Policy applied when no rule matches (default: deny)
    pub default_policy: DefaultPolicy,
    /// Predicate compiler settings
    pub compiler: CompilerConfig,
}
