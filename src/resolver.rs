//! Rule resolution: select matching rules, combine them, compile

use serde::Serialize;
use tracing::{debug, info};

use rls_common::config::{CombinationStrategy, DefaultPolicy, ResolverConfig};
use rls_common::error::Result;
use rls_common::types::Operation;
use rls_policy::{compile, find_matching, AuthorizationRule, CompileContext, CompiledPredicate, PolicyNode};

/// Predicate for one table operation, with the rules it came from
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Matching rule ids, highest priority first
    pub matched_rule_ids: Vec<String>,
    /// No rule matched and the default policy was applied
    pub used_default: bool,
    pub predicate: CompiledPredicate,
}

/// Applies a combination strategy over `find_matching` results
#[derive(Debug, Clone, Default)]
pub struct PolicyResolver {
    config: ResolverConfig,
}

impl PolicyResolver {
    /// Create a new resolver
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Base compile context for a table, from the compiler settings
    #[must_use]
    pub fn context_for(&self, schema: &str, table: &str) -> CompileContext {
        CompileContext::from_config(&self.config.compiler).with_table(schema, table)
    }

    /// Resolve the predicate for a table operation.
    ///
    /// # Errors
    /// Returns any compile error of the selected policies.
    pub fn resolve(
        &self,
        rules: &[AuthorizationRule],
        schema: &str,
        table: &str,
        operation: Operation,
    ) -> Result<Resolution> {
        self.resolve_with(rules, schema, table, operation, &self.context_for(schema, table))
    }

    /// Resolve with a caller-supplied context (alias, bound parameters, ids).
    ///
    /// # Errors
    /// Returns any compile error of the selected policies.
    pub fn resolve_with(
        &self,
        rules: &[AuthorizationRule],
        schema: &str,
        table: &str,
        operation: Operation,
        context: &CompileContext,
    ) -> Result<Resolution> {
        let matched = find_matching(rules, schema, table, operation);
        let matched_rule_ids: Vec<String> = matched.iter().map(|r| r.id.clone()).collect();
        let used_default = matched.is_empty();

        let node = if used_default {
            info!(
                schema,
                table,
                %operation,
                default = ?self.config.default_policy,
                "no rule matched, applying default policy"
            );
            match self.config.default_policy {
                DefaultPolicy::Allow => PolicyNode::AllowAll,
                DefaultPolicy::Deny => PolicyNode::DenyAll,
            }
        } else {
            combine(self.config.strategy, &matched)
        };

        let predicate = compile(&node, context)?;

        debug!(
            schema,
            table,
            %operation,
            strategy = ?self.config.strategy,
            rules = ?matched_rule_ids,
            "resolved row policy"
        );

        Ok(Resolution {
            matched_rule_ids,
            used_default,
            predicate,
        })
    }
}

fn combine(strategy: CombinationStrategy, matched: &[&AuthorizationRule]) -> PolicyNode {
    let policies = || matched.iter().map(|r| r.policy.clone());

    match strategy {
        CombinationStrategy::First => policies().next().unwrap_or(PolicyNode::DenyAll),
        CombinationStrategy::All => PolicyNode::and(policies().collect()),
        CombinationStrategy::Any => PolicyNode::or(policies().collect()),
    }
}
