//! Shared in-memory rule set

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use rls_common::error::{Error, Result};
use rls_policy::AuthorizationRule;

/// Rule storage shared between the loader and resolving callers.
///
/// Insertion order is kept so equal-priority rules resolve in the order
/// they were added.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: Arc<RwLock<Vec<AuthorizationRule>>>,
}

impl RuleStore {
    /// Create a new rule store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a rule set; duplicate ids are rejected
    ///
    /// # Errors
    /// Returns [`Error::DuplicateRule`] for a repeated id.
    pub fn with_rules(rules: impl IntoIterator<Item = AuthorizationRule>) -> Result<Self> {
        let store = Self::new();
        for rule in rules {
            store.add_rule(rule)?;
        }
        Ok(store)
    }

    /// Add a rule
    ///
    /// # Errors
    /// Returns [`Error::DuplicateRule`] if a rule with the same id exists.
    pub fn add_rule(&self, rule: AuthorizationRule) -> Result<()> {
        let mut rules = self.rules.write();

        if rules.iter().any(|r| r.id == rule.id) {
            return Err(Error::DuplicateRule(rule.id));
        }

        debug!(id = %rule.id, priority = rule.priority, "rule added");
        rules.push(rule);
        Ok(())
    }

    /// Remove a rule by id
    ///
    /// # Errors
    /// Returns [`Error::RuleNotFound`] if no rule has this id.
    pub fn remove_rule(&self, id: &str) -> Result<AuthorizationRule> {
        let mut rules = self.rules.write();
        let index = rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))?;

        debug!(id, "rule removed");
        Ok(rules.remove(index))
    }

    /// Enable or disable a rule
    ///
    /// # Errors
    /// Returns [`Error::RuleNotFound`] if no rule has this id.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut rules = self.rules.write();
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))?;

        rule.enabled = enabled;
        Ok(())
    }

    /// Get a rule by id
    pub fn get(&self, id: &str) -> Option<AuthorizationRule> {
        self.rules.read().iter().find(|r| r.id == id).cloned()
    }

    /// Copy of the current rules, in insertion order
    pub fn snapshot(&self) -> Vec<AuthorizationRule> {
        self.rules.read().clone()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}
