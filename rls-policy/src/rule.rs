//! Authorization rule definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use rls_common::error::{Error, Result};
use rls_common::types::Operation;

use crate::node::PolicyNode;

/// Where a rule applies. An absent dimension matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleTarget {
    /// Glob over schema names
    #[serde(alias = "schema", skip_serializing_if = "Option::is_none")]
    pub schema_pattern: Option<String>,
    /// Glob over table names
    #[serde(alias = "table", skip_serializing_if = "Option::is_none")]
    pub table_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations: Option<BTreeSet<Operation>>,
    /// Fields the rule is concerned with; informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeSet<String>>,
}

impl RuleTarget {
    /// Target matching every schema, table and operation
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn schema(mut self, pattern: &str) -> Self {
        self.schema_pattern = Some(pattern.to_string());
        self
    }

    #[must_use]
    pub fn table(mut self, pattern: &str) -> Self {
        self.table_pattern = Some(pattern.to_string());
        self
    }

    #[must_use]
    pub fn operations(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.operations = Some(operations.into_iter().collect());
        self
    }

    #[must_use]
    pub fn fields<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.fields = Some(fields.into_iter().map(str::to_string).collect());
        self
    }
}

/// Access rule: a target, a policy tree and its priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRule {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub target: RuleTarget,
    pub policy: PolicyNode,
    /// Higher priority wins (default: 0)
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AuthorizationRule {
    /// Create an enabled rule with priority 0
    pub fn new(id: &str, name: &str, target: RuleTarget, policy: PolicyNode) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            target,
            policy,
            priority: 0,
            enabled: true,
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Set priority
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark rule as disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Build a rule from its serialized form, validating policy tags.
    ///
    /// # Errors
    /// Returns `UnsupportedNodeType` for unknown policy tags and
    /// `InvalidPolicy` for any other malformed rule.
    pub fn from_value(mut value: Value) -> Result<Self> {
        let policy = value
            .get_mut("policy")
            .map(Value::take)
            .ok_or_else(|| Error::InvalidPolicy("rule has no policy".to_string()))?;
        let policy = PolicyNode::from_value(policy)?;

        if let Some(map) = value.as_object_mut() {
            map.insert("policy".to_string(), serde_json::to_value(&policy)?);
        }

        serde_json::from_value(value).map_err(|e| Error::InvalidPolicy(e.to_string()))
    }
}
