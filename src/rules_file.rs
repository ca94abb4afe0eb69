//! Rule set files (TOML or JSON)

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use rls_common::config::ResolverConfig;
use rls_common::error::{Error, Result};
use rls_common::types::QualifiedTable;
use rls_policy::{AuthorizationRule, CompileContext};

use crate::resolver::PolicyResolver;
use crate::store::RuleStore;

/// Rules are kept as raw values so each policy tree can be tag-checked
/// before typed deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRulesFile {
    resolver: ResolverConfig,
    tables: HashMap<String, QualifiedTable>,
    fields: HashMap<String, String>,
    rules: Vec<Value>,
}

/// Loaded rule set with its resolver settings
#[derive(Debug, Clone, Default)]
pub struct RulesFile {
    pub resolver: ResolverConfig,
    /// Opaque join table ids
    pub tables: HashMap<String, QualifiedTable>,
    /// Opaque join field ids
    pub fields: HashMap<String, String>,
    pub rules: Vec<AuthorizationRule>,
}

impl RulesFile {
    /// Load from a file; `.json` is read as JSON, anything else as TOML
    ///
    /// # Errors
    /// Returns I/O, parse and policy validation errors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let file = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        info!(
            path = %path.display(),
            rules = file.rules.len(),
            strategy = ?file.resolver.strategy,
            "loaded rules file"
        );
        Ok(file)
    }

    /// Parse TOML content
    ///
    /// # Errors
    /// Returns TOML syntax errors and policy validation errors.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_raw(toml::from_str(content)?)
    }

    /// Parse JSON content
    ///
    /// # Errors
    /// Returns JSON syntax errors and policy validation errors.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::from_raw(serde_json::from_str(content)?)
    }

    fn from_raw(raw: RawRulesFile) -> Result<Self> {
        let rules = raw
            .rules
            .into_iter()
            .map(AuthorizationRule::from_value)
            .collect::<Result<Vec<_>>>()?;

        // duplicate ids are a file defect, not something to resolve silently
        RuleStore::with_rules(rules.iter().cloned())?;

        Ok(Self {
            resolver: raw.resolver,
            tables: raw.tables,
            fields: raw.fields,
            rules,
        })
    }

    /// Resolver for this file's settings
    #[must_use]
    pub fn resolver(&self) -> PolicyResolver {
        PolicyResolver::new(self.resolver.clone())
    }

    /// Compile context for a table, with the file's opaque id maps
    #[must_use]
    pub fn context_for(&self, schema: &str, table: &str) -> CompileContext {
        let mut context = self.resolver().context_for(schema, table);
        for (id, target) in &self.tables {
            context = context.with_table_id(id, target.clone());
        }
        for (id, field) in &self.fields {
            context = context.with_field_id(id, field);
        }
        context
    }

    /// Move the rules into a shared store
    ///
    /// # Errors
    /// Returns [`Error::DuplicateRule`] for a repeated id.
    pub fn into_store(self) -> Result<RuleStore> {
        RuleStore::with_rules(self.rules)
    }

    /// Look up a rule by id
    ///
    /// # Errors
    /// Returns [`Error::RuleNotFound`] if the file has no such rule.
    pub fn rule(&self, id: &str) -> Result<&AuthorizationRule> {
        self.rules
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))
    }
}
