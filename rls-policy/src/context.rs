//! Compilation context

use serde_json::Value;
use std::collections::HashMap;

use rls_common::config::{CompilerConfig, DEFAULT_ACTOR_ID_EXPR, DEFAULT_PRIVATE_SCHEMA};
use rls_common::types::QualifiedTable;

use crate::sql::{escape_identifier, qualified_name};

/// Settings for one predicate compilation
#[derive(Debug, Clone)]
pub struct CompileContext {
    /// Alias of the row's table in the outer query
    pub table_alias: Option<String>,
    /// Informational, not used in predicate text
    pub schema_name: Option<String>,
    /// Informational, not used in predicate text
    pub table_name: Option<String>,
    /// Schema of membership and hierarchy tables (default: "app_private")
    pub private_schema_name: String,
    /// SQL expression for the current actor id
    pub current_actor_id_expr: String,
    /// Emit `$n` placeholders instead of inline literals
    pub parameterized: bool,
    /// Parameters already bound by the outer query; placeholders continue after them
    pub parameters: Vec<Value>,
    /// Opaque table ids accepted by `MembershipByJoin.join_table_id`
    pub table_ids: HashMap<String, QualifiedTable>,
    /// Opaque field ids accepted by `MembershipByJoin.join_field_id`
    pub field_ids: HashMap<String, String>,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self {
            table_alias: None,
            schema_name: None,
            table_name: None,
            private_schema_name: DEFAULT_PRIVATE_SCHEMA.to_string(),
            current_actor_id_expr: DEFAULT_ACTOR_ID_EXPR.to_string(),
            parameterized: false,
            parameters: Vec::new(),
            table_ids: HashMap::new(),
            field_ids: HashMap::new(),
        }
    }
}

impl CompileContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying the compiler settings of a configuration
    #[must_use]
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            private_schema_name: config.private_schema_name.clone(),
            current_actor_id_expr: config.current_actor_id_expr.clone(),
            parameterized: config.parameterized,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.table_alias = Some(alias.to_string());
        self
    }

    #[must_use]
    pub fn with_table(mut self, schema: &str, table: &str) -> Self {
        self.schema_name = Some(schema.to_string());
        self.table_name = Some(table.to_string());
        self
    }

    #[must_use]
    pub fn with_actor_expr(mut self, expr: &str) -> Self {
        self.current_actor_id_expr = expr.to_string();
        self
    }

    #[must_use]
    pub fn parameterized(mut self, parameters: Vec<Value>) -> Self {
        self.parameterized = true;
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_table_id(mut self, id: &str, table: QualifiedTable) -> Self {
        self.table_ids.insert(id.to_string(), table);
        self
    }

    #[must_use]
    pub fn with_field_id(mut self, id: &str, field: &str) -> Self {
        self.field_ids.insert(id.to_string(), field.to_string());
        self
    }

    /// Column of the row being checked, qualified by the alias when set
    #[must_use]
    pub fn column(&self, field: &str) -> String {
        match &self.table_alias {
            Some(alias) => format!("{}.{}", escape_identifier(alias), escape_identifier(field)),
            None => escape_identifier(field),
        }
    }

    /// Table in the private schema
    #[must_use]
    pub fn private_table(&self, table: &str) -> String {
        qualified_name(&self.private_schema_name, table)
    }

    #[must_use]
    pub fn actor(&self) -> &str {
        &self.current_actor_id_expr
    }
}
