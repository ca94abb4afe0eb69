//! Error types for the row-level policy compiler

use thiserror::Error;

/// Policy compiler error types
#[derive(Error, Debug)]
pub enum Error {
    // Compilation Errors
    #[error("Unsupported policy node type: {0}")]
    UnsupportedNodeType(String),

    #[error("Invalid arity for {op}: expected {expected} argument(s), got {actual}")]
    InvalidArity {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Missing join target: {0}")]
    MissingJoinTarget(String),

    #[error("Unknown table id: {0}")]
    UnknownTableId(String),

    #[error("Unknown field id: {0}")]
    UnknownFieldId(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    // Rule Management Errors
    #[error("Rule already exists: {0}")]
    DuplicateRule(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    // General Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for policy compiler operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable error code for diagnostics and tooling output
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedNodeType(_) => "unsupported_node_type",
            Self::InvalidArity { .. } => "invalid_arity",
            Self::MissingJoinTarget(_) => "missing_join_target",
            Self::UnknownTableId(_) => "unknown_table_id",
            Self::UnknownFieldId(_) => "unknown_field_id",
            Self::InvalidPolicy(_) => "invalid_policy",
            Self::DuplicateRule(_) => "duplicate_rule",
            Self::RuleNotFound(_) => "rule_not_found",
            Self::ConfigError(_) => "config_error",
            Self::IoError(_) => "io_error",
            Self::JsonError(_) => "json_error",
            Self::TomlError(_) => "toml_error",
        }
    }

    /// Whether this error comes from compiling a policy tree.
    ///
    /// Compile errors are configuration defects: compilation is
    /// deterministic, so retrying never helps.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedNodeType(_)
                | Self::InvalidArity { .. }
                | Self::MissingJoinTarget(_)
                | Self::UnknownTableId(_)
                | Self::UnknownFieldId(_)
                | Self::InvalidPolicy(_)
        )
    }
}
