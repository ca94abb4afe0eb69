//! Rule target matching and selection

use regex::Regex;
use tracing::{debug, warn};

use rls_common::types::Operation;

use crate::rule::{AuthorizationRule, RuleTarget};

/// Match a value against a glob pattern.
///
/// `*` alone matches any non-empty value. Patterns containing `*` or `?`
/// are anchored regular expressions; anything else is compared verbatim.
#[must_use]
pub fn glob_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return !value.is_empty();
    }

    if !pattern.contains(['*', '?']) {
        return pattern == value;
    }

    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expr.push('$');

    match Regex::new(&expr) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            warn!(pattern, error = %e, "glob pattern did not compile");
            false
        }
    }
}

/// Check whether a rule target applies to a schema, table and operation
#[must_use]
pub fn matches(target: &RuleTarget, schema: &str, table: &str, operation: Operation) -> bool {
    let schema_ok = target
        .schema_pattern
        .as_deref()
        .map_or(true, |p| glob_matches(p, schema));

    let table_ok = target
        .table_pattern
        .as_deref()
        .map_or(true, |p| glob_matches(p, table));

    let operation_ok = target
        .operations
        .as_ref()
        .map_or(true, |ops| ops.contains(&operation));

    schema_ok && table_ok && operation_ok
}

/// Enabled rules whose target applies, highest priority first.
///
/// Rules of equal priority keep their original relative order, so the
/// first element is a deterministic "first match".
#[must_use]
pub fn find_matching<'a>(
    rules: &'a [AuthorizationRule],
    schema: &str,
    table: &str,
    operation: Operation,
) -> Vec<&'a AuthorizationRule> {
    let mut matched: Vec<&AuthorizationRule> = rules
        .iter()
        .filter(|rule| rule.enabled)
        .filter(|rule| matches(&rule.target, schema, table, operation))
        .collect();

    // sort_by is stable
    matched.sort_by(|a, b| b.priority.cmp(&a.priority));

    debug!(
        schema,
        table,
        %operation,
        candidates = rules.len(),
        matched = matched.len(),
        "matched authorization rules"
    );

    matched
}
