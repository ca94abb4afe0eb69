//! Helpers for common rule shapes
//!
//! Every helper returns a fresh [`AuthorizationRule`]; arguments are
//! copied, never retained.

use rls_common::types::Operation;

use crate::node::{
    AdminOwnerLogic, MembershipByFieldPolicy, MembershipPolicy, MembershipType, PolicyNode,
    PublishablePolicy,
};
use crate::rule::{AuthorizationRule, RuleTarget};

/// Priority used by [`admin_full_access`], above ordinary table rules
pub const ADMIN_PRIORITY: i32 = 100;

/// Rows owned by the actor through `owner_field`
pub fn owner_only(id: &str, schema: &str, table: &str, owner_field: &str) -> AuthorizationRule {
    AuthorizationRule::new(
        id,
        &format!("{table} owner only"),
        RuleTarget::any().schema(schema).table(table),
        PolicyNode::direct_owner(owner_field),
    )
}

/// Rows whose `entity_field` references an organization the actor belongs to
pub fn org_member(
    id: &str,
    schema: &str,
    table: &str,
    entity_field: &str,
    permission: Option<&str>,
) -> AuthorizationRule {
    AuthorizationRule::new(
        id,
        &format!("{table} organization members"),
        RuleTarget::any().schema(schema).table(table),
        PolicyNode::MembershipByField(MembershipByFieldPolicy {
            entity_field: entity_field.to_string(),
            membership_type: Some(MembershipType::ORG),
            permission: permission.map(str::to_string),
            permissions: None,
            is_admin: None,
            is_owner: None,
            admin_owner_logic: AdminOwnerLogic::Or,
        }),
    )
}

/// Published rows are readable
pub fn published_only(id: &str, schema: &str, table: &str) -> AuthorizationRule {
    AuthorizationRule::new(
        id,
        &format!("{table} published rows"),
        RuleTarget::any()
            .schema(schema)
            .table(table)
            .operations([Operation::Select]),
        PolicyNode::Publishable(PublishablePolicy::default()),
    )
}

/// Application admins reach every row of every table
pub fn admin_full_access(id: &str) -> AuthorizationRule {
    AuthorizationRule::new(
        id,
        "admin full access",
        RuleTarget::any().schema("*").table("*"),
        PolicyNode::Membership(MembershipPolicy {
            membership_type: MembershipType::APP,
            permission: None,
            permissions: None,
            is_admin: Some(true),
            is_owner: None,
            admin_owner_logic: AdminOwnerLogic::Or,
        }),
    )
    .with_priority(ADMIN_PRIORITY)
}

pub fn deny_all(id: &str, target: RuleTarget) -> AuthorizationRule {
    AuthorizationRule::new(id, "deny all", target, PolicyNode::DenyAll)
}

pub fn allow_all(id: &str, target: RuleTarget) -> AuthorizationRule {
    AuthorizationRule::new(id, "allow all", target, PolicyNode::AllowAll)
}
