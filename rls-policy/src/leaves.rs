//! Predicate generators for leaf policy nodes

use rls_common::error::{Error, Result};
use rls_common::types::QualifiedTable;

use crate::compiler::Compiled;
use crate::context::CompileContext;
use crate::node::{
    AdminOwnerLogic, ArrayContainsActorByJoinPolicy, ArrayContainsActorPolicy,
    DirectOwnerAnyPolicy, DirectOwnerPolicy, HierarchyDirection, MembershipByFieldPolicy,
    MembershipByJoinPolicy, MembershipCriteria, MembershipPolicy, MembershipType,
    OrgHierarchyPolicy, PublishablePolicy, TemporalPolicy,
};
use crate::sql::{escape_identifier, qualified_name, Fragment, Literal};

const NOW: &str = "now()";
const SPRT_ALIAS: &str = "sprt";
const HIERARCHY_TABLE: &str = "org_hierarchy_closure";
const PERMISSION_MASK_FN: &str = "permission_mask";

pub(crate) fn direct_owner(policy: &DirectOwnerPolicy, ctx: &CompileContext) -> Compiled {
    Compiled::Expr(owner_check(&policy.entity_field, ctx))
}

pub(crate) fn direct_owner_any(policy: &DirectOwnerAnyPolicy, ctx: &CompileContext) -> Compiled {
    let mut checks: Vec<Fragment> = policy
        .entity_fields
        .iter()
        .map(|field| owner_check(field, ctx))
        .collect();

    match checks.len() {
        0 => Compiled::Const(false),
        1 => checks.pop().map_or(Compiled::Const(false), Compiled::Expr),
        _ => Compiled::Expr(Fragment::join(checks, " OR ").wrap("(", ")")),
    }
}

fn owner_check(field: &str, ctx: &CompileContext) -> Fragment {
    Fragment::sql(format!("{} = {}", ctx.column(field), ctx.actor()))
}

pub(crate) fn membership(policy: &MembershipPolicy, ctx: &CompileContext) -> Compiled {
    let mut fragment = Fragment::sql(format!(
        "EXISTS (SELECT 1 FROM {} AS {SPRT_ALIAS} WHERE ",
        sprt_table(&policy.membership_type, ctx)
    ));
    fragment.append(membership_conditions(&policy.criteria(), ctx));
    fragment.push_sql(")");
    Compiled::Expr(fragment)
}

pub(crate) fn membership_by_field(
    policy: &MembershipByFieldPolicy,
    ctx: &CompileContext,
) -> Compiled {
    let scope = policy.membership_type.clone().unwrap_or_default();

    let mut fragment = Fragment::sql(format!(
        "{} = ANY (SELECT {SPRT_ALIAS}.{} FROM {} AS {SPRT_ALIAS} WHERE ",
        ctx.column(&policy.entity_field),
        escape_identifier("entity_id"),
        sprt_table(&scope, ctx)
    ));
    fragment.append(membership_conditions(&policy.criteria(), ctx));
    fragment.push_sql(")");
    Compiled::Expr(fragment)
}

pub(crate) fn membership_by_join(
    policy: &MembershipByJoinPolicy,
    ctx: &CompileContext,
) -> Result<Compiled> {
    let join_table = resolve_join_table(policy, ctx)?;
    let join_field = resolve_join_field(policy, ctx)?;
    let scope = policy.membership_type.clone().unwrap_or_default();

    let mut fragment = Fragment::sql(format!(
        "{} = ANY (SELECT jt.{} FROM {} AS jt INNER JOIN {} AS {SPRT_ALIAS} ON {SPRT_ALIAS}.{} = jt.{} WHERE ",
        ctx.column(&policy.entity_field),
        escape_identifier("id"),
        qualified_name(&join_table.schema, &join_table.table),
        sprt_table(&scope, ctx),
        escape_identifier("entity_id"),
        escape_identifier(&join_field),
    ));
    fragment.append(membership_conditions(&policy.criteria(), ctx));
    fragment.push_sql(")");
    Ok(Compiled::Expr(fragment))
}

/// Explicit schema + table wins over an opaque id
fn resolve_join_table(
    policy: &MembershipByJoinPolicy,
    ctx: &CompileContext,
) -> Result<QualifiedTable> {
    match (&policy.join_schema, &policy.join_table, &policy.join_table_id) {
        (Some(schema), Some(table), _) => Ok(QualifiedTable::new(schema, table)),
        (_, _, Some(id)) => ctx
            .table_ids
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownTableId(id.clone())),
        _ => Err(Error::MissingJoinTarget(format!(
            "join table for '{}': set join_table_id or join_schema and join_table",
            policy.entity_field
        ))),
    }
}

fn resolve_join_field(policy: &MembershipByJoinPolicy, ctx: &CompileContext) -> Result<String> {
    match (&policy.join_field, &policy.join_field_id) {
        (Some(field), _) => Ok(field.clone()),
        (None, Some(id)) => ctx
            .field_ids
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownFieldId(id.clone())),
        (None, None) => Err(Error::MissingJoinTarget(format!(
            "join field for '{}': set join_field_id or join_field",
            policy.entity_field
        ))),
    }
}

fn sprt_table(scope: &MembershipType, ctx: &CompileContext) -> String {
    ctx.private_table(&format!("{}_memberships_sprt", scope.scope_name()))
}

/// `actor_id` match, then permission mask, then admin/owner flags, all ANDed
fn membership_conditions(criteria: &MembershipCriteria<'_>, ctx: &CompileContext) -> Fragment {
    let mut conditions = vec![Fragment::sql(format!(
        "{SPRT_ALIAS}.{} = {}",
        escape_identifier("actor_id"),
        ctx.actor()
    ))];

    let names = criteria.permission_names();
    if !names.is_empty() {
        conditions.push(permission_check(names, ctx));
    }

    let mut flags = Vec::new();
    if criteria.is_admin {
        flags.push(Fragment::sql(format!(
            "{SPRT_ALIAS}.{} IS TRUE",
            escape_identifier("is_admin")
        )));
    }
    if criteria.is_owner {
        flags.push(Fragment::sql(format!(
            "{SPRT_ALIAS}.{} IS TRUE",
            escape_identifier("is_owner")
        )));
    }
    if flags.len() > 1 {
        let separator = match criteria.admin_owner_logic {
            AdminOwnerLogic::And => " AND ",
            AdminOwnerLogic::Or => " OR ",
        };
        conditions.push(Fragment::join(flags, separator).wrap("(", ")"));
    } else {
        conditions.extend(flags);
    }

    Fragment::join(conditions, " AND ")
}

/// `(sprt.permissions & mask) = mask`
fn permission_check(names: Vec<String>, ctx: &CompileContext) -> Fragment {
    let mask_fn = ctx.private_table(PERMISSION_MASK_FN);
    let literal = Literal::TextArray(names);

    let mut fragment = Fragment::sql(format!(
        "({SPRT_ALIAS}.{} & {mask_fn}(",
        escape_identifier("permissions")
    ));
    fragment.push_param(literal.clone());
    fragment.push_sql(format!(")) = {mask_fn}("));
    fragment.push_param(literal);
    fragment.push_sql(")");
    fragment
}

pub(crate) fn org_hierarchy(policy: &OrgHierarchyPolicy, ctx: &CompileContext) -> Compiled {
    // down: the actor is the ancestor of the anchor; up: its descendant
    let (anchor_side, actor_side) = match policy.direction {
        HierarchyDirection::Down => ("descendant_id", "ancestor_id"),
        HierarchyDirection::Up => ("ancestor_id", "descendant_id"),
    };

    let mut fragment = Fragment::sql(format!(
        "({}, {}) IN (SELECT hier.{}, hier.{} FROM {} AS hier WHERE hier.{} = {}",
        ctx.column(&policy.entity_field),
        ctx.column(&policy.anchor_field),
        escape_identifier("entity_id"),
        escape_identifier(anchor_side),
        ctx.private_table(HIERARCHY_TABLE),
        escape_identifier(actor_side),
        ctx.actor(),
    ));
    if let Some(max_depth) = policy.max_depth {
        fragment.push_sql(format!(" AND hier.{} <= ", escape_identifier("depth")));
        fragment.push_param(Literal::Integer(i64::from(max_depth)));
    }
    fragment.push_sql(")");
    Compiled::Expr(fragment)
}

pub(crate) fn temporal(policy: &TemporalPolicy, ctx: &CompileContext) -> Compiled {
    let mut conditions = Vec::new();

    if let Some(field) = &policy.valid_from_field {
        let op = if policy.valid_from_inclusive { "<=" } else { "<" };
        conditions.push(Fragment::sql(format!("{} {op} {NOW}", ctx.column(field))));
    }

    if let Some(field) = &policy.valid_until_field {
        let op = if policy.valid_until_inclusive { ">=" } else { ">" };
        let column = ctx.column(field);
        conditions.push(Fragment::sql(format!(
            "({column} IS NULL OR {column} {op} {NOW})"
        )));
    }

    match conditions.len() {
        0 => Compiled::Const(true),
        1 => conditions.pop().map_or(Compiled::Const(true), Compiled::Expr),
        _ => Compiled::Expr(Fragment::join(conditions, " AND ").wrap("(", ")")),
    }
}

pub(crate) fn publishable(policy: &PublishablePolicy, ctx: &CompileContext) -> Compiled {
    let published = format!("{} IS TRUE", ctx.column(&policy.is_published_field));

    if !policy.require_published_at {
        return Compiled::Expr(Fragment::sql(published));
    }

    let published_at = ctx.column(&policy.published_at_field);
    Compiled::Expr(Fragment::sql(format!(
        "({published} AND {published_at} IS NOT NULL AND {published_at} <= {NOW})"
    )))
}

pub(crate) fn array_contains_actor(
    policy: &ArrayContainsActorPolicy,
    ctx: &CompileContext,
) -> Compiled {
    Compiled::Expr(Fragment::sql(format!(
        "{} = ANY ({})",
        ctx.actor(),
        ctx.column(&policy.array_field)
    )))
}

pub(crate) fn array_contains_actor_by_join(
    policy: &ArrayContainsActorByJoinPolicy,
    ctx: &CompileContext,
) -> Compiled {
    Compiled::Expr(Fragment::sql(format!(
        "{} = ANY (SELECT owned.{} FROM {} AS owned WHERE {} = ANY (owned.{}))",
        ctx.column(&policy.this_object_key),
        escape_identifier(&policy.owned_table_ref_key),
        qualified_name(&policy.owned_schema, &policy.owned_table),
        ctx.actor(),
        escape_identifier(&policy.owned_table_key),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::node::PolicyNode;
    use serde_json::{json, Value};

    const ACTOR: &str = "jwt_public.current_user_id()";

    fn ctx() -> CompileContext {
        CompileContext::new()
    }

    fn text(node: &PolicyNode) -> String {
        compile(node, &ctx()).unwrap().text
    }

    fn node(value: Value) -> PolicyNode {
        PolicyNode::from_value(value).unwrap()
    }

    #[test]
    fn test_direct_owner() {
        assert_eq!(
            text(&PolicyNode::direct_owner("user_id")),
            format!("\"user_id\" = {ACTOR}")
        );
    }

    #[test]
    fn test_direct_owner_with_alias() {
        let compiled = compile(&PolicyNode::direct_owner("user_id"), &ctx().with_alias("t")).unwrap();
        assert_eq!(compiled.text, format!("\"t\".\"user_id\" = {ACTOR}"));
    }

    #[test]
    fn test_direct_owner_escapes_quotes() {
        assert_eq!(
            text(&PolicyNode::direct_owner("user\"id")),
            format!("\"user\"\"id\" = {ACTOR}")
        );
    }

    #[test]
    fn test_direct_owner_any() {
        let empty = compile(&PolicyNode::direct_owner_any(&[]), &ctx()).unwrap();
        assert!(empty.always_false);

        assert_eq!(
            text(&PolicyNode::direct_owner_any(&["owner_id"])),
            text(&PolicyNode::direct_owner("owner_id"))
        );

        assert_eq!(
            text(&PolicyNode::direct_owner_any(&["f1", "f2"])),
            format!("(\"f1\" = {ACTOR} OR \"f2\" = {ACTOR})")
        );
    }

    #[test]
    fn test_membership_admin() {
        let text = text(&node(json!({
            "Membership": {"membership_type": 1, "is_admin": true}
        })));
        assert_eq!(
            text,
            format!(
                "EXISTS (SELECT 1 FROM \"app_private\".\"app_memberships_sprt\" AS sprt \
                 WHERE sprt.\"actor_id\" = {ACTOR} AND sprt.\"is_admin\" IS TRUE)"
            )
        );
    }

    #[test]
    fn test_membership_unknown_code_and_name() {
        assert!(text(&node(json!({"Membership": {"membership_type": 7}})))
            .contains("\"app_private\".\"type_7_memberships_sprt\""));
        assert!(text(&node(json!({"Membership": {"membership_type": "team"}})))
            .contains("\"app_private\".\"team_memberships_sprt\""));
    }

    #[test]
    fn test_membership_admin_owner_logic() {
        let or_text = text(&node(json!({
            "Membership": {"membership_type": 2, "is_admin": true, "is_owner": true}
        })));
        assert!(or_text.contains("(sprt.\"is_admin\" IS TRUE OR sprt.\"is_owner\" IS TRUE)"));

        let and_text = text(&node(json!({
            "Membership": {
                "membership_type": 2,
                "is_admin": true,
                "is_owner": true,
                "admin_owner_logic": "and"
            }
        })));
        assert!(and_text.contains("(sprt.\"is_admin\" IS TRUE AND sprt.\"is_owner\" IS TRUE)"));
    }

    #[test]
    fn test_membership_permissions_inline() {
        let text = text(&node(json!({
            "Membership": {"membership_type": 3, "permission": "read", "permissions": ["write"]}
        })));
        let mask = "\"app_private\".\"permission_mask\"(ARRAY['read', 'write']::text[])";
        assert!(text.contains(&format!("(sprt.\"permissions\" & {mask}) = {mask}")));
        assert!(text.contains("\"group_memberships_sprt\""));
    }

    #[test]
    fn test_membership_permissions_parameterized() {
        let compiled = compile(
            &node(json!({"Membership": {"membership_type": 1, "permission": "o'k"}})),
            &ctx().parameterized(vec![]),
        )
        .unwrap();

        assert!(compiled.text.contains("\"permission_mask\"($1::text[])) = "));
        assert!(compiled.text.contains("\"permission_mask\"($2::text[])"));
        assert!(!compiled.text.contains("o'k"));
        assert_eq!(compiled.parameters, vec![json!(["o'k"]), json!(["o'k"])]);
    }

    #[test]
    fn test_membership_by_field_default_scope() {
        let text = text(&node(json!({
            "MembershipByField": {"entity_field": "org_id"}
        })));
        assert_eq!(
            text,
            format!(
                "\"org_id\" = ANY (SELECT sprt.\"entity_id\" FROM \"app_private\".\"org_memberships_sprt\" \
                 AS sprt WHERE sprt.\"actor_id\" = {ACTOR})"
            )
        );
    }

    #[test]
    fn test_membership_by_join_explicit() {
        let text = text(&node(json!({
            "MembershipByJoin": {
                "entity_field": "project_id",
                "membership_type": 3,
                "join_schema": "app_public",
                "join_table": "projects",
                "join_field": "group_id"
            }
        })));
        assert_eq!(
            text,
            format!(
                "\"project_id\" = ANY (SELECT jt.\"id\" FROM \"app_public\".\"projects\" AS jt \
                 INNER JOIN \"app_private\".\"group_memberships_sprt\" AS sprt \
                 ON sprt.\"entity_id\" = jt.\"group_id\" WHERE sprt.\"actor_id\" = {ACTOR})"
            )
        );
    }

    #[test]
    fn test_membership_by_join_ids() {
        let policy = node(json!({
            "MembershipByJoin": {
                "entity_field": "project_id",
                "join_table_id": "tbl-1",
                "join_field_id": "fld-9"
            }
        }));
        let context = ctx()
            .with_table_id("tbl-1", QualifiedTable::new("app_public", "projects"))
            .with_field_id("fld-9", "org_id");

        let compiled = compile(&policy, &context).unwrap();
        assert!(compiled.text.contains("FROM \"app_public\".\"projects\" AS jt"));
        assert!(compiled.text.contains("= jt.\"org_id\""));

        let err = compile(&policy, &ctx()).unwrap_err();
        assert!(matches!(err, Error::UnknownTableId(ref id) if id == "tbl-1"));
    }

    #[test]
    fn test_membership_by_join_missing_target() {
        let missing_table = node(json!({
            "MembershipByJoin": {"entity_field": "project_id", "join_field": "org_id"}
        }));
        assert!(matches!(
            compile(&missing_table, &ctx()).unwrap_err(),
            Error::MissingJoinTarget(_)
        ));

        let missing_field = node(json!({
            "MembershipByJoin": {
                "entity_field": "project_id",
                "join_schema": "app_public",
                "join_table": "projects"
            }
        }));
        assert!(matches!(
            compile(&missing_field, &ctx()).unwrap_err(),
            Error::MissingJoinTarget(_)
        ));
    }

    #[test]
    fn test_org_hierarchy_down() {
        let text = text(&node(json!({
            "OrgHierarchy": {"direction": "down", "anchor_field": "owner_id"}
        })));
        assert_eq!(
            text,
            format!(
                "(\"entity_id\", \"owner_id\") IN (SELECT hier.\"entity_id\", hier.\"descendant_id\" \
                 FROM \"app_private\".\"org_hierarchy_closure\" AS hier WHERE hier.\"ancestor_id\" = {ACTOR})"
            )
        );
    }

    #[test]
    fn test_org_hierarchy_up_with_depth() {
        let text = text(&node(json!({
            "OrgHierarchy": {
                "direction": "up",
                "entity_field": "org_id",
                "anchor_field": "manager_id",
                "max_depth": 2
            }
        })));
        assert!(text.starts_with("(\"org_id\", \"manager_id\") IN (SELECT hier.\"entity_id\", hier.\"ancestor_id\""));
        assert!(text.contains(&format!("WHERE hier.\"descendant_id\" = {ACTOR}")));
        assert!(text.ends_with("AND hier.\"depth\" <= 2)"));
    }

    #[test]
    fn test_temporal_from_only() {
        let text = text(&node(json!({"Temporal": {"valid_from_field": "starts_at"}})));
        assert_eq!(text, "\"starts_at\" <= now()");
    }

    #[test]
    fn test_temporal_window() {
        let text = text(&node(json!({
            "Temporal": {"valid_from_field": "starts_at", "valid_until_field": "ends_at"}
        })));
        assert_eq!(
            text,
            "(\"starts_at\" <= now() AND (\"ends_at\" IS NULL OR \"ends_at\" > now()))"
        );
    }

    #[test]
    fn test_temporal_inclusivity_flipped() {
        let text = text(&node(json!({
            "Temporal": {
                "valid_from_field": "starts_at",
                "valid_until_field": "ends_at",
                "valid_from_inclusive": false,
                "valid_until_inclusive": true
            }
        })));
        assert!(text.contains("\"starts_at\" < now()"));
        assert!(text.contains("\"ends_at\" >= now()"));
    }

    #[test]
    fn test_temporal_until_only() {
        let text = text(&node(json!({"Temporal": {"valid_until_field": "expires_at"}})));
        assert_eq!(text, "(\"expires_at\" IS NULL OR \"expires_at\" > now())");
    }

    #[test]
    fn test_publishable_defaults() {
        let text = text(&node(json!({"Publishable": {}})));
        assert_eq!(
            text,
            "(\"is_published\" IS TRUE AND \"published_at\" IS NOT NULL AND \"published_at\" <= now())"
        );
    }

    #[test]
    fn test_publishable_flag_only() {
        let text = text(&node(json!({"Publishable": {"require_published_at": false}})));
        assert_eq!(text, "\"is_published\" IS TRUE");
    }

    #[test]
    fn test_array_contains_actor() {
        let text = text(&node(json!({"ArrayContainsActor": {"array_field": "member_ids"}})));
        assert_eq!(text, format!("{ACTOR} = ANY (\"member_ids\")"));
    }

    #[test]
    fn test_array_contains_actor_by_join() {
        let text = text(&node(json!({
            "ArrayContainsActorByJoin": {
                "owned_schema": "app_public",
                "owned_table": "teams",
                "owned_table_key": "member_ids",
                "owned_table_ref_key": "id",
                "this_object_key": "team_id"
            }
        })));
        assert_eq!(
            text,
            format!(
                "\"team_id\" = ANY (SELECT owned.\"id\" FROM \"app_public\".\"teams\" AS owned \
                 WHERE {ACTOR} = ANY (owned.\"member_ids\"))"
            )
        );
    }
}
