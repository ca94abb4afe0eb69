//! Policy tree to SQL predicate compiler
//!
//! Compilation is pure: the node and context are only read, and the
//! bound parameters are returned alongside the predicate text.
//!
//! Composite nodes compile every argument before folding, so an invalid
//! branch fails compilation even when folding would discard it.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use rls_common::error::{Error, Result};

use crate::context::CompileContext;
use crate::leaves;
use crate::node::{BoolOp, CompositePolicy, PolicyNode};
use crate::sql::Fragment;

/// Compiled predicate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPredicate {
    /// SQL boolean expression
    pub text: String,
    /// Predicate is the constant TRUE
    pub always_true: bool,
    /// Predicate is the constant FALSE
    pub always_false: bool,
    /// Context parameters followed by those bound by this predicate
    pub parameters: Vec<Value>,
}

impl CompiledPredicate {
    fn constant(value: bool, parameters: Vec<Value>) -> Self {
        Self {
            text: if value { "TRUE" } else { "FALSE" }.to_string(),
            always_true: value,
            always_false: !value,
            parameters,
        }
    }
}

/// Intermediate result: a folded constant or an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Compiled {
    Const(bool),
    Expr(Fragment),
}

/// Compile a policy tree into a predicate.
///
/// # Errors
/// Returns `InvalidArity` for a NOT composite without exactly one argument,
/// `MissingJoinTarget`, `UnknownTableId` or `UnknownFieldId` for a
/// `MembershipByJoin` whose join cannot be resolved.
pub fn compile(node: &PolicyNode, context: &CompileContext) -> Result<CompiledPredicate> {
    let compiled = compile_node(node, context)?;
    let mut parameters = context.parameters.clone();

    let predicate = match compiled {
        Compiled::Const(value) => CompiledPredicate::constant(value, parameters),
        Compiled::Expr(fragment) => {
            let text = fragment.render(context.parameterized, &mut parameters);
            CompiledPredicate {
                text,
                always_true: false,
                always_false: false,
                parameters,
            }
        }
    };

    debug!(
        node = node.tag(),
        always_true = predicate.always_true,
        always_false = predicate.always_false,
        parameters = predicate.parameters.len() - context.parameters.len(),
        "compiled policy"
    );

    Ok(predicate)
}

pub(crate) fn compile_node(node: &PolicyNode, ctx: &CompileContext) -> Result<Compiled> {
    trace!(node = node.tag(), "compiling policy node");

    match node {
        PolicyNode::DirectOwner(p) => Ok(leaves::direct_owner(p, ctx)),
        PolicyNode::DirectOwnerAny(p) => Ok(leaves::direct_owner_any(p, ctx)),
        PolicyNode::Membership(p) => Ok(leaves::membership(p, ctx)),
        PolicyNode::MembershipByField(p) => Ok(leaves::membership_by_field(p, ctx)),
        PolicyNode::MembershipByJoin(p) => leaves::membership_by_join(p, ctx),
        PolicyNode::OrgHierarchy(p) => Ok(leaves::org_hierarchy(p, ctx)),
        PolicyNode::Temporal(p) => Ok(leaves::temporal(p, ctx)),
        PolicyNode::Publishable(p) => Ok(leaves::publishable(p, ctx)),
        PolicyNode::ArrayContainsActor(p) => Ok(leaves::array_contains_actor(p, ctx)),
        PolicyNode::ArrayContainsActorByJoin(p) => {
            Ok(leaves::array_contains_actor_by_join(p, ctx))
        }
        PolicyNode::AllowAll => Ok(Compiled::Const(true)),
        PolicyNode::DenyAll => Ok(Compiled::Const(false)),
        PolicyNode::Composite(p) => compile_composite(p, ctx),
    }
}

fn compile_composite(composite: &CompositePolicy, ctx: &CompileContext) -> Result<Compiled> {
    let args = composite
        .args
        .iter()
        .map(|arg| compile_node(arg, ctx))
        .collect::<Result<Vec<_>>>()?;

    match composite.bool_op {
        BoolOp::Not => fold_not(args),
        BoolOp::And | BoolOp::Or => Ok(fold_junction(composite.bool_op, args)),
    }
}

fn fold_not(mut args: Vec<Compiled>) -> Result<Compiled> {
    let arity = args.len();
    match (arity, args.pop()) {
        (1, Some(Compiled::Const(value))) => Ok(Compiled::Const(!value)),
        (1, Some(Compiled::Expr(inner))) => Ok(Compiled::Expr(inner.wrap("NOT (", ")"))),
        _ => Err(Error::InvalidArity {
            op: BoolOp::Not.keyword(),
            expected: 1,
            actual: arity,
        }),
    }
}

/// Fold AND / OR: the absorbing constant wins, identity constants drop out
fn fold_junction(op: BoolOp, args: Vec<Compiled>) -> Compiled {
    // AND: false absorbs, true is the identity. OR is the mirror.
    let absorbing = matches!(op, BoolOp::Or);

    let mut remaining = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Compiled::Const(value) if value == absorbing => return Compiled::Const(absorbing),
            Compiled::Const(_) => {}
            Compiled::Expr(fragment) => remaining.push(fragment),
        }
    }

    match remaining.len() {
        0 => Compiled::Const(!absorbing),
        1 => remaining.pop().map_or(Compiled::Const(!absorbing), Compiled::Expr),
        _ => {
            let separator = format!(" {} ", op.keyword());
            Compiled::Expr(Fragment::join(remaining, &separator).wrap("(", ")"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{MembershipByJoinPolicy, PublishablePolicy, TemporalPolicy};

    fn ctx() -> CompileContext {
        CompileContext::new()
    }

    fn text(node: &PolicyNode) -> String {
        compile(node, &ctx()).unwrap().text
    }

    fn broken_join() -> PolicyNode {
        PolicyNode::MembershipByJoin(MembershipByJoinPolicy {
            entity_field: "project_id".to_string(),
            membership_type: None,
            join_table_id: None,
            join_schema: None,
            join_table: None,
            join_field_id: None,
            join_field: None,
            permission: None,
            permissions: None,
            is_admin: None,
            is_owner: None,
            admin_owner_logic: crate::node::AdminOwnerLogic::Or,
        })
    }

    #[test]
    fn test_constants() {
        let allow = compile(&PolicyNode::AllowAll, &ctx()).unwrap();
        assert_eq!(allow.text, "TRUE");
        assert!(allow.always_true);
        assert!(!allow.always_false);

        let deny = compile(&PolicyNode::DenyAll, &ctx()).unwrap();
        assert_eq!(deny.text, "FALSE");
        assert!(deny.always_false);
        assert!(!deny.always_true);
    }

    #[test]
    fn test_empty_composites() {
        assert!(compile(&PolicyNode::and(vec![]), &ctx()).unwrap().always_true);
        assert!(compile(&PolicyNode::or(vec![]), &ctx()).unwrap().always_false);
    }

    #[test]
    fn test_and_identity() {
        let x = PolicyNode::direct_owner("user_id");
        assert_eq!(
            text(&PolicyNode::and(vec![PolicyNode::AllowAll, x.clone()])),
            text(&x)
        );
    }

    #[test]
    fn test_or_identity() {
        let x = PolicyNode::direct_owner_any(&["a", "b"]);
        assert_eq!(
            text(&PolicyNode::or(vec![PolicyNode::DenyAll, x.clone()])),
            text(&x)
        );
    }

    #[test]
    fn test_and_absorbing() {
        let node = PolicyNode::and(vec![
            PolicyNode::direct_owner("user_id"),
            PolicyNode::DenyAll,
            PolicyNode::Publishable(PublishablePolicy::default()),
        ]);
        let compiled = compile(&node, &ctx()).unwrap();
        assert!(compiled.always_false);
        assert_eq!(compiled.text, "FALSE");
    }

    #[test]
    fn test_or_absorbing() {
        let node = PolicyNode::or(vec![PolicyNode::direct_owner("user_id"), PolicyNode::AllowAll]);
        assert!(compile(&node, &ctx()).unwrap().always_true);
    }

    #[test]
    fn test_not_folding() {
        assert!(compile(&PolicyNode::not(PolicyNode::AllowAll), &ctx())
            .unwrap()
            .always_false);
        assert!(compile(&PolicyNode::not(PolicyNode::DenyAll), &ctx())
            .unwrap()
            .always_true);
        assert_eq!(
            text(&PolicyNode::not(PolicyNode::direct_owner("user_id"))),
            "NOT (\"user_id\" = jwt_public.current_user_id())"
        );
    }

    #[test]
    fn test_not_arity() {
        let node = PolicyNode::Composite(CompositePolicy {
            bool_op: BoolOp::Not,
            args: vec![PolicyNode::AllowAll, PolicyNode::DenyAll],
        });
        let err = compile(&node, &ctx()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidArity {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let empty = PolicyNode::Composite(CompositePolicy {
            bool_op: BoolOp::Not,
            args: vec![],
        });
        assert!(matches!(
            compile(&empty, &ctx()).unwrap_err(),
            Error::InvalidArity { actual: 0, .. }
        ));
    }

    #[test]
    fn test_and_join() {
        let node = PolicyNode::and(vec![
            PolicyNode::direct_owner("a"),
            PolicyNode::AllowAll,
            PolicyNode::direct_owner("b"),
        ]);
        assert_eq!(
            text(&node),
            "(\"a\" = jwt_public.current_user_id() AND \"b\" = jwt_public.current_user_id())"
        );
    }

    #[test]
    fn test_nested_folding() {
        // OR(AND(DenyAll, x), NOT(DenyAll)) folds to TRUE
        let node = PolicyNode::or(vec![
            PolicyNode::and(vec![PolicyNode::DenyAll, PolicyNode::direct_owner("a")]),
            PolicyNode::not(PolicyNode::DenyAll),
        ]);
        assert!(compile(&node, &ctx()).unwrap().always_true);
    }

    #[test]
    fn test_dead_branch_errors_surface() {
        let node = PolicyNode::and(vec![PolicyNode::DenyAll, broken_join()]);
        let err = compile(&node, &ctx()).unwrap_err();
        assert!(matches!(err, Error::MissingJoinTarget(_)));
    }

    #[test]
    fn test_dead_branch_parameters_dropped() {
        let depth_limited = PolicyNode::OrgHierarchy(crate::node::OrgHierarchyPolicy {
            direction: crate::node::HierarchyDirection::Down,
            entity_field: "entity_id".to_string(),
            anchor_field: "owner_id".to_string(),
            max_depth: Some(2),
        });
        let node = PolicyNode::or(vec![
            PolicyNode::and(vec![depth_limited.clone(), PolicyNode::DenyAll]),
            depth_limited,
        ]);

        let compiled = compile(&node, &ctx().parameterized(vec![])).unwrap();
        assert_eq!(compiled.parameters, vec![Value::from(2)]);
        assert!(compiled.text.contains("$1::integer"));
        assert!(!compiled.text.contains("$2"));
    }

    #[test]
    fn test_context_parameters_preserved() {
        let compiled = compile(
            &PolicyNode::AllowAll,
            &ctx().parameterized(vec![Value::from("outer")]),
        )
        .unwrap();
        assert_eq!(compiled.parameters, vec![Value::from("outer")]);
    }

    #[test]
    fn test_temporal_without_fields_is_true() {
        let node = PolicyNode::Temporal(TemporalPolicy::default());
        assert!(compile(&node, &ctx()).unwrap().always_true);

        let node = PolicyNode::and(vec![
            PolicyNode::Temporal(TemporalPolicy::default()),
            PolicyNode::direct_owner("a"),
        ]);
        assert_eq!(text(&node), "\"a\" = jwt_public.current_user_id()");
    }
}
