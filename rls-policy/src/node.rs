//! Policy tree taxonomy
//!
//! A [`PolicyNode`] is a closed sum type: every variant carries exactly
//! the payload it needs and nothing else. Nodes are plain immutable
//! values, built by configuration code and compiled on demand.
//!
//! The serialized form is externally tagged, one key per node:
//!
//! ```json
//! { "Composite": { "bool_op": "OR", "args": [
//!     { "DirectOwner": { "entity_field": "owner_id" } },
//!     "AllowAll"
//! ] } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

use rls_common::error::{Error, Result};

/// Node of a row-level policy tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyNode {
    /// Row column equals the current actor
    DirectOwner(DirectOwnerPolicy),
    /// Any of several row columns equals the current actor
    DirectOwnerAny(DirectOwnerAnyPolicy),
    /// Actor holds a membership in a scope
    Membership(MembershipPolicy),
    /// Actor holds a membership on the entity referenced by a row column
    MembershipByField(MembershipByFieldPolicy),
    /// Like `MembershipByField`, resolved through an intermediate table
    MembershipByJoin(MembershipByJoinPolicy),
    /// Actor is linked to the row through the organization closure table
    OrgHierarchy(OrgHierarchyPolicy),
    /// Row is inside its validity window
    Temporal(TemporalPolicy),
    /// Row is published
    Publishable(PublishablePolicy),
    /// Actor is a member of an array column on the row
    ArrayContainsActor(ArrayContainsActorPolicy),
    /// Actor is a member of an array column on a related table
    ArrayContainsActorByJoin(ArrayContainsActorByJoinPolicy),
    AllowAll,
    DenyAll,
    /// Boolean combination of child policies
    Composite(CompositePolicy),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectOwnerPolicy {
    pub entity_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectOwnerAnyPolicy {
    #[serde(default)]
    pub entity_fields: Vec<String>,
}

/// Membership scope, either a numeric code or a scope name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MembershipType {
    Code(i64),
    Name(String),
}

impl MembershipType {
    pub const APP: MembershipType = MembershipType::Code(1);
    pub const ORG: MembershipType = MembershipType::Code(2);
    pub const GROUP: MembershipType = MembershipType::Code(3);

    /// Scope name used to locate the membership-reference table
    #[must_use]
    pub fn scope_name(&self) -> Cow<'_, str> {
        match self {
            MembershipType::Code(1) => Cow::Borrowed("app"),
            MembershipType::Code(2) => Cow::Borrowed("org"),
            MembershipType::Code(3) => Cow::Borrowed("group"),
            MembershipType::Code(code) => Cow::Owned(format!("type_{code}")),
            MembershipType::Name(name) => Cow::Borrowed(name),
        }
    }
}

impl Default for MembershipType {
    fn default() -> Self {
        Self::ORG
    }
}

/// How `is_admin` and `is_owner` combine when both are requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminOwnerLogic {
    And,
    #[default]
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipPolicy {
    pub membership_type: MembershipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_owner: Option<bool>,
    #[serde(default)]
    pub admin_owner_logic: AdminOwnerLogic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipByFieldPolicy {
    pub entity_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_type: Option<MembershipType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_owner: Option<bool>,
    #[serde(default)]
    pub admin_owner_logic: AdminOwnerLogic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipByJoinPolicy {
    pub entity_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_type: Option<MembershipType>,
    /// Opaque table id, resolved through the compile context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<String>,
    /// Opaque field id, resolved through the compile context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_owner: Option<bool>,
    #[serde(default)]
    pub admin_owner_logic: AdminOwnerLogic,
}

/// Membership constraints shared by the three membership variants
#[derive(Debug, Clone, Copy)]
pub struct MembershipCriteria<'a> {
    pub permission: Option<&'a str>,
    pub permissions: &'a [String],
    pub is_admin: bool,
    pub is_owner: bool,
    pub admin_owner_logic: AdminOwnerLogic,
}

impl MembershipCriteria<'_> {
    /// Requested permission names, deduplicated, in declaration order
    #[must_use]
    pub fn permission_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .permission
            .into_iter()
            .chain(self.permissions.iter().map(String::as_str))
        {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

macro_rules! membership_criteria {
    ($($policy:ty),+) => {
        $(
            impl $policy {
                #[must_use]
                pub fn criteria(&self) -> MembershipCriteria<'_> {
                    MembershipCriteria {
                        permission: self.permission.as_deref(),
                        permissions: self.permissions.as_deref().unwrap_or_default(),
                        is_admin: self.is_admin == Some(true),
                        is_owner: self.is_owner == Some(true),
                        admin_owner_logic: self.admin_owner_logic,
                    }
                }
            }
        )+
    };
}

membership_criteria!(MembershipPolicy, MembershipByFieldPolicy, MembershipByJoinPolicy);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyDirection {
    /// Subordinate sees managers
    Up,
    /// Manager sees subordinates
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrgHierarchyPolicy {
    pub direction: HierarchyDirection,
    #[serde(default = "default_entity_field")]
    pub entity_field: String,
    pub anchor_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
}

fn default_entity_field() -> String {
    "entity_id".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemporalPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until_field: Option<String>,
    #[serde(default = "default_true")]
    pub valid_from_inclusive: bool,
    #[serde(default)]
    pub valid_until_inclusive: bool,
}

impl Default for TemporalPolicy {
    fn default() -> Self {
        Self {
            valid_from_field: None,
            valid_until_field: None,
            valid_from_inclusive: true,
            valid_until_inclusive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishablePolicy {
    #[serde(default = "default_is_published_field")]
    pub is_published_field: String,
    #[serde(default = "default_published_at_field")]
    pub published_at_field: String,
    #[serde(default = "default_true")]
    pub require_published_at: bool,
}

impl Default for PublishablePolicy {
    fn default() -> Self {
        Self {
            is_published_field: default_is_published_field(),
            published_at_field: default_published_at_field(),
            require_published_at: true,
        }
    }
}

fn default_is_published_field() -> String {
    "is_published".to_string()
}

fn default_published_at_field() -> String {
    "published_at".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrayContainsActorPolicy {
    pub array_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrayContainsActorByJoinPolicy {
    pub owned_schema: String,
    pub owned_table: String,
    /// Array column on the owned table holding actor ids
    pub owned_table_key: String,
    /// Column on the owned table referencing this row
    pub owned_table_ref_key: String,
    /// Column on this row referenced by the owned table
    pub this_object_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    #[serde(rename = "AND", alias = "AND_EXPR")]
    And,
    #[serde(rename = "OR", alias = "OR_EXPR")]
    Or,
    #[serde(rename = "NOT", alias = "NOT_EXPR")]
    Not,
}

impl BoolOp {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
            BoolOp::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositePolicy {
    pub bool_op: BoolOp,
    #[serde(default)]
    pub args: Vec<PolicyNode>,
}

impl PolicyNode {
    /// Every tag of the taxonomy, as written in configuration
    pub const TAGS: [&'static str; 13] = [
        "DirectOwner",
        "DirectOwnerAny",
        "Membership",
        "MembershipByField",
        "MembershipByJoin",
        "OrgHierarchy",
        "Temporal",
        "Publishable",
        "ArrayContainsActor",
        "ArrayContainsActorByJoin",
        "AllowAll",
        "DenyAll",
        "Composite",
    ];

    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            PolicyNode::DirectOwner(_) => "DirectOwner",
            PolicyNode::DirectOwnerAny(_) => "DirectOwnerAny",
            PolicyNode::Membership(_) => "Membership",
            PolicyNode::MembershipByField(_) => "MembershipByField",
            PolicyNode::MembershipByJoin(_) => "MembershipByJoin",
            PolicyNode::OrgHierarchy(_) => "OrgHierarchy",
            PolicyNode::Temporal(_) => "Temporal",
            PolicyNode::Publishable(_) => "Publishable",
            PolicyNode::ArrayContainsActor(_) => "ArrayContainsActor",
            PolicyNode::ArrayContainsActorByJoin(_) => "ArrayContainsActorByJoin",
            PolicyNode::AllowAll => "AllowAll",
            PolicyNode::DenyAll => "DenyAll",
            PolicyNode::Composite(_) => "Composite",
        }
    }

    /// Build a node from its serialized form.
    ///
    /// # Errors
    /// Returns `UnsupportedNodeType` when any node in the tree carries a tag
    /// outside the taxonomy, and `InvalidPolicy` for malformed payloads.
    pub fn from_value(value: Value) -> Result<Self> {
        check_tags(&value)?;
        serde_json::from_value(value).map_err(|e| Error::InvalidPolicy(e.to_string()))
    }

    /// Parse a node from JSON text.
    ///
    /// # Errors
    /// See [`PolicyNode::from_value`].
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn direct_owner(entity_field: &str) -> Self {
        PolicyNode::DirectOwner(DirectOwnerPolicy {
            entity_field: entity_field.to_string(),
        })
    }

    pub fn direct_owner_any(entity_fields: &[&str]) -> Self {
        PolicyNode::DirectOwnerAny(DirectOwnerAnyPolicy {
            entity_fields: entity_fields.iter().map(|f| (*f).to_string()).collect(),
        })
    }

    pub fn and(args: Vec<PolicyNode>) -> Self {
        PolicyNode::Composite(CompositePolicy {
            bool_op: BoolOp::And,
            args,
        })
    }

    pub fn or(args: Vec<PolicyNode>) -> Self {
        PolicyNode::Composite(CompositePolicy {
            bool_op: BoolOp::Or,
            args,
        })
    }

    pub fn not(arg: PolicyNode) -> Self {
        PolicyNode::Composite(CompositePolicy {
            bool_op: BoolOp::Not,
            args: vec![arg],
        })
    }
}

/// Walk a serialized tree and reject tags outside the taxonomy
fn check_tags(value: &Value) -> Result<()> {
    let (tag, payload) = match value {
        Value::String(tag) => (tag.as_str(), None),
        Value::Object(map) if map.len() == 1 => match map.iter().next() {
            Some((tag, payload)) => (tag.as_str(), Some(payload)),
            None => return Err(Error::InvalidPolicy("empty policy node".to_string())),
        },
        other => {
            return Err(Error::InvalidPolicy(format!(
                "expected a tag or a single-key object, got {other}"
            )))
        }
    };

    if !PolicyNode::TAGS.contains(&tag) {
        return Err(Error::UnsupportedNodeType(tag.to_string()));
    }

    if tag == "Composite" {
        if let Some(args) = payload.and_then(|p| p.get("args")).and_then(Value::as_array) {
            for arg in args {
                check_tags(arg)?;
            }
        }
    }

    Ok(())
}
