//! SQL escaping and predicate fragments

use serde_json::Value;

/// Quote an identifier, doubling embedded double quotes
#[must_use]
pub fn escape_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes
#[must_use]
pub fn escape_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"schema"."table"`
#[must_use]
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", escape_identifier(schema), escape_identifier(table))
}

/// Literal value embedded in a predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer(i64),
    TextArray(Vec<String>),
}

impl Literal {
    /// Inline SQL form
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Literal::Integer(n) => n.to_string(),
            Literal::TextArray(items) => {
                let items: Vec<String> = items.iter().map(|s| escape_literal(s)).collect();
                format!("ARRAY[{}]::text[]", items.join(", "))
            }
        }
    }

    /// Placeholder form, with a cast so the planner knows the type
    #[must_use]
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Literal::Integer(_) => format!("${position}::integer"),
            Literal::TextArray(_) => format!("${position}::text[]"),
        }
    }

    /// Bound parameter value
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Integer(n) => Value::from(*n),
            Literal::TextArray(items) => Value::from(items.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Sql(String),
    Param(Literal),
}

/// Predicate text with literals kept apart until rendering.
///
/// Placeholders are numbered only when the final predicate is rendered,
/// so fragments discarded by constant folding never leave gaps or
/// unused parameters behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    segments: Vec<Segment>,
}

impl Fragment {
    pub fn sql(text: impl Into<String>) -> Self {
        let mut fragment = Self::default();
        fragment.push_sql(text);
        fragment
    }

    pub fn push_sql(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if let Some(Segment::Sql(last)) = self.segments.last_mut() {
            last.push_str(&text);
        } else {
            self.segments.push(Segment::Sql(text));
        }
        self
    }

    pub fn push_param(&mut self, literal: Literal) -> &mut Self {
        self.segments.push(Segment::Param(literal));
        self
    }

    pub fn append(&mut self, other: Fragment) -> &mut Self {
        for segment in other.segments {
            match segment {
                Segment::Sql(text) => {
                    self.push_sql(text);
                }
                param @ Segment::Param(_) => self.segments.push(param),
            }
        }
        self
    }

    /// Join fragments with a separator
    #[must_use]
    pub fn join(fragments: Vec<Fragment>, separator: &str) -> Self {
        let mut joined = Fragment::default();
        for (i, fragment) in fragments.into_iter().enumerate() {
            if i > 0 {
                joined.push_sql(separator);
            }
            joined.append(fragment);
        }
        joined
    }

    /// Surround with prefix and suffix text
    #[must_use]
    pub fn wrap(self, prefix: &str, suffix: &str) -> Self {
        let mut wrapped = Fragment::sql(prefix);
        wrapped.append(self);
        wrapped.push_sql(suffix);
        wrapped
    }

    /// Produce SQL text.
    ///
    /// When `parameterized`, each literal is appended to `parameters` and
    /// replaced by its 1-based position; otherwise literals are inlined.
    pub fn render(self, parameterized: bool, parameters: &mut Vec<Value>) -> String {
        let mut text = String::new();
        for segment in self.segments {
            match segment {
                Segment::Sql(sql) => text.push_str(&sql),
                Segment::Param(literal) if parameterized => {
                    parameters.push(literal.to_value());
                    text.push_str(&literal.placeholder(parameters.len()));
                }
                Segment::Param(literal) => text.push_str(&literal.to_sql()),
            }
        }
        text
    }
}
