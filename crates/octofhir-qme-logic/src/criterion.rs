//! Criterion expression tree
//!
//! A `Criterion` is the predicate language a measure uses to decide category
//! membership for one record. It can be written as text (see the parser) or
//! as an externally tagged JSON tree:
//!
//! ```json
//! {"and": [{"compare": {"op": ">=", "left": {"field": "age"}, "right": {"literal": 18}}},
//!          {"category": "population"}]}
//! ```

use octofhir_qme_types::{Category, QmeValue};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Dotted path into a record document (or into a query alias)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FieldPath(SmallVec<[String; 4]>);

impl FieldPath {
    /// Build from segments; panics on an empty segment list
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        let segments: SmallVec<[String; 4]> = segments.into_iter().map(Into::into).collect();
        assert!(!segments.is_empty(), "field path needs at least one segment");
        Self(segments)
    }

    /// Parse `a.b.c`
    pub fn parse(path: &str) -> Option<Self> {
        let segments: SmallVec<[String; 4]> = path.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn head(&self) -> &str {
        &self.0[0]
    }

    /// Segments after the first
    pub fn tail(&self) -> &[String] {
        &self.0[1..]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for FieldPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&value).ok_or_else(|| format!("invalid field path '{}'", value))
    }
}

/// A predicate or value expression over one patient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Constant value
    #[serde(with = "json_literal")]
    Literal(QmeValue),
    /// Record field (or alias field inside `any`)
    Field(FieldPath),
    /// Measure parameter, bound at compile time
    Parameter(String),
    /// Membership of the current record in an earlier category
    Category(Category),
    Not(Box<Criterion>),
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    Compare {
        op: CompareOp,
        left: Box<Criterion>,
        right: Box<Criterion>,
    },
    /// `item in collection`
    In {
        item: Box<Criterion>,
        collection: Box<Criterion>,
    },
    /// Regular expression match on a string operand
    Matches {
        operand: Box<Criterion>,
        pattern: String,
    },
    /// Non-null and, for lists, non-empty
    Exists(Box<Criterion>),
    /// Length of a list (null counts as zero)
    Count(Box<Criterion>),
    /// Whole years between two dates
    AgeAt {
        birth: Box<Criterion>,
        at: Box<Criterion>,
    },
    /// True if any element of `source` satisfies `condition`, with the element
    /// bound to `alias`
    Any {
        alias: String,
        source: Box<Criterion>,
        condition: Box<Criterion>,
    },
    List(Vec<Criterion>),
}

impl Criterion {
    pub fn literal(value: impl Into<QmeValue>) -> Self {
        Criterion::Literal(value.into())
    }

    /// Field reference from a dotted path
    pub fn field(path: &str) -> Self {
        Criterion::Field(FieldPath::new(path.split('.')))
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Criterion::Parameter(name.into())
    }

    pub fn category(category: Category) -> Self {
        Criterion::Category(category)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Criterion) -> Self {
        Criterion::Not(Box::new(operand))
    }

    pub fn and(operands: impl IntoIterator<Item = Criterion>) -> Self {
        Criterion::And(operands.into_iter().collect())
    }

    pub fn or(operands: impl IntoIterator<Item = Criterion>) -> Self {
        Criterion::Or(operands.into_iter().collect())
    }

    pub fn compare(op: CompareOp, left: Criterion, right: Criterion) -> Self {
        Criterion::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn contains(collection: Criterion, item: Criterion) -> Self {
        Criterion::In {
            item: Box::new(item),
            collection: Box::new(collection),
        }
    }

    pub fn exists(operand: Criterion) -> Self {
        Criterion::Exists(Box::new(operand))
    }

    /// Categories referenced anywhere in this criterion
    pub fn referenced_categories(&self) -> Vec<Category> {
        let mut out = Vec::new();
        self.walk(&mut |c| {
            if let Criterion::Category(category) = c {
                if !out.contains(category) {
                    out.push(*category);
                }
            }
        });
        out
    }

    /// Parameter names referenced anywhere in this criterion
    pub fn referenced_parameters(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.walk(&mut |c| {
            if let Criterion::Parameter(name) = c {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        });
        out
    }

    /// Pre-order traversal
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Criterion)) {
        visit(self);
        match self {
            Criterion::Literal(_)
            | Criterion::Field(_)
            | Criterion::Parameter(_)
            | Criterion::Category(_) => {}
            Criterion::Not(e) | Criterion::Exists(e) | Criterion::Count(e) => e.walk(visit),
            Criterion::And(items) | Criterion::Or(items) | Criterion::List(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            Criterion::Compare { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Criterion::In { item, collection } => {
                item.walk(visit);
                collection.walk(visit);
            }
            Criterion::Matches { operand, .. } => operand.walk(visit),
            Criterion::AgeAt { birth, at } => {
                birth.walk(visit);
                at.walk(visit);
            }
            Criterion::Any {
                source, condition, ..
            } => {
                source.walk(visit);
                condition.walk(visit);
            }
        }
    }
}

/// Renders the criterion in the text syntax accepted by the parser
impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Literal(value) => write!(f, "{}", value),
            Criterion::Field(path) => write!(f, "{}", path),
            Criterion::Parameter(name) => write!(f, "${}", name),
            Criterion::Category(category) => write!(f, "{}", category),
            Criterion::Not(e) => write!(f, "not {}", Parenthesized(e)),
            Criterion::And(items) => write_joined(f, items, " and "),
            Criterion::Or(items) => write_joined(f, items, " or "),
            Criterion::Compare { op, left, right } => {
                write!(f, "{} {} {}", Parenthesized(left), op, Parenthesized(right))
            }
            Criterion::In { item, collection } => {
                write!(f, "{} in {}", Parenthesized(item), Parenthesized(collection))
            }
            Criterion::Matches { operand, pattern } => write!(
                f,
                "{} matches {}",
                Parenthesized(operand),
                QmeValue::from(pattern.as_str())
            ),
            Criterion::Exists(e) => write!(f, "exists {}", Parenthesized(e)),
            Criterion::Count(e) => write!(f, "count({})", e),
            Criterion::AgeAt { birth, at } => write!(f, "age_at({}, {})", birth, at),
            Criterion::Any {
                alias,
                source,
                condition,
            } => write!(
                f,
                "(any {} in {} where {})",
                alias,
                Parenthesized(source),
                condition
            ),
            Criterion::List(items) => {
                write!(f, "[")?;
                write_joined(f, items, ", ")?;
                write!(f, "]")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Criterion], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", Parenthesized(item))?;
    }
    Ok(())
}

/// Wraps compound operands in parentheses when displayed
struct Parenthesized<'a>(&'a Criterion);

impl fmt::Display for Parenthesized<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Criterion::And(_)
            | Criterion::Or(_)
            | Criterion::Not(_)
            | Criterion::Compare { .. }
            | Criterion::In { .. }
            | Criterion::Matches { .. }
            | Criterion::Exists(_) => write!(f, "({})", self.0),
            other => write!(f, "{}", other),
        }
    }
}

/// Literals are stored as plain JSON in definition documents
mod json_literal {
    use octofhir_qme_types::QmeValue;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &QmeValue, serializer: S) -> Result<S::Ok, S::Error> {
        value.to_json().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QmeValue, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(QmeValue::from_json(&json))
    }
}
