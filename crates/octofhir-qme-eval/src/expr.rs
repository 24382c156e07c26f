//! Bound criteria and their evaluation against one record
//!
//! All logical operators use three-valued logic: `and` is false as soon as
//! any operand is false, `or` is true as soon as any operand is true, and
//! null propagates otherwise.

use crate::error::EvalError;
use chrono::{Datelike, NaiveDate};
use octofhir_qme_logic::CompareOp;
use octofhir_qme_model::PatientRecord;
use octofhir_qme_types::{Category, QmeValue};
use regex::Regex;
use std::cmp::Ordering;

pub(crate) type EvalResult<T> = Result<T, EvalError>;

/// A criterion with parameters substituted and aliases resolved to slots
#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Const(QmeValue),
    /// Record field path
    Field(Vec<String>),
    /// Field of an `any` element bound at `slot`
    Local { slot: usize, path: Vec<String> },
    Category(Category),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    In {
        item: Box<Expr>,
        collection: Box<Expr>,
    },
    Matches {
        operand: Box<Expr>,
        regex: Regex,
    },
    Exists(Box<Expr>),
    Count(Box<Expr>),
    AgeAt {
        birth: Box<Expr>,
        at: Box<Expr>,
    },
    Any {
        source: Box<Expr>,
        slot: usize,
        condition: Box<Expr>,
    },
    List(Vec<Expr>),
}

/// Per-record evaluation state
pub(crate) struct Frame<'r> {
    record: &'r PatientRecord,
    /// Categories already decided for this record
    members: Vec<Category>,
    locals: Vec<QmeValue>,
}

impl<'r> Frame<'r> {
    pub(crate) fn new(record: &'r PatientRecord) -> Self {
        Self {
            record,
            members: Vec::with_capacity(Category::ALL.len()),
            locals: Vec::new(),
        }
    }

    pub(crate) fn admit(&mut self, category: Category) {
        self.members.push(category);
    }

    pub(crate) fn is_member(&self, category: Category) -> bool {
        self.members.contains(&category)
    }

    pub(crate) fn into_members(self) -> Vec<Category> {
        self.members
    }
}

impl Expr {
    /// Membership test: anything but `true` is non-membership
    pub(crate) fn holds(&self, frame: &mut Frame<'_>) -> EvalResult<bool> {
        Ok(self.eval(frame)?.is_true())
    }

    pub(crate) fn eval(&self, frame: &mut Frame<'_>) -> EvalResult<QmeValue> {
        match self {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Field(path) => Ok(frame
                .record
                .field(path)
                .map(QmeValue::from_json)
                .unwrap_or(QmeValue::Null)),
            Expr::Local { slot, path } => Ok(frame
                .locals
                .get(*slot)
                .map(|value| descend(value, path))
                .unwrap_or(QmeValue::Null)),
            Expr::Category(category) => Ok(QmeValue::Boolean(frame.is_member(*category))),
            Expr::Not(operand) => match operand.eval(frame)? {
                QmeValue::Null => Ok(QmeValue::Null),
                QmeValue::Boolean(b) => Ok(QmeValue::Boolean(!b)),
                other => Err(EvalError::type_mismatch("not", "Boolean", other.type_name())),
            },
            Expr::And(operands) => eval_and(operands, frame),
            Expr::Or(operands) => eval_or(operands, frame),
            Expr::Compare { op, left, right } => {
                let left = left.eval(frame)?;
                let right = right.eval(frame)?;
                eval_compare(*op, &left, &right)
            }
            Expr::In { item, collection } => {
                let item = item.eval(frame)?;
                let collection = collection.eval(frame)?;
                eval_in(&item, &collection)
            }
            Expr::Matches { operand, regex } => match operand.eval(frame)? {
                QmeValue::Null => Ok(QmeValue::Null),
                QmeValue::String(s) => Ok(QmeValue::Boolean(regex.is_match(&s))),
                other => Err(EvalError::type_mismatch("matches", "String", other.type_name())),
            },
            Expr::Exists(operand) => Ok(QmeValue::Boolean(match operand.eval(frame)? {
                QmeValue::Null => false,
                QmeValue::List(items) => !items.is_empty(),
                _ => true,
            })),
            Expr::Count(operand) => match operand.eval(frame)? {
                QmeValue::Null => Ok(QmeValue::Integer(0)),
                QmeValue::List(items) => Ok(QmeValue::Integer(items.len() as i64)),
                other => Err(EvalError::type_mismatch("count", "List", other.type_name())),
            },
            Expr::AgeAt { birth, at } => {
                let birth = birth.eval(frame)?;
                let at = at.eval(frame)?;
                eval_age_at(&birth, &at)
            }
            Expr::Any {
                source,
                slot,
                condition,
            } => eval_any(source, *slot, condition, frame),
            Expr::List(items) => items
                .iter()
                .map(|item| item.eval(frame))
                .collect::<EvalResult<Vec<_>>>()
                .map(QmeValue::List),
        }
    }
}

fn eval_and(operands: &[Expr], frame: &mut Frame<'_>) -> EvalResult<QmeValue> {
    let mut saw_null = false;
    for operand in operands {
        match operand.eval(frame)? {
            QmeValue::Boolean(false) => return Ok(QmeValue::Boolean(false)),
            QmeValue::Boolean(true) => {}
            QmeValue::Null => saw_null = true,
            other => return Err(EvalError::type_mismatch("and", "Boolean", other.type_name())),
        }
    }
    Ok(if saw_null {
        QmeValue::Null
    } else {
        QmeValue::Boolean(true)
    })
}

fn eval_or(operands: &[Expr], frame: &mut Frame<'_>) -> EvalResult<QmeValue> {
    let mut saw_null = false;
    for operand in operands {
        match operand.eval(frame)? {
            QmeValue::Boolean(true) => return Ok(QmeValue::Boolean(true)),
            QmeValue::Boolean(false) => {}
            QmeValue::Null => saw_null = true,
            other => return Err(EvalError::type_mismatch("or", "Boolean", other.type_name())),
        }
    }
    Ok(if saw_null {
        QmeValue::Null
    } else {
        QmeValue::Boolean(false)
    })
}

fn eval_compare(op: CompareOp, left: &QmeValue, right: &QmeValue) -> EvalResult<QmeValue> {
    let result = match op {
        CompareOp::Equal => left.equals(right)?,
        CompareOp::NotEqual => left.equals(right)?.map(|eq| !eq),
        _ => left.compare(right)?.map(|ordering| match op {
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::Greater => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        }),
    };
    Ok(result.map(QmeValue::Boolean).unwrap_or(QmeValue::Null))
}

fn eval_in(item: &QmeValue, collection: &QmeValue) -> EvalResult<QmeValue> {
    let items = match collection {
        QmeValue::Null => return Ok(QmeValue::Null),
        QmeValue::List(items) => items,
        other => return Err(EvalError::type_mismatch("in", "List", other.type_name())),
    };
    if item.is_null() {
        return Ok(QmeValue::Null);
    }

    let mut saw_null = false;
    for candidate in items {
        match item.equals(candidate)? {
            Some(true) => return Ok(QmeValue::Boolean(true)),
            Some(false) => {}
            None => saw_null = true,
        }
    }
    Ok(if saw_null {
        QmeValue::Null
    } else {
        QmeValue::Boolean(false)
    })
}

fn eval_age_at(birth: &QmeValue, at: &QmeValue) -> EvalResult<QmeValue> {
    if birth.is_null() || at.is_null() {
        return Ok(QmeValue::Null);
    }
    let birth = as_date(birth)?;
    let at = as_date(at)?;
    Ok(QmeValue::Integer(whole_years(birth, at)))
}

fn as_date(value: &QmeValue) -> EvalResult<NaiveDate> {
    match value {
        QmeValue::String(s) => Ok(octofhir_qme_types::parse_date(s)?),
        other => other
            .as_date()
            .ok_or_else(|| EvalError::type_mismatch("age_at", "Date", other.type_name())),
    }
}

/// Completed years from `birth` to `at`; negative when `at` precedes `birth`
pub(crate) fn whole_years(birth: NaiveDate, at: NaiveDate) -> i64 {
    let mut years = i64::from(at.year() - birth.year());
    if (at.month(), at.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years
}

fn eval_any(
    source: &Expr,
    slot: usize,
    condition: &Expr,
    frame: &mut Frame<'_>,
) -> EvalResult<QmeValue> {
    let items = match source.eval(frame)? {
        QmeValue::Null => return Ok(QmeValue::Boolean(false)),
        QmeValue::List(items) => items,
        other => return Err(EvalError::type_mismatch("any", "List", other.type_name())),
    };

    debug_assert_eq!(frame.locals.len(), slot);
    let mut saw_null = false;
    let mut result = Ok(None);
    for item in items {
        frame.locals.push(item);
        let outcome = condition.eval(frame);
        frame.locals.pop();
        match outcome {
            Ok(QmeValue::Boolean(true)) => {
                result = Ok(Some(true));
                break;
            }
            Ok(QmeValue::Null) => saw_null = true,
            Ok(_) => {}
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    match result? {
        Some(true) => Ok(QmeValue::Boolean(true)),
        _ if saw_null => Ok(QmeValue::Null),
        _ => Ok(QmeValue::Boolean(false)),
    }
}

fn descend(value: &QmeValue, path: &[String]) -> QmeValue {
    let mut current = value;
    for segment in path {
        match current.as_object().and_then(|map| map.get(segment)) {
            Some(next) => current = next,
            None => return QmeValue::Null,
        }
    }
    current.clone()
}
