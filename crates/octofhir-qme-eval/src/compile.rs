//! Binding measure logic and parameters into a classifier

use crate::classifier::MeasureClassifier;
use crate::error::CompileError;
use crate::expr::Expr;
use crate::merge::UnionMerger;
use octofhir_qme_logic::{Criterion, MeasureLogic, ParameterDecl, ParameterType};
use octofhir_qme_model::MeasureDefinition;
use octofhir_qme_types::{Category, ParameterValues, QmeValue, parse_date};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// Order in which categories are decided for a record.
///
/// A criterion may only reference categories that precede its own.
pub const EVALUATION_ORDER: [Category; 5] = [
    Category::Population,
    Category::Denominator,
    Category::Numerator,
    Category::Exclusions,
    Category::Antinumerator,
];

fn position(category: Category) -> usize {
    EVALUATION_ORDER
        .iter()
        .position(|c| *c == category)
        .unwrap_or(EVALUATION_ORDER.len())
}

/// Compiles measure definitions into classifiers.
///
/// Compilation is pure: the same definition and parameters always produce
/// classifiers that behave identically.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriteriaCompiler;

impl CriteriaCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile a definition into its classifier and merger
    pub fn compile(
        &self,
        definition: &MeasureDefinition,
        params: &ParameterValues,
    ) -> Result<(MeasureClassifier, UnionMerger), CompileError> {
        let classifier = self.compile_logic(&definition.logic, params)?;
        Ok((classifier.with_key(definition.key().to_string()), UnionMerger))
    }

    /// Compile bare logic (no definition metadata)
    pub fn compile_logic(
        &self,
        logic: &MeasureLogic,
        params: &ParameterValues,
    ) -> Result<MeasureClassifier, CompileError> {
        let bound = bind_parameters(logic, params)?;

        let compile = |category: Category| -> Result<Option<Expr>, CompileError> {
            let Some(source) = logic.source(category) else {
                return Ok(None);
            };
            let criterion = source
                .resolve()
                .map_err(|source| CompileError::Parse { category, source })?;
            check_category_references(category, &criterion)?;

            let mut binder = Binder {
                category,
                logic,
                bound: &bound,
                aliases: Vec::new(),
            };
            binder.bind(&criterion).map(Some)
        };

        let population = compile(Category::Population)?;
        let denominator = compile(Category::Denominator)?;
        let numerator = compile(Category::Numerator)?;
        let exclusions = compile(Category::Exclusions)?;
        let antinumerator = compile(Category::Antinumerator)?;

        Ok(MeasureClassifier {
            key: String::new(),
            // population and numerator are mandatory in `MeasureLogic`
            population: population.unwrap_or(Expr::Const(QmeValue::Boolean(false))),
            denominator,
            numerator: numerator.unwrap_or(Expr::Const(QmeValue::Boolean(false))),
            exclusions,
            antinumerator,
            exclusion_scope: logic.exclusion_scope,
        })
    }
}

fn check_category_references(category: Category, criterion: &Criterion) -> Result<(), CompileError> {
    let limit = position(category);
    match criterion
        .referenced_categories()
        .into_iter()
        .find(|referenced| position(*referenced) >= limit)
    {
        Some(referenced) => Err(CompileError::CategoryReference {
            category,
            referenced,
        }),
        None => Ok(()),
    }
}

/// Resolve every declared parameter to a value of its declared type
fn bind_parameters(
    logic: &MeasureLogic,
    params: &ParameterValues,
) -> Result<HashMap<String, QmeValue>, CompileError> {
    let mut bound = HashMap::with_capacity(logic.parameters.len());

    for decl in &logic.parameters {
        let value = match (params.get(&decl.name), &decl.default) {
            (Some(value), _) => coerce(decl, value.clone())?,
            (None, Some(default)) => coerce(decl, QmeValue::from_json(default))?,
            (None, None) if decl.required => {
                return Err(CompileError::missing_parameter(&decl.name));
            }
            (None, None) => QmeValue::Null,
        };
        bound.insert(ParameterValues::normalize_key(&decl.name), value);
    }

    for (name, _) in params.iter() {
        if logic.parameter(name).is_none() {
            debug!(parameter = name, "ignoring parameter the measure does not declare");
        }
    }

    Ok(bound)
}

/// Coerce a supplied value to the declared parameter type.
///
/// Integers widen to decimals and ISO strings become dates; null passes
/// through for every type.
fn coerce(decl: &ParameterDecl, value: QmeValue) -> Result<QmeValue, CompileError> {
    let coerced = match (decl.kind, value) {
        (_, QmeValue::Null) => QmeValue::Null,
        (ParameterType::Any, value) => value,
        (ParameterType::Boolean, value @ QmeValue::Boolean(_)) => value,
        (ParameterType::Integer, value @ QmeValue::Integer(_)) => value,
        (ParameterType::Decimal, QmeValue::Integer(i)) => QmeValue::Decimal(Decimal::from(i)),
        (ParameterType::Decimal, value @ QmeValue::Decimal(_)) => value,
        (ParameterType::String, value @ QmeValue::String(_)) => value,
        (ParameterType::Date, value @ QmeValue::Date(_)) => value,
        (ParameterType::Date, QmeValue::String(s)) => match parse_date(&s) {
            Ok(date) => QmeValue::Date(date),
            Err(_) => {
                return Err(CompileError::parameter_type(
                    &decl.name,
                    decl.kind,
                    format!("'{}'", s),
                ));
            }
        },
        (ParameterType::List, value @ QmeValue::List(_)) => value,
        (kind, other) => {
            return Err(CompileError::parameter_type(&decl.name, kind, other.type_name()));
        }
    };
    Ok(coerced)
}

/// Lowers one category's criterion into an [`Expr`]
struct Binder<'a> {
    category: Category,
    logic: &'a MeasureLogic,
    bound: &'a HashMap<String, QmeValue>,
    /// `any` aliases in scope, outermost first; the index is the slot
    aliases: Vec<String>,
}

impl Binder<'_> {
    fn bind(&mut self, criterion: &Criterion) -> Result<Expr, CompileError> {
        let expr = match criterion {
            Criterion::Literal(value) => Expr::Const(value.clone()),
            Criterion::Field(path) => match self.aliases.iter().rposition(|a| a == path.head()) {
                Some(slot) => Expr::Local {
                    slot,
                    path: path.tail().to_vec(),
                },
                None => Expr::Field(path.segments().to_vec()),
            },
            Criterion::Parameter(name) => {
                let declared = self.logic.parameter(name);
                let value = declared
                    .and_then(|decl| self.bound.get(&ParameterValues::normalize_key(&decl.name)))
                    .ok_or_else(|| CompileError::undeclared_parameter(self.category, name))?;
                Expr::Const(value.clone())
            }
            Criterion::Category(category) => Expr::Category(*category),
            Criterion::Not(operand) => Expr::Not(Box::new(self.bind(operand)?)),
            Criterion::And(operands) => Expr::And(self.bind_all(operands)?),
            Criterion::Or(operands) => Expr::Or(self.bind_all(operands)?),
            Criterion::Compare { op, left, right } => Expr::Compare {
                op: *op,
                left: Box::new(self.bind(left)?),
                right: Box::new(self.bind(right)?),
            },
            Criterion::In { item, collection } => Expr::In {
                item: Box::new(self.bind(item)?),
                collection: Box::new(self.bind(collection)?),
            },
            Criterion::Matches { operand, pattern } => {
                let regex = Regex::new(pattern).map_err(|e| CompileError::InvalidRegex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Expr::Matches {
                    operand: Box::new(self.bind(operand)?),
                    regex,
                }
            }
            Criterion::Exists(operand) => Expr::Exists(Box::new(self.bind(operand)?)),
            Criterion::Count(operand) => Expr::Count(Box::new(self.bind(operand)?)),
            Criterion::AgeAt { birth, at } => Expr::AgeAt {
                birth: Box::new(self.bind(birth)?),
                at: Box::new(self.bind(at)?),
            },
            Criterion::Any {
                alias,
                source,
                condition,
            } => {
                // the source is outside the alias scope
                let source = self.bind(source)?;
                let slot = self.aliases.len();
                self.aliases.push(alias.clone());
                let condition = self.bind(condition);
                self.aliases.pop();
                Expr::Any {
                    source: Box::new(source),
                    slot,
                    condition: Box::new(condition?),
                }
            }
            Criterion::List(items) => Expr::List(self.bind_all(items)?),
        };
        Ok(expr)
    }

    fn bind_all(&mut self, criteria: &[Criterion]) -> Result<Vec<Expr>, CompileError> {
        criteria.iter().map(|c| self.bind(c)).collect()
    }
}
