//! Criteria text parser
//!
//! Recursive descent with precedence climbing:
//! `or` < `and` < `not` < predicate (comparison, `in`, `matches`) < term.

use crate::criterion::{CompareOp, Criterion, FieldPath};
use crate::error::ParseError;
use octofhir_qme_types::{Category, QmeValue, parse_date};
use rust_decimal::Decimal;
use std::str::FromStr;
use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, fail, opt, separated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::token::{one_of, take_while};
use winnow::{ModalResult, Parser};

type Input<'a> = &'a str;

/// Words that cannot be used as field names
const RESERVED: &[&str] = &[
    "and", "or", "not", "in", "where", "matches", "any", "exists", "count", "age_at", "true",
    "false", "null",
];

/// Parse a complete criterion from text
pub fn parse_criterion(text: &str) -> Result<Criterion, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut input: Input<'_> = text;
    let criterion = expression(&mut input)
        .map_err(|e| ParseError::syntax(text, text.len() - input.len(), describe(&e)))?;

    let _ = ws(&mut input);
    if !input.is_empty() {
        return Err(ParseError::trailing(text, text.len() - input.len(), input));
    }

    Ok(criterion)
}

fn describe(err: &ErrMode<ContextError>) -> String {
    let message = match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.to_string(),
        ErrMode::Incomplete(_) => String::new(),
    };
    if message.trim().is_empty() {
        "unexpected input".to_string()
    } else {
        message.trim().replace('\n', "; ")
    }
}

// ============================================================================
// Lexical helpers
// ============================================================================

fn ws(input: &mut Input<'_>) -> ModalResult<()> {
    multispace0.void().parse_next(input)
}

fn word<'a>(input: &mut Input<'a>) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn number_text<'a>(input: &mut Input<'a>) -> ModalResult<&'a str> {
    (opt('-'), digit1, opt(('.', digit1))).take().parse_next(input)
}

fn date_text<'a>(input: &mut Input<'a>) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_digit() || c == '-').parse_next(input)
}

fn compare_op(input: &mut Input<'_>) -> ModalResult<CompareOp> {
    alt((
        alt((">=", "≥")).value(CompareOp::GreaterOrEqual),
        alt(("<=", "≤")).value(CompareOp::LessOrEqual),
        alt(("!=", "<>", "≠")).value(CompareOp::NotEqual),
        "=".value(CompareOp::Equal),
        ">".value(CompareOp::Greater),
        "<".value(CompareOp::Less),
    ))
    .parse_next(input)
}

/// Consume `kw` (case-insensitive, whole word) if it is next
fn eat_keyword(input: &mut Input<'_>, kw: &str) -> bool {
    let checkpoint = *input;
    let _ = ws(input);
    match word(input) {
        Ok(w) if w.eq_ignore_ascii_case(kw) => true,
        _ => {
            *input = checkpoint;
            false
        }
    }
}

/// Consume `sym` if it is next
fn eat_symbol(input: &mut Input<'_>, sym: &str) -> bool {
    let checkpoint = *input;
    let _ = ws(input);
    let rest_of_input: &str = *input;
    match rest_of_input.strip_prefix(sym) {
        Some(rest) => {
            *input = rest;
            true
        }
        None => {
            *input = checkpoint;
            false
        }
    }
}

fn expect_symbol(input: &mut Input<'_>, sym: &'static str) -> ModalResult<()> {
    if eat_symbol(input, sym) {
        Ok(())
    } else {
        expected(input, sym)
    }
}

/// Fail without backtracking, reporting what was expected
fn expected<O>(input: &mut Input<'_>, what: &'static str) -> ModalResult<O> {
    cut_err(fail::<_, O, _>)
        .context(StrContext::Expected(StrContextValue::Description(what)))
        .parse_next(input)
}

fn backtrack<O>() -> ModalResult<O> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn string_literal(input: &mut Input<'_>) -> ModalResult<String> {
    let source: &str = *input;
    let Some(rest) = source.strip_prefix('\'') else {
        return backtrack();
    };

    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                // '' is an escaped quote
                if rest[i + 1..].starts_with('\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    *input = &rest[i + 1..];
                    return Ok(out);
                }
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            other => out.push(other),
        }
    }

    expected(input, "closing quote")
}

fn number(input: &mut Input<'_>) -> ModalResult<QmeValue> {
    let text = number_text(input)?;
    if text.contains('.') {
        match Decimal::from_str(text) {
            Ok(d) => Ok(QmeValue::Decimal(d)),
            Err(_) => expected(input, "decimal literal"),
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => Ok(QmeValue::Integer(i)),
            Err(_) => expected(input, "integer literal in 64-bit range"),
        }
    }
}

// ============================================================================
// Grammar
// ============================================================================

fn expression(input: &mut Input<'_>) -> ModalResult<Criterion> {
    or_expression(input)
}

fn collapse(mut operands: Vec<Criterion>, build: fn(Vec<Criterion>) -> Criterion) -> Criterion {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        build(operands)
    }
}

fn or_expression(input: &mut Input<'_>) -> ModalResult<Criterion> {
    let mut operands = vec![and_expression(input)?];
    while eat_keyword(input, "or") {
        operands.push(and_expression(input)?);
    }
    Ok(collapse(operands, Criterion::Or))
}

fn and_expression(input: &mut Input<'_>) -> ModalResult<Criterion> {
    let mut operands = vec![unary_expression(input)?];
    while eat_keyword(input, "and") {
        operands.push(unary_expression(input)?);
    }
    Ok(collapse(operands, Criterion::And))
}

fn unary_expression(input: &mut Input<'_>) -> ModalResult<Criterion> {
    if eat_keyword(input, "not") {
        return Ok(Criterion::not(unary_expression(input)?));
    }
    predicate(input)
}

fn predicate(input: &mut Input<'_>) -> ModalResult<Criterion> {
    let left = term(input)?;

    let checkpoint = *input;
    ws(input)?;
    if let Ok(op) = compare_op(input) {
        let right = term(input)?;
        return Ok(Criterion::compare(op, left, right));
    }
    *input = checkpoint;

    if eat_keyword(input, "in") {
        let collection = term(input)?;
        return Ok(Criterion::contains(collection, left));
    }

    if eat_keyword(input, "matches") {
        ws(input)?;
        return match string_literal(input) {
            Ok(pattern) => Ok(Criterion::Matches {
                operand: Box::new(left),
                pattern,
            }),
            Err(ErrMode::Backtrack(_)) => expected(input, "quoted pattern after `matches`"),
            Err(e) => Err(e),
        };
    }

    Ok(left)
}

fn term(input: &mut Input<'_>) -> ModalResult<Criterion> {
    ws(input)?;
    let source: &str = *input;
    let Some(next) = source.chars().next() else {
        return expected(input, "expression");
    };

    match next {
        '(' => {
            *input = &source[1..];
            let inner = expression(input)?;
            expect_symbol(input, ")")?;
            Ok(inner)
        }
        '[' => {
            *input = &source[1..];
            if eat_symbol(input, "]") {
                return Ok(Criterion::List(Vec::new()));
            }
            let items: Vec<Criterion> = separated(1.., expression, (ws, ',')).parse_next(input)?;
            expect_symbol(input, "]")?;
            Ok(Criterion::List(items))
        }
        '$' => {
            *input = &source[1..];
            match word(input) {
                Ok(name) => Ok(Criterion::parameter(name)),
                Err(_) => expected(input, "parameter name after `$`"),
            }
        }
        '@' => {
            *input = &source[1..];
            let text = match date_text(input) {
                Ok(text) => text,
                Err(_) => return expected(input, "date literal @YYYY-MM-DD"),
            };
            match parse_date(text) {
                Ok(date) => Ok(Criterion::literal(date)),
                Err(_) => expected(input, "date literal @YYYY-MM-DD"),
            }
        }
        '\'' => Ok(Criterion::literal(string_literal(input)?)),
        c if c.is_ascii_digit() || c == '-' => Ok(Criterion::Literal(number(input)?)),
        _ => word_term(input),
    }
}

fn word_term(input: &mut Input<'_>) -> ModalResult<Criterion> {
    let checkpoint = *input;
    let name = match word(input) {
        Ok(name) => name,
        Err(_) => return expected(input, "expression"),
    };
    let lower = name.to_ascii_lowercase();

    match lower.as_str() {
        "true" => Ok(Criterion::literal(true)),
        "false" => Ok(Criterion::literal(false)),
        "null" => Ok(Criterion::Literal(QmeValue::Null)),
        "exists" => Ok(Criterion::exists(term(input)?)),
        "count" => {
            expect_symbol(input, "(")?;
            let inner = expression(input)?;
            expect_symbol(input, ")")?;
            Ok(Criterion::Count(Box::new(inner)))
        }
        "age_at" => {
            expect_symbol(input, "(")?;
            let birth = expression(input)?;
            expect_symbol(input, ",")?;
            let at = expression(input)?;
            expect_symbol(input, ")")?;
            Ok(Criterion::AgeAt {
                birth: Box::new(birth),
                at: Box::new(at),
            })
        }
        "any" => any_query(input),
        _ => {
            if let Ok(category) = lower.parse::<Category>() {
                return Ok(Criterion::category(category));
            }
            if RESERVED.contains(&lower.as_str()) {
                *input = checkpoint;
                return expected(input, "expression");
            }
            Ok(Criterion::Field(field_path(input, name)))
        }
    }
}

/// `any <alias> in <source> where <condition>`
fn any_query(input: &mut Input<'_>) -> ModalResult<Criterion> {
    ws(input)?;
    let alias = match word(input) {
        Ok(alias) if !RESERVED.contains(&alias.to_ascii_lowercase().as_str()) => alias,
        _ => return expected(input, "alias after `any`"),
    };
    if !eat_keyword(input, "in") {
        return expected(input, "`in` after alias");
    }
    let source = term(input)?;
    if !eat_keyword(input, "where") {
        return expected(input, "`where` clause");
    }
    let condition = expression(input)?;

    Ok(Criterion::Any {
        alias: alias.to_string(),
        source: Box::new(source),
        condition: Box::new(condition),
    })
}

fn field_path(input: &mut Input<'_>, head: &str) -> FieldPath {
    let mut segments = vec![head.to_string()];
    loop {
        let checkpoint: &str = *input;
        let Some(rest) = checkpoint.strip_prefix('.') else {
            break;
        };
        *input = rest;
        match word(input) {
            Ok(segment) => segments.push(segment.to_string()),
            Err(_) => {
                *input = checkpoint;
                break;
            }
        }
    }
    FieldPath::new(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_is_whole_word() {
        let mut input = "order";
        assert!(!eat_keyword(&mut input, "or"));
        assert_eq!(input, "order");
    }

    #[test]
    fn test_string_literal_escapes() {
        let mut input = r"'it''s \'quoted\''";
        assert_eq!(string_literal(&mut input).unwrap(), "it's 'quoted'");
        assert!(input.is_empty());
    }
}
