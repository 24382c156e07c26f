//! Command-line parameter values

use anyhow::{Context, Result};
use octofhir_qme_types::{ParameterValues, QmeValue, parse_date};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Parse `name=value` strings into parameter values.
///
/// Values are read as integer, decimal, boolean, null, JSON array/object or
/// `@YYYY-MM-DD` date, falling back to a plain string.
pub fn parse_parameters(params: &[String]) -> Result<ParameterValues> {
    let mut result = ParameterValues::new();

    for param in params {
        let Some((name, value_str)) = param.split_once('=') else {
            anyhow::bail!("Invalid parameter format: '{}'. Expected 'name=value'", param);
        };
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Invalid parameter format: '{}'. Missing name", param);
        }

        result.insert(name, parse_value(value_str.trim())?);
    }

    Ok(result)
}

fn parse_value(value_str: &str) -> Result<QmeValue> {
    let value = if let Some(date) = value_str.strip_prefix('@') {
        QmeValue::Date(parse_date(date).with_context(|| format!("Invalid date literal '{}'", value_str))?)
    } else if let Ok(num) = value_str.parse::<i64>() {
        QmeValue::Integer(num)
    } else if let Ok(num) = Decimal::from_str(value_str) {
        QmeValue::Decimal(num)
    } else if value_str == "true" || value_str == "false" {
        QmeValue::Boolean(value_str == "true")
    } else if value_str == "null" {
        QmeValue::Null
    } else if value_str.starts_with('{') || value_str.starts_with('[') {
        serde_json::from_str::<Value>(value_str)
            .map(|json| QmeValue::from_json(&json))
            .unwrap_or_else(|_| QmeValue::from(value_str))
    } else {
        QmeValue::from(value_str)
    };
    Ok(value)
}
