//! Lenient host-style value coercion.
//!
//! [`coerce`] turns any host value into a value of a requested
//! [`DataType`] the way a spreadsheet-like host would: numbers read from
//! text, booleans count as 1 and 0, and blank cells become the type's
//! default. This is what hosts use for variadic elements and what the
//! standard conversion rules fall back to.

use crate::DataType;
use crate::error::ConversionError;
use crate::runtime::Dynamic;

/// Coerce a host value into `target`.
///
/// `Object` accepts anything unchanged. For every other target a host error
/// value comes back as [`ConversionError::HostError`].
pub fn coerce(value: &Dynamic, target: &DataType) -> Result<Dynamic, ConversionError> {
    if matches!(target, DataType::Object) {
        return Ok(value.clone());
    }
    if let Dynamic::Error(e) = value {
        return Err(ConversionError::HostError(*e));
    }

    match target {
        DataType::Object => Ok(value.clone()),
        DataType::Void => Ok(Dynamic::Void),
        DataType::Optional(inner) => match value {
            Dynamic::Missing | Dynamic::Void => Ok(Dynamic::Missing),
            other => coerce(other, inner),
        },
        DataType::Array(element) => match value {
            Dynamic::Array(items) => items
                .iter()
                .map(|item| coerce(item, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Dynamic::Array),
            Dynamic::Missing | Dynamic::Empty => Ok(Dynamic::Array(Vec::new())),
            scalar => Ok(Dynamic::Array(vec![coerce(scalar, element)?])),
        },
        DataType::Float => to_float(value).map(Dynamic::Float),
        DataType::Int => to_int(value).map(Dynamic::Int),
        DataType::Bool => to_bool(value).map(Dynamic::Bool),
        DataType::String => to_text(value).map(Dynamic::String),
        DataType::Named(_) | DataType::Task(_) => match value {
            Dynamic::Native(_) => Ok(value.clone()),
            other => Err(ConversionError::mismatch(target, other.type_name())),
        },
    }
}

fn to_float(value: &Dynamic) -> Result<f64, ConversionError> {
    match value {
        Dynamic::Float(f) => Ok(*f),
        Dynamic::Int(i) => Ok(*i as f64),
        Dynamic::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Dynamic::Missing | Dynamic::Empty | Dynamic::Void => Ok(0.0),
        Dynamic::String(s) => s.trim().parse::<f64>().map_err(|_| {
            ConversionError::InvalidNumber {
                text: s.clone(),
                target_type: "double",
            }
        }),
        other => Err(ConversionError::mismatch(DataType::Float, other.type_name())),
    }
}

fn to_int(value: &Dynamic) -> Result<i64, ConversionError> {
    match value {
        Dynamic::Int(i) => Ok(*i),
        Dynamic::String(s) => {
            let text = s.trim();
            text.parse::<i64>()
                .or_else(|_| {
                    text.parse::<f64>()
                        .map_err(|_| ())
                        .and_then(|f| float_to_int(f).map_err(|_| ()))
                })
                .map_err(|_| ConversionError::InvalidNumber {
                    text: s.clone(),
                    target_type: "int",
                })
        }
        other => float_to_int(to_float(other)?),
    }
}

fn float_to_int(f: f64) -> Result<i64, ConversionError> {
    let rounded = f.round();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Ok(rounded as i64)
    } else {
        Err(ConversionError::IntegerOverflow {
            value: if f < 0.0 { i64::MIN } else { i64::MAX },
            target_type: "int",
        })
    }
}

fn to_bool(value: &Dynamic) -> Result<bool, ConversionError> {
    match value {
        Dynamic::Bool(b) => Ok(*b),
        Dynamic::Int(i) => Ok(*i != 0),
        Dynamic::Float(f) => Ok(*f != 0.0),
        Dynamic::Missing | Dynamic::Empty | Dynamic::Void => Ok(false),
        Dynamic::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConversionError::mismatch(DataType::Bool, "string")),
        },
        other => Err(ConversionError::mismatch(DataType::Bool, other.type_name())),
    }
}

fn to_text(value: &Dynamic) -> Result<String, ConversionError> {
    match value {
        Dynamic::String(s) => Ok(s.clone()),
        Dynamic::Int(i) => Ok(i.to_string()),
        Dynamic::Float(f) => Ok(format_number(*f)),
        Dynamic::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Dynamic::Missing | Dynamic::Empty | Dynamic::Void => Ok(String::new()),
        other => Err(ConversionError::mismatch(DataType::String, other.type_name())),
    }
}

/// Format a number the way a host shows it in a cell: integral values
/// without a fractional part.
pub fn format_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
