//! Value transformations applied to a leaf value before it is written.
//!
//! A leaf carries one modifier operation or an ordered chain. Every operation is pure and
//! total at the pipeline level: a failing step is logged, reported, and leaves the value
//! it received untouched for the next step.

pub mod expr;

use crate::error::ModifierError;
use crate::telemetry::{Report, Telemetry};
use expr::{Expr, Scalar};
use leafsync_domain::Modify;
use serde_json::{Number, Value};
use tracing::error;

const CUSTOM_PREFIX: &str = "custom:";
/// Largest integer magnitude an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One parsed modifier operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Multiply(f64),
    Divide(f64),
    Add(f64),
    Subtract(f64),
    Round(i32),
    Uppercase,
    Lowercase,
    Ucfirst,
    ToInteger,
    ToFloat,
    Custom(Expr),
    /// Anything unrecognized. Applying it is the identity.
    Unknown(String),
}

impl Operation {
    /// Parses one textual operation such as `round(2)`, `UPPERCASE` or `custom:value * 2`.
    ///
    /// Operation names are case-insensitive. Unrecognized names parse to
    /// [`Operation::Unknown`] rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`ModifierError::InvalidArgument`] when a known operation has a non-numeric
    /// argument and [`ModifierError::Expression`] when a custom expression does not parse.
    pub fn parse(raw: &str) -> Result<Self, ModifierError> {
        let raw = raw.trim();

        if let Some(prefix) = raw.get(..CUSTOM_PREFIX.len())
            && prefix.eq_ignore_ascii_case(CUSTOM_PREFIX)
        {
            let source = &raw[CUSTOM_PREFIX.len()..];
            return Ok(Self::Custom(Expr::parse(source)?));
        }

        if let Some((name, arg)) = split_call(raw) {
            let argument = || {
                parse_float_prefix(arg).ok_or_else(|| ModifierError::InvalidArgument {
                    message: format!("'{arg}' in '{raw}'").into(),
                    context: None,
                })
            };
            match name.to_ascii_lowercase().as_str() {
                "multiply" => return Ok(Self::Multiply(argument()?)),
                "divide" => return Ok(Self::Divide(argument()?)),
                "add" => return Ok(Self::Add(argument()?)),
                "subtract" | "substract" => return Ok(Self::Subtract(argument()?)),
                "round" => {
                    let decimals = parse_int_prefix(arg).ok_or_else(|| ModifierError::InvalidArgument {
                        message: format!("'{arg}' in '{raw}'").into(),
                        context: None,
                    })?;
                    return Ok(Self::Round(i32::try_from(decimals.clamp(-300, 300)).unwrap_or_default()));
                },
                _ => {},
            }
        }

        Ok(match raw.to_ascii_uppercase().as_str() {
            "UPPERCASE" => Self::Uppercase,
            "LOWERCASE" => Self::Lowercase,
            "UCFIRST" => Self::Ucfirst,
            "TOINTEGER" => Self::ToInteger,
            "TOFLOAT" => Self::ToFloat,
            _ => Self::Unknown(raw.to_owned()),
        })
    }

    /// Applies the operation to `value`.
    ///
    /// # Errors
    ///
    /// Returns a [`ModifierError`] when the value cannot be read as a number, the result
    /// is not finite, or a custom expression fails to evaluate.
    pub fn apply(&self, value: &Value) -> Result<Value, ModifierError> {
        match self {
            Self::Multiply(k) => number_value(numeric(value)? * k),
            Self::Divide(k) => number_value(numeric(value)? / k),
            Self::Add(k) => number_value(numeric(value)? + k),
            Self::Subtract(k) => number_value(numeric(value)? - k),
            Self::Round(decimals) => {
                let factor = 10f64.powi(*decimals);
                number_value((numeric(value)? * factor + 0.5).floor() / factor)
            },
            Self::Uppercase => Ok(map_text(value, str::to_uppercase)),
            Self::Lowercase => Ok(map_text(value, str::to_lowercase)),
            Self::Ucfirst => Ok(map_text(value, ucfirst)),
            Self::ToInteger => to_integer(value),
            Self::ToFloat => number_value(numeric(value)?),
            Self::Custom(expr) => match expr.evaluate(value)? {
                Scalar::Number(n) => number_value(n),
                Scalar::Text(s) => Ok(Value::String(s)),
                Scalar::Bool(b) => Ok(Value::Bool(b)),
                Scalar::Null => Ok(Value::Null),
            },
            Self::Unknown(_) => Ok(value.clone()),
        }
    }
}

/// Runs `value` through every operation of `modify`, left to right.
///
/// An absent or empty modifier list is the identity.
pub fn apply(modify: Option<&Modify>, value: Value, telemetry: &Telemetry) -> Value {
    let Some(modify) = modify else {
        return value;
    };

    modify.operations().fold(value, |current, raw| {
        match Operation::parse(raw).and_then(|op| op.apply(&current)) {
            Ok(next) => next,
            Err(err) => {
                error!(operation = raw, value = %current, error = %err, "Error in modifying value");
                telemetry.report(
                    Report::error(format!("Error in modifying value '{current}' with '{raw}': {err}"))
                        .tag("kind", err.kind())
                        .tag("operation", raw),
                );
                current
            },
        }
    })
}

/// `name(arg)` with a word-character name.
fn split_call(raw: &str) -> Option<(&str, &str)> {
    let inner = raw.strip_suffix(')')?;
    let (name, arg) = inner.split_once('(')?;
    let is_word = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    is_word.then_some((name, arg))
}

/// Reads `value` as a float the way loose text-to-number parsing does: numbers as-is,
/// text by its longest numeric prefix.
fn numeric(value: &Value) -> Result<f64, ModifierError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    };
    parsed.ok_or_else(|| ModifierError::NotNumeric { message: value.to_string().into(), context: None })
}

#[allow(clippy::cast_precision_loss)]
fn to_integer(value: &Value) -> Result<Value, ModifierError> {
    let truncated = match value {
        Value::Number(n) => n.as_f64().map(f64::trunc),
        Value::String(s) => parse_int_prefix(s).map(|i| i as f64),
        _ => None,
    };
    truncated
        .ok_or_else(|| ModifierError::NotNumeric { message: value.to_string().into(), context: None })
        .and_then(number_value)
}

/// Converts a float result into a JSON number, emitting integral values as integers.
///
/// # Errors
///
/// Returns [`ModifierError::NonFinite`] for NaN and infinities.
#[allow(clippy::cast_possible_truncation)]
pub fn number_value(n: f64) -> Result<Value, ModifierError> {
    if !n.is_finite() {
        return Err(ModifierError::NonFinite { message: n.to_string().into(), context: None });
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| ModifierError::NonFinite { message: n.to_string().into(), context: None })
}

fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        other => other.clone(),
    }
}

fn ucfirst(text: &str) -> String {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect()
}

/// Longest leading decimal literal of `text` (after leading whitespace), if any.
pub(crate) fn parse_float_prefix(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut at: usize| {
        while bytes.get(at).is_some_and(u8::is_ascii_digit) {
            at += 1;
        }
        at
    };

    let int_start = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits_from(int_start);
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        digits += frac_end - end - 1;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// Longest leading base-10 integer of `text` (after leading whitespace), if any.
pub(crate) fn parse_int_prefix(text: &str) -> Option<i64> {
    let s = text.trim_start();
    let sign_len = usize::from(matches!(s.as_bytes().first(), Some(b'+' | b'-')));
    let len = s[sign_len..].bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    let literal = &s[..sign_len + len];
    literal.parse().ok().or_else(|| Some(if literal.starts_with('-') { i64::MIN } else { i64::MAX }))
}
