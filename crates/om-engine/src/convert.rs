//! Builtin scalar conversions.
//!
//! Classification follows the usual numeric promotion rules: widening
//! conversions that cannot lose information are implicit, every other
//! numeric conversion is explicit and range-checked, and anything else goes
//! through text.

use std::str::FromStr;

use om_core::{ConversionError, ScalarKind, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::plan::ConversionMode;

/// Classifies the conversion `from → to`.
///
/// # Examples
///
/// ```
/// use om_core::ScalarKind;
/// use om_engine::{ConversionMode, classify};
///
/// assert_eq!(classify(ScalarKind::I32, ScalarKind::I64), ConversionMode::Implicit);
/// assert_eq!(classify(ScalarKind::I64, ScalarKind::I32), ConversionMode::Explicit);
/// assert_eq!(classify(ScalarKind::Text, ScalarKind::I32), ConversionMode::Textual);
/// ```
#[must_use]
pub fn classify(from: ScalarKind, to: ScalarKind) -> ConversionMode {
    if from == to {
        ConversionMode::Identity
    } else if is_implicit(from, to) {
        ConversionMode::Implicit
    } else if is_numeric_like(from) && is_numeric_like(to) {
        ConversionMode::Explicit
    } else {
        ConversionMode::Textual
    }
}

const fn is_numeric_like(kind: ScalarKind) -> bool {
    kind.is_numeric() || matches!(kind, ScalarKind::Char)
}

fn is_implicit(from: ScalarKind, to: ScalarKind) -> bool {
    use ScalarKind::{Char, Decimal, F32, F64, I16, I32, I64, I8, U16, U32, U64, U8};
    let targets: &[ScalarKind] = match from {
        I8 => &[I16, I32, I64, F32, F64, Decimal],
        U8 => &[I16, U16, I32, U32, I64, U64, F32, F64, Decimal],
        I16 => &[I32, I64, F32, F64, Decimal],
        U16 => &[I32, U32, I64, U64, F32, F64, Decimal],
        I32 => &[I64, F64, Decimal],
        U32 => &[I64, U64, F64, Decimal],
        I64 | U64 => &[Decimal],
        Char => &[U16, I32, U32, I64, U64, F32, F64, Decimal],
        F32 => &[F64],
        _ => &[],
    };
    targets.contains(&to)
}

/// Converts a scalar value to `to` using `mode`.
///
/// The runtime kind of `value` is what gets converted; `mode` only selects
/// the numeric or the textual path.
pub fn convert(value: &Value, to: ScalarKind, mode: ConversionMode) -> Result<Value, ConversionError> {
    match mode {
        ConversionMode::Identity => Ok(value.clone()),
        ConversionMode::Implicit | ConversionMode::Explicit => numeric(value, to),
        ConversionMode::Textual => textual(value, to),
    }
}

enum Number {
    Int(i128),
    Float(f64),
    Decimal(Decimal),
}

fn number_of(value: &Value) -> Option<Number> {
    match value {
        Value::F32(v) => Some(Number::Float(f64::from(*v))),
        Value::F64(v) => Some(Number::Float(*v)),
        Value::Decimal(v) => Some(Number::Decimal(*v)),
        Value::Text(_) => None,
        other => other.as_i128().map(Number::Int),
    }
}

fn numeric(value: &Value, to: ScalarKind) -> Result<Value, ConversionError> {
    if to == ScalarKind::Decimal {
        return to_decimal(value);
    }
    let number = number_of(value)
        .ok_or_else(|| ConversionError::parse(value.kind_name(), to.name()))?;
    match number {
        Number::Int(v) => from_int(v, to),
        Number::Float(v) => from_float(v, to),
        Number::Decimal(v) => {
            if to.is_float() {
                let f = v.to_f64().ok_or_else(|| ConversionError::out_of_range(v, to.name()))?;
                from_float(f, to)
            } else {
                let int = v
                    .trunc()
                    .to_i128()
                    .ok_or_else(|| ConversionError::out_of_range(v, to.name()))?;
                from_int(int, to)
            }
        }
    }
}

fn to_decimal(value: &Value) -> Result<Value, ConversionError> {
    let decimal = match value {
        Value::Decimal(v) => Some(*v),
        Value::F32(v) => Decimal::from_f32(*v),
        Value::F64(v) => Decimal::from_f64(*v),
        other => other
            .as_i128()
            .and_then(|v| Decimal::try_from_i128_with_scale(v, 0).ok()),
    };
    decimal
        .map(Value::Decimal)
        .ok_or_else(|| ConversionError::out_of_range(render(value), "decimal"))
}

pub(crate) fn from_int(v: i128, to: ScalarKind) -> Result<Value, ConversionError> {
    let out_of_range = || ConversionError::out_of_range(v, to.name());
    Ok(match to {
        ScalarKind::Bool => Value::Bool(v != 0),
        ScalarKind::I8 => Value::I8(i8::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::I16 => Value::I16(i16::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::I32 => Value::I32(i32::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::I64 => Value::I64(i64::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::U8 => Value::U8(u8::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::U16 => Value::U16(u16::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::U32 => Value::U32(u32::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::U64 => Value::U64(u64::try_from(v).map_err(|_| out_of_range())?),
        ScalarKind::F32 => Value::F32(v as f32),
        ScalarKind::F64 => Value::F64(v as f64),
        ScalarKind::Decimal => Value::Decimal(
            Decimal::try_from_i128_with_scale(v, 0).map_err(|_| out_of_range())?,
        ),
        ScalarKind::Char => {
            let code = u16::try_from(v).map_err(|_| out_of_range())?;
            Value::Char(char::from_u32(u32::from(code)).ok_or_else(out_of_range)?)
        }
        ScalarKind::Text => Value::Text(v.to_string()),
    })
}

fn from_float(v: f64, to: ScalarKind) -> Result<Value, ConversionError> {
    match to {
        ScalarKind::F64 => Ok(Value::F64(v)),
        ScalarKind::F32 => {
            if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                return Err(ConversionError::out_of_range(v, to.name()));
            }
            Ok(Value::F32(v as f32))
        }
        ScalarKind::Bool => Ok(Value::Bool(v != 0.0)),
        _ => {
            let truncated = v.trunc();
            // i128 covers every integral target, so anything outside it is out of range.
            if !truncated.is_finite() || truncated.abs() >= 1.7e38 {
                return Err(ConversionError::out_of_range(v, to.name()));
            }
            from_int(truncated as i128, to)
        }
    }
}

/// Formats a scalar as text.
#[must_use]
pub fn render(value: &Value) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Enum(v) => v.value.to_string(),
        other => other.kind_name().to_owned(),
    }
}

/// Parses text as a scalar of kind `to`.
pub fn parse(text: &str, to: ScalarKind) -> Result<Value, ConversionError> {
    let trimmed = text.trim();
    let fail = || ConversionError::parse(text, to.name());
    Ok(match to {
        ScalarKind::Bool => match trimmed {
            t if t.eq_ignore_ascii_case("true") => Value::Bool(true),
            t if t.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return Err(fail()),
        },
        ScalarKind::I8 => Value::I8(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::I16 => Value::I16(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::I32 => Value::I32(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::I64 => Value::I64(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::U8 => Value::U8(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::U16 => Value::U16(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::U32 => Value::U32(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::U64 => Value::U64(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::F32 => Value::F32(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::F64 => Value::F64(trimmed.parse().map_err(|_| fail())?),
        ScalarKind::Decimal => Value::Decimal(Decimal::from_str(trimmed).map_err(|_| fail())?),
        ScalarKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(fail()),
            }
        }
        ScalarKind::Text => Value::Text(text.to_owned()),
    })
}

fn textual(value: &Value, to: ScalarKind) -> Result<Value, ConversionError> {
    match (value, to) {
        (_, ScalarKind::Text) => Ok(Value::Text(render(value))),
        (Value::Text(text), _) => parse(text, to),
        // Booleans and numbers convert as 1/0 and non-zero.
        (Value::Bool(b), _) if to.is_numeric() => numeric(&Value::I32(i32::from(*b)), to),
        (_, ScalarKind::Bool) if value.scalar_kind().is_some_and(ScalarKind::is_numeric) => {
            numeric(value, ScalarKind::Bool)
        }
        _ => parse(&render(value), to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tie_break() {
        assert_eq!(classify(ScalarKind::I32, ScalarKind::I32), ConversionMode::Identity);
        assert_eq!(classify(ScalarKind::U8, ScalarKind::I16), ConversionMode::Implicit);
        assert_eq!(classify(ScalarKind::Char, ScalarKind::I32), ConversionMode::Implicit);
        assert_eq!(classify(ScalarKind::F64, ScalarKind::F32), ConversionMode::Explicit);
        assert_eq!(classify(ScalarKind::I32, ScalarKind::Char), ConversionMode::Explicit);
        assert_eq!(classify(ScalarKind::Bool, ScalarKind::I32), ConversionMode::Textual);
        assert_eq!(classify(ScalarKind::I32, ScalarKind::Text), ConversionMode::Textual);
    }

    #[test]
    fn test_lossy_float_targets_are_explicit() {
        assert_eq!(classify(ScalarKind::I32, ScalarKind::F64), ConversionMode::Implicit);
        assert_eq!(classify(ScalarKind::I16, ScalarKind::F32), ConversionMode::Implicit);
        assert_eq!(classify(ScalarKind::I32, ScalarKind::F32), ConversionMode::Explicit);
        assert_eq!(classify(ScalarKind::U32, ScalarKind::F32), ConversionMode::Explicit);
        assert_eq!(classify(ScalarKind::I64, ScalarKind::F64), ConversionMode::Explicit);
        assert_eq!(classify(ScalarKind::U64, ScalarKind::F32), ConversionMode::Explicit);
        assert_eq!(classify(ScalarKind::I64, ScalarKind::Decimal), ConversionMode::Implicit);
    }

    #[test]
    fn test_text_to_int() {
        let value = convert(&Value::text("5"), ScalarKind::I32, ConversionMode::Textual).unwrap();
        assert_eq!(value, Value::I32(5));
        let value = convert(&Value::text(" -12 "), ScalarKind::I64, ConversionMode::Textual).unwrap();
        assert_eq!(value, Value::I64(-12));
    }

    #[test]
    fn test_text_parse_failure() {
        let err = convert(&Value::text("five"), ScalarKind::I32, ConversionMode::Textual).unwrap_err();
        assert_eq!(err, ConversionError::parse("five", "i32"));
    }

    #[test]
    fn test_explicit_range_check() {
        let err = convert(&Value::I64(300), ScalarKind::U8, ConversionMode::Explicit).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"value 300 is out of range for u8");
        let ok = convert(&Value::I64(255), ScalarKind::U8, ConversionMode::Explicit).unwrap();
        assert_eq!(ok, Value::U8(255));
    }

    #[test]
    fn test_float_to_int_truncates() {
        let value = convert(&Value::F64(-2.9), ScalarKind::I32, ConversionMode::Explicit).unwrap();
        assert_eq!(value, Value::I32(-2));
        assert!(convert(&Value::F64(f64::NAN), ScalarKind::I32, ConversionMode::Explicit).is_err());
        assert!(convert(&Value::F64(1e20), ScalarKind::I32, ConversionMode::Explicit).is_err());
    }

    #[test]
    fn test_round_trip_loss_free_pairs() {
        let samples = [i32::MIN, -1, 0, 1, 42, i32::MAX];
        for x in samples {
            let source = Value::I32(x);
            for via in [ScalarKind::I64, ScalarKind::F64, ScalarKind::Decimal, ScalarKind::Text] {
                let there = convert(&source, via, classify(ScalarKind::I32, via)).unwrap();
                let back = convert(&there, ScalarKind::I32, classify(via, ScalarKind::I32)).unwrap();
                assert_eq!(back, source, "i32 -> {via} -> i32 for {x}");
            }
        }
    }

    #[test]
    fn test_decimal_conversions() {
        let value = convert(&Value::F64(2.5), ScalarKind::Decimal, ConversionMode::Implicit).unwrap();
        assert_eq!(value, Value::Decimal(Decimal::from_str("2.5").unwrap()));
        let value = convert(
            &Value::Decimal(Decimal::from_str("12.75").unwrap()),
            ScalarKind::I16,
            ConversionMode::Explicit,
        )
        .unwrap();
        assert_eq!(value, Value::I16(12));
    }

    #[test]
    fn test_bool_numeric_fallback() {
        let one = convert(&Value::Bool(true), ScalarKind::I32, ConversionMode::Textual).unwrap();
        assert_eq!(one, Value::I32(1));
        let yes = convert(&Value::I64(-3), ScalarKind::Bool, ConversionMode::Textual).unwrap();
        assert_eq!(yes, Value::Bool(true));
        let no = convert(&Value::F64(0.0), ScalarKind::Bool, ConversionMode::Textual).unwrap();
        assert_eq!(no, Value::Bool(false));
    }

    #[test]
    fn test_char_conversions() {
        let code = convert(&Value::Char('A'), ScalarKind::I32, ConversionMode::Implicit).unwrap();
        assert_eq!(code, Value::I32(65));
        let back = convert(&Value::I32(66), ScalarKind::Char, ConversionMode::Explicit).unwrap();
        assert_eq!(back, Value::Char('B'));
        let text = convert(&Value::text("xy"), ScalarKind::Char, ConversionMode::Textual);
        assert!(text.is_err());
    }
}
