//! Enumeration strategies.

use om_core::{ConfigurationError, ConversionError, EnumDef, ScalarKind, Schema, ShapeKind, TypePair};

use super::{kind_of, unexpected};
use crate::compiler::BuildContext;
use crate::plan::{PlanBody, PlanKey};
use crate::strategy::Strategy;

/// Text ↔ enumeration by variant name.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextEnumStrategy;

impl Strategy for TextEnumStrategy {
    fn name(&self) -> &'static str {
        "text-enum"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        matches!(
            (kind_of(schema, pair.source), kind_of(schema, pair.target)),
            (Some(ShapeKind::Scalar(ScalarKind::Text)), Some(ShapeKind::Enum(_)))
                | (Some(ShapeKind::Enum(_)), Some(ShapeKind::Scalar(ScalarKind::Text)))
        )
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        let pair = key.pair;
        Ok(match kind_of(ctx.schema(), pair.target) {
            Some(ShapeKind::Enum(_)) => PlanBody::TextToEnum {
                enumeration: pair.target,
            },
            _ => PlanBody::EnumToText {
                enumeration: pair.source,
            },
        })
    }
}

/// Enumeration ↔ enumeration and enumeration ↔ integral, by underlying value.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnumStrategy;

impl Strategy for EnumStrategy {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        match (kind_of(schema, pair.source), kind_of(schema, pair.target)) {
            (Some(ShapeKind::Enum(_)), Some(ShapeKind::Enum(_))) => true,
            (Some(ShapeKind::Enum(_)), Some(ShapeKind::Scalar(kind)))
            | (Some(ShapeKind::Scalar(kind)), Some(ShapeKind::Enum(_))) => kind.is_integral(),
            _ => false,
        }
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        let schema = ctx.schema();
        let pair = key.pair;
        match (kind_of(schema, pair.source), kind_of(schema, pair.target)) {
            (Some(ShapeKind::Enum(_)), Some(ShapeKind::Enum(_))) if pair.is_identity() => Ok(PlanBody::Copy),
            (Some(ShapeKind::Enum(_)), Some(ShapeKind::Enum(_))) => Ok(PlanBody::EnumToEnum { target: pair.target }),
            (Some(ShapeKind::Enum(_)), Some(ShapeKind::Scalar(to))) => Ok(PlanBody::EnumToIntegral { to: *to }),
            (_, Some(ShapeKind::Enum(def))) => Ok(PlanBody::IntegralToEnum {
                target: pair.target,
                underlying: def.underlying,
            }),
            _ => Err(unexpected(schema, self.name(), pair.target)),
        }
    }
}

/// Resolves `text` to an underlying value: exact name, then any-case name,
/// then an integer literal.
pub(crate) fn parse_enum(def: &EnumDef, enumeration: &str, text: &str) -> Result<i64, ConversionError> {
    def.value_of(text)
        .or_else(|| def.value_of_ignore_case(text))
        .or_else(|| text.trim().parse().ok())
        .ok_or_else(|| ConversionError::UnknownEnumName {
            name: text.to_owned(),
            enumeration: enumeration.to_owned(),
        })
}

/// Variant name of `value`, or its decimal form when undefined.
pub(crate) fn format_enum(def: &EnumDef, value: i64) -> String {
    def.name_of(value).map_or_else(|| value.to_string(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use om_core::EnumVariant;

    use super::*;

    fn colors() -> EnumDef {
        EnumDef {
            underlying: ScalarKind::I32,
            variants: vec![
                EnumVariant {
                    name: "Red".to_owned(),
                    value: 1,
                },
                EnumVariant {
                    name: "Green".to_owned(),
                    value: 2,
                },
            ],
        }
    }

    #[test]
    fn test_parse_enum_lookup_order() {
        let def = colors();
        assert_eq!(parse_enum(&def, "Color", "Green").unwrap(), 2);
        assert_eq!(parse_enum(&def, "Color", "red").unwrap(), 1);
        assert_eq!(parse_enum(&def, "Color", "7").unwrap(), 7);
    }

    #[test]
    fn test_parse_enum_unknown_name() {
        let err = parse_enum(&colors(), "Color", "Purple").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @r#""Purple" is not a variant of `Color`"#);
    }

    #[test]
    fn test_format_enum_undefined_value() {
        let def = colors();
        assert_eq!(format_enum(&def, 1), "Red");
        assert_eq!(format_enum(&def, 42), "42");
    }
}
