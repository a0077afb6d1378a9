//! Builtin scalar strategy.

use om_core::{ConfigurationError, Schema, ShapeKind, TypePair};

use super::{kind_of, unexpected};
use crate::compiler::BuildContext;
use crate::convert::classify;
use crate::plan::{PlanBody, PlanKey};
use crate::strategy::Strategy;

/// Conversions between builtin scalars.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinScalarStrategy;

impl Strategy for BuiltinScalarStrategy {
    fn name(&self) -> &'static str {
        "builtin-scalar"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        matches!(
            (kind_of(schema, pair.source), kind_of(schema, pair.target)),
            (Some(ShapeKind::Scalar(_)), Some(ShapeKind::Scalar(_)))
        )
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        let schema = ctx.schema();
        match (kind_of(schema, key.pair.source), kind_of(schema, key.pair.target)) {
            (Some(ShapeKind::Scalar(from)), Some(ShapeKind::Scalar(to))) => Ok(PlanBody::Scalar {
                to: *to,
                mode: classify(*from, *to),
            }),
            _ => Err(unexpected(schema, self.name(), key.pair.source)),
        }
    }
}
