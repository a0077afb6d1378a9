//! Optional strategy.

use om_core::{ConfigurationError, Schema, ShapeId, ShapeKind, TypePair};

use super::kind_of;
use crate::compiler::BuildContext;
use crate::plan::{OptionalPlan, PlanBody, PlanKey};
use crate::strategy::Strategy;

/// Wraps and unwraps optionals.
///
/// | Source | Target | Absent source |
/// |--------|--------|---------------|
/// | `T?` | `U?` | absent |
/// | `T?` | `U` | zero value of `U` |
/// | `T` | `U?` | n/a |
///
/// Equal inner value shapes are copied without a nested plan.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptionalStrategy;

fn unwrap(schema: &Schema, id: ShapeId) -> (ShapeId, bool) {
    match kind_of(schema, id) {
        Some(ShapeKind::Optional(inner)) => (*inner, true),
        _ => (id, false),
    }
}

impl Strategy for OptionalStrategy {
    fn name(&self) -> &'static str {
        "optional"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        unwrap(schema, pair.source).1 || unwrap(schema, pair.target).1
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        let schema = ctx.schema();
        let (source, _) = unwrap(schema, key.pair.source);
        let (target, target_optional) = unwrap(schema, key.pair.target);
        let inner = if source == target && !schema.shape(target)?.is_reference() {
            None
        } else {
            Some(ctx.require_inheriting(TypePair::new(source, target), &key.options)?)
        };
        Ok(PlanBody::Optional(OptionalPlan {
            inner,
            target_optional,
            zero_shape: target,
        }))
    }
}
