//! Textual strategy.

use std::sync::Arc;

use om_core::{ConfigurationError, Schema, ShapeId, ShapeKind, TextCodec, TypePair};

use super::kind_of;
use crate::compiler::BuildContext;
use crate::plan::{PlanBody, PlanKey, TextualPlan};
use crate::strategy::Strategy;

/// Builtin scalars ↔ textual shapes through the shape's codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextualStrategy;

fn codec(schema: &Schema, id: ShapeId) -> Option<Arc<dyn TextCodec>> {
    match kind_of(schema, id) {
        Some(ShapeKind::Textual(codec)) => Some(Arc::clone(codec)),
        _ => None,
    }
}

impl Strategy for TextualStrategy {
    fn name(&self) -> &'static str {
        "textual"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        match (kind_of(schema, pair.source), kind_of(schema, pair.target)) {
            (Some(ShapeKind::Textual(_)), Some(ShapeKind::Scalar(_)))
            | (Some(ShapeKind::Scalar(_)), Some(ShapeKind::Textual(_))) => true,
            (Some(ShapeKind::Textual(_)), Some(ShapeKind::Textual(_))) => pair.is_identity(),
            _ => false,
        }
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        if key.pair.is_identity() {
            return Ok(PlanBody::Copy);
        }
        let schema = ctx.schema();
        Ok(PlanBody::Textual(TextualPlan {
            source_codec: codec(schema, key.pair.source),
            target_codec: codec(schema, key.pair.target),
            target_kind: schema.shape(key.pair.target)?.scalar_kind(),
        }))
    }
}
