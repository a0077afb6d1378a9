//! Struct and reference strategies.
//!
//! Both compile the pair's correspondences into member steps. They differ at
//! execution: a struct is a value copied into its target, while a reference
//! object is materialized once per source identity through the tracker.

use om_core::{ConfigurationError, Schema, ShapeKind, TypePair};

use super::{check_constructible, kind_of};
use crate::compiler::BuildContext;
use crate::plan::{PlanBody, PlanKey};
use crate::strategy::Strategy;

fn is_layout(kind: Option<&ShapeKind>) -> bool {
    matches!(kind, Some(ShapeKind::Struct(_) | ShapeKind::Record(_)))
}

/// Member-by-member copy into a value-type struct.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructStrategy;

impl Strategy for StructStrategy {
    fn name(&self) -> &'static str {
        "struct"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        matches!(kind_of(schema, pair.target), Some(ShapeKind::Struct(_))) && is_layout(kind_of(schema, pair.source))
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        Ok(PlanBody::Struct(ctx.record_plan(key)?))
    }
}

/// Tracked reference objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceStrategy;

impl Strategy for ReferenceStrategy {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        matches!(kind_of(schema, pair.target), Some(ShapeKind::Record(_))) && is_layout(kind_of(schema, pair.source))
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        check_constructible(ctx.schema(), key)?;
        Ok(PlanBody::Reference(ctx.record_plan(key)?))
    }
}
