//! Polymorphic strategy.

use om_core::{ConfigurationError, Schema, ShapeKind, TypePair};

use super::kind_of;
use crate::compiler::BuildContext;
use crate::plan::{PlanBody, PlanKey};
use crate::strategy::Strategy;

/// Record pairs with an abstract side.
///
/// The plan only names the static target; the concrete pair is chosen per
/// source object from its runtime shape and compiled on first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolymorphicStrategy;

impl Strategy for PolymorphicStrategy {
    fn name(&self) -> &'static str {
        "polymorphic"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        match (kind_of(schema, pair.source), kind_of(schema, pair.target)) {
            (Some(ShapeKind::Record(source)), Some(ShapeKind::Record(target))) => {
                source.is_abstract || target.is_abstract
            }
            _ => false,
        }
    }

    fn build(&self, _ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        Ok(PlanBody::Polymorphic {
            target: key.pair.target,
        })
    }
}
