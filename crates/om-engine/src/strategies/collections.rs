//! Collection strategies.
//!
//! Elements, keys and values are converted by nested plans. The collection
//! plan itself only decides how the converted elements land in the target;
//! see [`reconcile`](crate::reconcile) for the behaviors.

use om_core::{CollectionBehavior, ConfigurationError, Schema, ShapeId, ShapeKind, TypePair};

use super::{check_constructible, kind_of, unexpected};
use crate::compiler::BuildContext;
use crate::plan::{CollectionPlan, DictionaryPlan, PlanBody, PlanKey};
use crate::strategy::Strategy;

/// Element shape of an array or sequence.
fn element_of(schema: &Schema, id: ShapeId) -> Option<ShapeId> {
    match kind_of(schema, id) {
        Some(ShapeKind::Array(element) | ShapeKind::Sequence { element, .. }) => Some(*element),
        _ => None,
    }
}

/// Update reconciles elements pairwise, which needs a comparer.
fn check_comparer(schema: &Schema, key: &PlanKey) -> Result<(), ConfigurationError> {
    if key.options.collection_behavior == CollectionBehavior::Update && key.options.comparer.is_none() {
        return Err(ConfigurationError::MissingComparer {
            pair: schema.pair_label(key.pair),
        });
    }
    Ok(())
}

fn element_plan(
    ctx: &mut BuildContext<'_>,
    key: &PlanKey,
    strategy: &str,
) -> Result<CollectionPlan, ConfigurationError> {
    let schema = ctx.schema();
    let (Some(source), Some(target)) = (element_of(schema, key.pair.source), element_of(schema, key.pair.target))
    else {
        return Err(unexpected(schema, strategy, key.pair.target));
    };
    check_comparer(schema, key)?;
    check_constructible(schema, key)?;
    Ok(CollectionPlan {
        element: ctx.require(TypePair::new(source, target), None)?,
        element_shape: target,
    })
}

/// Array targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArrayStrategy;

impl Strategy for ArrayStrategy {
    fn name(&self) -> &'static str {
        "array"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        matches!(kind_of(schema, pair.target), Some(ShapeKind::Array(_))) && element_of(schema, pair.source).is_some()
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        Ok(PlanBody::Array(element_plan(ctx, key, self.name())?))
    }
}

/// Dictionary to dictionary.
#[derive(Debug, Default, Clone, Copy)]
pub struct DictionaryStrategy;

impl Strategy for DictionaryStrategy {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        matches!(
            (kind_of(schema, pair.source), kind_of(schema, pair.target)),
            (Some(ShapeKind::Dictionary { .. }), Some(ShapeKind::Dictionary { .. }))
        )
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        let schema = ctx.schema();
        let (
            Some(ShapeKind::Dictionary {
                key: source_key,
                value: source_value,
            }),
            Some(ShapeKind::Dictionary {
                key: target_key,
                value: target_value,
            }),
        ) = (kind_of(schema, key.pair.source), kind_of(schema, key.pair.target))
        else {
            return Err(unexpected(schema, self.name(), key.pair.target));
        };
        check_constructible(schema, key)?;
        let key_pair = TypePair::new(*source_key, *target_key);
        let value_pair = TypePair::new(*source_value, *target_value);
        Ok(PlanBody::Dictionary(DictionaryPlan {
            key: ctx.require(key_pair, None)?,
            value: ctx.require(value_pair, None)?,
        }))
    }
}

/// Growable sequence targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceStrategy;

impl Strategy for SequenceStrategy {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool {
        matches!(kind_of(schema, pair.target), Some(ShapeKind::Sequence { .. }))
            && element_of(schema, pair.source).is_some()
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError> {
        let kind = match kind_of(ctx.schema(), key.pair.target) {
            Some(ShapeKind::Sequence { kind, .. }) => *kind,
            _ => return Err(unexpected(ctx.schema(), self.name(), key.pair.target)),
        };
        Ok(PlanBody::Sequence {
            kind,
            plan: element_plan(ctx, key, self.name())?,
        })
    }
}
