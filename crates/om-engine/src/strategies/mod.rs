//! The builtin strategies.
//!
//! # Module Organization
//!
//! - [`enums`] - text ↔ enumeration and enumeration ↔ integral
//! - [`scalar`] - builtin scalar conversions
//! - [`optional`] - optional wrapping and unwrapping
//! - [`records`] - struct copies and tracked reference objects
//! - [`textual`] - parse/format through a textual codec
//! - [`collections`] - arrays, dictionaries and sequences
//! - [`polymorphic`] - dispatch on the runtime shape of the source
//!
//! [`builtin`] returns them in default priority order:
//!
//! ```
//! use om_engine::StrategyRegistry;
//!
//! assert_eq!(StrategyRegistry::new().len(), 11);
//! ```

pub mod collections;
pub mod enums;
pub mod optional;
pub mod polymorphic;
pub mod records;
pub mod scalar;
pub mod textual;

use om_core::{ConfigurationError, Schema, ShapeId, ShapeKind};

pub use collections::{ArrayStrategy, DictionaryStrategy, SequenceStrategy};
pub use enums::{EnumStrategy, TextEnumStrategy};
pub use optional::OptionalStrategy;
pub use polymorphic::PolymorphicStrategy;
pub use records::{ReferenceStrategy, StructStrategy};
pub use scalar::BuiltinScalarStrategy;
pub use textual::TextualStrategy;

use crate::plan::PlanKey;
use crate::strategy::Strategy;

/// The builtin strategies in default priority order.
#[must_use]
pub fn builtin() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(TextEnumStrategy),
        Box::new(EnumStrategy),
        Box::new(BuiltinScalarStrategy),
        Box::new(OptionalStrategy),
        Box::new(StructStrategy),
        Box::new(TextualStrategy),
        Box::new(ArrayStrategy),
        Box::new(DictionaryStrategy),
        Box::new(SequenceStrategy),
        Box::new(PolymorphicStrategy),
        Box::new(ReferenceStrategy),
    ]
}

fn kind_of(schema: &Schema, id: ShapeId) -> Option<&ShapeKind> {
    schema.shape(id).ok().map(|shape| &shape.kind)
}

/// Fails unless the target of `key` can be created for a fresh mapping.
fn check_constructible(schema: &Schema, key: &PlanKey) -> Result<(), ConfigurationError> {
    match key.options.constructor {
        Some(_) => Ok(()),
        None => schema.check_constructible(key.pair.target),
    }
}

fn unexpected(schema: &Schema, strategy: &str, id: ShapeId) -> ConfigurationError {
    ConfigurationError::InvalidSchema(format!(
        "strategy `{strategy}` cannot build for shape `{}`",
        schema.name(id)
    ))
}
