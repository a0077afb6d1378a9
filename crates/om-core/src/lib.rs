//! Core types, errors, and utilities for objmap.
//!
//! This crate provides the vocabulary shared by the engine and the CLI:
//!
//! - Shapes and the immutable [`Schema`] registry
//! - Dynamic [`Value`]s with identity-carrying [`ObjRef`] handles
//! - Behavioral options and their override chain
//! - Correspondences between source accessors and target members
//! - Error types and configuration structures
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod correspondence;
pub mod error;
pub mod hash;
pub mod options;
pub mod shape;
pub mod value;

pub use config::{EngineConfig, MapperConfig};
pub use correspondence::{
    ComputedAccessor, Converter, Correspondence, CorrespondenceList, CorrespondenceResolver, Guard,
    MemberPath, MemberStep, SourceAccessor,
};
pub use error::{ConfigError, ConfigurationError, ConversionError, MapError};
pub use hash::{FxHashMap, FxHashSet, fx_hash_map_with_capacity, fx_hash_set_with_capacity};
pub use options::{
    CollectionBehavior, EffectiveOptions, ElementComparer, GlobalOptions, OptionsOverride,
    ReferenceBehavior, TargetConstructor,
};
pub use shape::{
    EnumDef, EnumVariant, MemberDef, RecordDef, ScalarKind, Schema, SchemaBuilder, SequenceKind,
    Shape, ShapeId, ShapeKind, TextCodec, TypePair,
};
pub use value::{EnumValue, ObjRef, Object, ObjectData, ObjectId, OpaqueValue, StructValue, Value};
