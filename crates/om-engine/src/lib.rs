//! Strategy selection, plan compilation and graph execution for objmap.
//!
//! The engine maps a source object graph onto a target object graph
//! described by a [`Schema`](om_core::Schema):
//!
//! - A [`StrategyRegistry`] picks a transformation strategy for each type pair
//! - A [`PlanCompiler`] turns the pair into a cached, immutable [`Plan`]
//! - An executor interprets plans, reusing targets per the options and
//!   preserving shared and cyclic references through a [`ReferenceTracker`]
//!
//! # Overview
//!
//! ```
//! use std::sync::Arc;
//!
//! use om_core::{ObjRef, ObjectData, ScalarKind, SchemaBuilder, SequenceKind, Value};
//! use om_engine::{Configuration, Mapper};
//!
//! let mut builder = SchemaBuilder::new();
//! let text = builder.scalar(ScalarKind::Text);
//! let int = builder.scalar(ScalarKind::I32);
//! let source_ids = builder.sequence(SequenceKind::List, text).unwrap();
//! let target_ids = builder.array(int).unwrap();
//! let schema = Arc::new(builder.build().unwrap());
//!
//! let mapper = Mapper::new(Configuration::new(schema));
//! let ids = ObjRef::new(source_ids, ObjectData::Items(vec![Value::text("1"), Value::text("2")]));
//! let mapped = mapper.map(&Value::Ref(ids), source_ids, target_ids)?;
//!
//! assert_eq!(mapped.as_object().unwrap().items(), vec![Value::I32(1), Value::I32(2)]);
//! # Ok::<(), om_core::MapError>(())
//! ```
//!
//! # Options
//!
//! Reference and collection behavior are resolved per nested unit from the
//! member, the type pair and the global defaults (see [`resolve_options`]).
//! The effective options are part of the plan key, so one pair may have
//! several plans.

#![deny(clippy::all)]
#![warn(missing_docs)]

mod compiler;
mod configuration;
mod convert;
mod executor;
mod mapper;
mod options;
mod plan;
mod reconcile;
mod resolver;
mod stats;
mod strategy;
mod tracker;

pub mod strategies;

pub use compiler::{BuildContext, PlanCompiler};
pub use configuration::{Configuration, TypePairConfig};
pub use convert::{classify, convert, parse, render};
pub use mapper::Mapper;
pub use options::resolve_options;
pub use plan::{
    CollectionPlan, ConversionMode, DictionaryPlan, MemberPlan, OptionalPlan, Plan, PlanBody, PlanKey,
    RecordPlan, TextualPlan, ValueStep,
};
pub use resolver::ExactNameResolver;
pub use stats::{MapperStats, StatsSnapshot};
pub use strategy::{Strategy, StrategyRegistry};
pub use tracker::ReferenceTracker;
