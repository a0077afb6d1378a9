//! Plan interpretation.
//!
//! An [`Executor`] lives for one top-level mapping call. It owns the
//! reference tracker of that call and remembers the plans it fetched, so the
//! shared cache is consulted once per key and call.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use om_core::{
    CollectionBehavior, ConfigurationError, ConversionError, EnumDef, EnumValue, FxHashMap, MapError,
    ObjRef, ObjectData, ReferenceBehavior, ScalarKind, Schema, SequenceKind, ShapeId, ShapeKind,
    TypePair, Value,
};
use tracing::trace;

use crate::compiler::PlanCompiler;
use crate::configuration::Configuration;
use crate::convert;
use crate::options::overlay;
use crate::plan::{
    CollectionPlan, ConversionMode, DictionaryPlan, OptionalPlan, Plan, PlanBody, PlanKey, RecordPlan,
    TextualPlan, ValueStep,
};
use crate::reconcile::{Existing, Reconciled, reconcile};
use crate::stats::MapperStats;
use crate::strategies::enums::{format_enum, parse_enum};
use crate::tracker::ReferenceTracker;

/// Runs plans for one mapping call.
#[derive(Debug)]
pub(crate) struct Executor<'a> {
    config: &'a Configuration,
    compiler: &'a PlanCompiler,
    stats: &'a MapperStats,
    tracker: ReferenceTracker,
    plans: FxHashMap<PlanKey, Arc<Plan>>,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        config: &'a Configuration,
        compiler: &'a PlanCompiler,
        stats: &'a MapperStats,
        tracker_capacity: usize,
    ) -> Self {
        Self {
            config,
            compiler,
            stats,
            tracker: ReferenceTracker::with_capacity(tracker_capacity),
            plans: FxHashMap::default(),
        }
    }

    /// Maps `source` with the plan of `key`.
    pub(crate) fn run(&mut self, key: &PlanKey, source: &Value, existing: Existing) -> Result<Value, MapError> {
        let plan = self.plan(key)?;
        let pair = key.pair;
        match &plan.body {
            PlanBody::Copy => Ok(source.clone()),
            PlanBody::Custom(converter) => converter.convert(source).map_err(|e| self.conversion(pair, e)),
            PlanBody::Scalar { to, mode } => self.scalar(pair, source, *to, *mode),
            PlanBody::TextToEnum { enumeration } => self.text_to_enum(pair, *enumeration, source),
            PlanBody::EnumToText { enumeration } => self.enum_to_text(pair, *enumeration, source),
            PlanBody::EnumToEnum { target } => self.enum_to_enum(pair, *target, source),
            PlanBody::EnumToIntegral { to } => self.enum_to_integral(pair, *to, source),
            PlanBody::IntegralToEnum { target, underlying } => {
                self.integral_to_enum(pair, *target, *underlying, source)
            }
            PlanBody::Optional(optional) => self.optional(optional, source, existing),
            PlanBody::Struct(record) => self.structure(pair, record, source, &existing),
            PlanBody::Textual(textual) => self.textual(pair, textual, source),
            PlanBody::Array(collection) => self.array(key, collection, source, &existing),
            PlanBody::Sequence { kind, plan } => self.sequence(key, *kind, plan, source, &existing),
            PlanBody::Dictionary(dictionary) => self.dictionary(key, dictionary, source, &existing),
            PlanBody::Polymorphic { target } => self.polymorphic(key, *target, source, existing),
            PlanBody::Reference(record) => self.reference(key, record, source, &existing),
        }
    }

    fn plan(&mut self, key: &PlanKey) -> Result<Arc<Plan>, MapError> {
        if let Some(plan) = self.plans.get(key) {
            return Ok(Arc::clone(plan));
        }
        let plan = self.compiler.get_plan(self.config, key)?;
        self.plans.insert(key.clone(), Arc::clone(&plan));
        Ok(plan)
    }

    fn schema(&self) -> &'a Schema {
        self.config.schema()
    }

    fn conversion(&self, pair: TypePair, error: ConversionError) -> MapError {
        MapError::conversion(self.schema().pair_label(pair), error)
    }

    fn mismatch(&self, expected: ShapeId, found: &Value) -> MapError {
        MapError::mismatch(self.schema().name(expected), found.kind_name())
    }

    // Scalars and enumerations.

    fn scalar(&self, pair: TypePair, source: &Value, to: ScalarKind, mode: ConversionMode) -> Result<Value, MapError> {
        match source {
            Value::Null if to == ScalarKind::Text => Ok(Value::Null),
            Value::Null => Ok(to.zero()),
            value if value.scalar_kind().is_some() => {
                convert::convert(value, to, mode).map_err(|e| self.conversion(pair, e))
            }
            other => Err(self.mismatch(pair.source, other)),
        }
    }

    fn enum_def(&self, id: ShapeId) -> Result<(&'a EnumDef, &'a str), MapError> {
        let shape = self.schema().shape(id)?;
        match &shape.kind {
            ShapeKind::Enum(def) => Ok((def, shape.name.as_str())),
            _ => Err(MapError::mismatch(shape.name.clone(), "a non-enumeration shape")),
        }
    }

    fn text_to_enum(&self, pair: TypePair, enumeration: ShapeId, source: &Value) -> Result<Value, MapError> {
        let text = match source {
            Value::Null => return Ok(self.schema().zero_value(enumeration)),
            Value::Text(text) => text,
            other => return Err(self.mismatch(pair.source, other)),
        };
        let (def, name) = self.enum_def(enumeration)?;
        let value = parse_enum(def, name, text)
            .and_then(|v| fit_underlying(i128::from(v), def.underlying))
            .map_err(|e| self.conversion(pair, e))?;
        Ok(Value::Enum(EnumValue::new(enumeration, value)))
    }

    fn enum_to_text(&self, pair: TypePair, enumeration: ShapeId, source: &Value) -> Result<Value, MapError> {
        match source {
            Value::Null => Ok(Value::Null),
            Value::Enum(value) => {
                let (def, _) = self.enum_def(enumeration)?;
                Ok(Value::Text(format_enum(def, value.value)))
            }
            other => Err(self.mismatch(pair.source, other)),
        }
    }

    fn enum_to_enum(&self, pair: TypePair, target: ShapeId, source: &Value) -> Result<Value, MapError> {
        match source {
            Value::Null => Ok(self.schema().zero_value(target)),
            Value::Enum(value) => {
                let (def, _) = self.enum_def(target)?;
                let value = fit_underlying(i128::from(value.value), def.underlying)
                    .map_err(|e| self.conversion(pair, e))?;
                Ok(Value::Enum(EnumValue::new(target, value)))
            }
            other => Err(self.mismatch(pair.source, other)),
        }
    }

    fn enum_to_integral(&self, pair: TypePair, to: ScalarKind, source: &Value) -> Result<Value, MapError> {
        match source {
            Value::Null => Ok(to.zero()),
            Value::Enum(value) => {
                convert::from_int(i128::from(value.value), to).map_err(|e| self.conversion(pair, e))
            }
            other => Err(self.mismatch(pair.source, other)),
        }
    }

    fn integral_to_enum(
        &self,
        pair: TypePair,
        target: ShapeId,
        underlying: ScalarKind,
        source: &Value,
    ) -> Result<Value, MapError> {
        if source.is_null() {
            return Ok(self.schema().zero_value(target));
        }
        let raw = source
            .scalar_kind()
            .filter(|kind| kind.is_integral())
            .and_then(|_| source.as_i128())
            .ok_or_else(|| self.mismatch(pair.source, source))?;
        let value = fit_underlying(raw, underlying).map_err(|e| self.conversion(pair, e))?;
        Ok(Value::Enum(EnumValue::new(target, value)))
    }

    fn textual(&self, pair: TypePair, plan: &TextualPlan, source: &Value) -> Result<Value, MapError> {
        if source.is_null() {
            return Ok(match plan.target_kind {
                Some(kind) if kind != ScalarKind::Text => kind.zero(),
                _ => Value::Null,
            });
        }
        let text = match &plan.source_codec {
            Some(codec) => codec.format(source),
            None if source.scalar_kind().is_some() => Ok(convert::render(source)),
            None => return Err(self.mismatch(pair.source, source)),
        }
        .map_err(|e| self.conversion(pair, e))?;
        match (&plan.target_codec, plan.target_kind) {
            (Some(codec), _) => codec.parse(&text),
            (None, Some(kind)) => convert::parse(&text, kind),
            (None, None) => Ok(Value::Text(text)),
        }
        .map_err(|e| self.conversion(pair, e))
    }

    fn optional(&mut self, plan: &OptionalPlan, source: &Value, existing: Existing) -> Result<Value, MapError> {
        if source.is_null() {
            return Ok(if plan.target_optional {
                Value::Null
            } else {
                self.schema().zero_value(plan.zero_shape)
            });
        }
        match &plan.inner {
            Some(inner) => self.run(inner, source, existing),
            None => Ok(source.clone()),
        }
    }

    // Structs and records.

    fn structure(
        &mut self,
        pair: TypePair,
        record: &RecordPlan,
        source: &Value,
        existing: &Existing,
    ) -> Result<Value, MapError> {
        match source {
            Value::Null => return Ok(self.schema().zero_value(pair.target)),
            Value::Struct(_) | Value::Ref(_) => {}
            other => return Err(self.mismatch(pair.source, other)),
        }
        let mut target = match existing.value() {
            Some(Value::Struct(current)) if current.shape == pair.target => Value::Struct(current.clone()),
            _ => self.schema().zero_value(pair.target),
        };
        self.apply_members(record, source, &mut target)?;
        Ok(target)
    }

    fn reference(
        &mut self,
        key: &PlanKey,
        record: &RecordPlan,
        source: &Value,
        existing: &Existing,
    ) -> Result<Value, MapError> {
        match source {
            Value::Null => return Ok(Value::Null),
            Value::Ref(_) | Value::Struct(_) => {}
            other => return Err(self.mismatch(key.pair.source, other)),
        }
        if let Some(tracked) = self.tracked(key.pair, source, existing) {
            return Ok(Value::Ref(tracked));
        }

        let instance = self.materialize(key, existing)?;
        self.track(key.pair, source, &instance);
        let mut target = Value::Ref(instance);
        self.apply_members(record, source, &mut target)?;
        Ok(target)
    }

    /// The target already materialized for `source` in this call.
    ///
    /// A forced target other than the tracked one is populated anyway, so an
    /// element matched under Update keeps its identity even when its source
    /// was mapped earlier in the graph.
    fn tracked(&self, pair: TypePair, source: &Value, existing: &Existing) -> Option<ObjRef> {
        let Value::Ref(object) = source else {
            return None;
        };
        let tracked = self.tracker.try_get(object, pair.target)?;
        if matches!(existing, Existing::Forced(Value::Ref(forced)) if *forced != tracked) {
            return None;
        }
        self.stats.increment_tracker_reuses();
        trace!(
            pair = %self.schema().pair_label(pair),
            source = %object.id(),
            "reusing tracked target"
        );
        Some(tracked)
    }

    /// Records `target` for a reference `source`; the first target recorded
    /// for a key stays.
    fn track(&mut self, pair: TypePair, source: &Value, target: &ObjRef) {
        if let Value::Ref(object) = source {
            self.tracker.record(object, pair.target, target.clone());
        }
    }

    /// Picks the object a reference plan populates.
    fn materialize(&self, key: &PlanKey, existing: &Existing) -> Result<ObjRef, MapError> {
        let reusable = match existing {
            Existing::Forced(Value::Ref(object)) => Some(object),
            Existing::PerOptions(Value::Ref(object))
                if key.options.reference_behavior == ReferenceBehavior::UseTargetInstanceIfNotNull
                    && self.schema().is_assignable(object.shape(), key.pair.target) =>
            {
                Some(object)
            }
            _ => None,
        };
        match reusable {
            Some(object) => Ok(object.clone()),
            None => self.construct(key),
        }
    }

    fn construct(&self, key: &PlanKey) -> Result<ObjRef, MapError> {
        let object = match &key.options.constructor {
            Some(constructor) => constructor.construct(),
            None => self.schema().instantiate(key.pair.target)?,
        };
        self.stats.increment_objects_created();
        Ok(object)
    }

    fn apply_members(&mut self, record: &RecordPlan, source: &Value, target: &mut Value) -> Result<(), MapError> {
        let schema = self.schema();
        for member in &record.members {
            if member.guard.as_ref().is_some_and(|guard| !guard.allows(source)) {
                continue;
            }
            let name = member.target.dotted();
            let Some(value) = member.source.read(schema, source).map_err(|e| e.within(&name))? else {
                continue;
            };
            let produced = match &member.step {
                ValueStep::Convert(converter) => converter.convert(&value).map_err(|e| {
                    let pair = TypePair::new(member.source.shape(), member.target.shape());
                    self.conversion(pair, e)
                }),
                ValueStep::Nested(key) => {
                    let current = member.target.get(schema, target).map_err(|e| e.within(&name))?;
                    self.run(key, &value, Existing::current(current))
                }
            }
            .map_err(|e| e.within(&name))?;
            member
                .target
                .set(schema, target, produced)
                .map_err(|e| e.within(&name))?;
        }
        Ok(())
    }

    fn polymorphic(
        &mut self,
        key: &PlanKey,
        target: ShapeId,
        source: &Value,
        existing: Existing,
    ) -> Result<Value, MapError> {
        let runtime = match source {
            Value::Null => return Ok(Value::Null),
            Value::Ref(object) => object.shape(),
            other => return Err(self.mismatch(key.pair.source, other)),
        };
        let concrete = self.config.polymorphic_target(runtime, target)?;
        let pair = TypePair::new(runtime, concrete);
        if pair == key.pair {
            return Err(ConfigurationError::UnmappedRuntimeShape {
                runtime: self.schema().name(runtime),
                target: self.schema().name(target),
            }
            .into());
        }
        trace!(pair = %self.schema().pair_label(pair), "dispatching on runtime shape");
        let dispatched = PlanKey::new(pair, overlay(&key.options, self.config.pair_options(pair)));
        self.run(&dispatched, source, existing)
    }

    // Collections.

    fn source_items(&self, pair: TypePair, source: &Value) -> Result<Option<Vec<Value>>, MapError> {
        match source {
            Value::Null => Ok(None),
            Value::Ref(object) if matches!(object.borrow().data, ObjectData::Items(_)) => Ok(Some(object.items())),
            other => Err(self.mismatch(pair.source, other)),
        }
    }

    /// The target collection to populate in place, if any.
    fn reusable_collection(&self, key: &PlanKey, existing: &Existing) -> Option<ObjRef> {
        let Some(Value::Ref(object)) = existing.value() else {
            return None;
        };
        if object.shape() != key.pair.target {
            return None;
        }
        let reuse = existing.is_forced()
            || key.options.reference_behavior == ReferenceBehavior::UseTargetInstanceIfNotNull
            || matches!(
                key.options.collection_behavior,
                CollectionBehavior::Merge | CollectionBehavior::Update
            );
        reuse.then(|| object.clone())
    }

    fn reconcile_items(
        &mut self,
        key: &PlanKey,
        plan: &CollectionPlan,
        current: Vec<Value>,
        items: &[Value],
    ) -> Result<Reconciled, MapError> {
        reconcile(
            key.options.collection_behavior,
            key.options.comparer.as_ref(),
            current,
            items,
            |element, existing| self.run(&plan.element, element, existing),
        )
    }

    fn array(
        &mut self,
        key: &PlanKey,
        plan: &CollectionPlan,
        source: &Value,
        existing: &Existing,
    ) -> Result<Value, MapError> {
        let Some(items) = self.source_items(key.pair, source)? else {
            return Ok(Value::Null);
        };
        if let Some(tracked) = self.tracked(key.pair, source, existing) {
            return Ok(Value::Ref(tracked));
        }
        let reused = self.reusable_collection(key, existing);
        let current = reused.as_ref().map(ObjRef::items).unwrap_or_default();
        let target = match reused {
            Some(object) => object,
            None => self.construct(key)?,
        };
        self.track(key.pair, source, &target);

        let previous_len = current.len();
        let mut slots = self.reconcile_items(key, plan, current, &items)?.into_vec();
        // A reused array never shrinks; slots past the written ones are zeroed.
        if slots.len() < previous_len {
            let zero = self.schema().zero_value(plan.element_shape);
            slots.resize(previous_len, zero);
        }
        target.set_items(slots);
        Ok(Value::Ref(target))
    }

    fn sequence(
        &mut self,
        key: &PlanKey,
        kind: SequenceKind,
        plan: &CollectionPlan,
        source: &Value,
        existing: &Existing,
    ) -> Result<Value, MapError> {
        let Some(items) = self.source_items(key.pair, source)? else {
            return Ok(Value::Null);
        };
        if let Some(tracked) = self.tracked(key.pair, source, existing) {
            return Ok(Value::Ref(tracked));
        }
        let reused = self.reusable_collection(key, existing);
        let current = reused.as_ref().map(ObjRef::items).unwrap_or_default();
        let target = match reused {
            Some(object) if kind.is_mutable() || existing.is_forced() => object,
            _ => self.construct(key)?,
        };
        self.track(key.pair, source, &target);

        let Reconciled { kept, added } = self.reconcile_items(key, plan, current, &items)?;

        let values = match kind {
            SequenceKind::List | SequenceKind::Queue | SequenceKind::LinkedList | SequenceKind::ReadOnly => {
                let mut values = kept;
                values.extend(added);
                values
            }
            SequenceKind::Stack => {
                // Items are kept in pop order. Pushing through a LIFO buffer
                // leaves the new elements on top in source order.
                let mut values: VecDeque<Value> = kept.into();
                let mut buffer = added;
                while let Some(value) = buffer.pop() {
                    values.push_front(value);
                }
                values.into()
            }
            SequenceKind::Set => {
                let mut values = kept;
                for value in added {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
                values
            }
            SequenceKind::SortedSet => {
                let mut values = kept;
                for value in added {
                    if !values.contains(&value) {
                        let at = values.partition_point(|v| v.sort_cmp(&value) == Ordering::Less);
                        values.insert(at, value);
                    }
                }
                values
            }
        };
        target.set_items(values);
        Ok(Value::Ref(target))
    }

    fn dictionary(
        &mut self,
        key: &PlanKey,
        plan: &DictionaryPlan,
        source: &Value,
        existing: &Existing,
    ) -> Result<Value, MapError> {
        let entries = match source {
            Value::Null => return Ok(Value::Null),
            Value::Ref(object) if matches!(object.borrow().data, ObjectData::Entries(_)) => object.entries(),
            other => return Err(self.mismatch(key.pair.source, other)),
        };
        if let Some(tracked) = self.tracked(key.pair, source, existing) {
            return Ok(Value::Ref(tracked));
        }
        let behavior = key.options.collection_behavior;
        let reused = self.reusable_collection(key, existing);
        let mut result = match (&reused, behavior) {
            (Some(object), CollectionBehavior::Merge | CollectionBehavior::Update) => object.entries(),
            _ => Vec::with_capacity(entries.len()),
        };
        let target = match reused {
            Some(object) => object,
            None => self.construct(key)?,
        };
        self.track(key.pair, source, &target);

        let mut seen = Vec::with_capacity(entries.len());
        for (source_key, source_value) in &entries {
            let mapped_key = self.run(&plan.key, source_key, Existing::None)?;
            let position = result.iter().position(|(k, _)| *k == mapped_key);
            let current = position.map(|i| result[i].1.clone());
            let value_existing = match (behavior, current) {
                (CollectionBehavior::Update, Some(current)) if !current.is_null() => Existing::Forced(current),
                (_, current) => Existing::current(current),
            };
            let mapped_value = self.run(&plan.value, source_value, value_existing)?;
            match position {
                Some(i) => result[i].1 = mapped_value,
                None => result.push((mapped_key.clone(), mapped_value)),
            }
            seen.push(mapped_key);
        }
        if behavior == CollectionBehavior::Update {
            result.retain(|(k, _)| seen.contains(k));
        }
        target.set_entries(result);
        Ok(Value::Ref(target))
    }
}

/// Checks that an underlying enum value fits `underlying`.
fn fit_underlying(value: i128, underlying: ScalarKind) -> Result<i64, ConversionError> {
    convert::from_int(value, underlying)?;
    i64::try_from(value).map_err(|_| ConversionError::out_of_range(value, underlying.name()))
}
