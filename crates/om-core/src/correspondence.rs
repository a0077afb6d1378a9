//! Correspondences: resolved links from a source accessor to a target member.
//!
//! The engine never discovers members on its own. For every record or struct
//! type pair it consumes a [`CorrespondenceList`], produced either by explicit
//! configuration or by a [`CorrespondenceResolver`].

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{ConfigurationError, ConversionError, MapError};
use crate::options::OptionsOverride;
use crate::shape::{Schema, ShapeId, ShapeKind, TypePair};
use crate::value::Value;

/// One hop of a [`MemberPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberStep {
    /// Member index within the owner's layout.
    pub index: usize,
    /// Member name.
    pub name: String,
    /// Shape declaring the member.
    pub owner: ShapeId,
    /// Shape of the member value.
    pub shape: ShapeId,
}

/// A resolved dotted member path such as `Customer.Name`.
///
/// Every hop but the last must land on a struct or record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPath(SmallVec<[MemberStep; 2]>);

impl MemberPath {
    /// Resolves `path` against the layout of `root`.
    ///
    /// # Examples
    ///
    /// ```
    /// use om_core::{MemberPath, RecordDef, ScalarKind, SchemaBuilder};
    ///
    /// let mut builder = SchemaBuilder::new();
    /// let text = builder.scalar(ScalarKind::Text);
    /// let customer = builder.record("Customer", RecordDef::new().member("Name", text)).unwrap();
    /// let order = builder.record("Order", RecordDef::new().member("Customer", customer)).unwrap();
    /// let schema = builder.build().unwrap();
    ///
    /// let path = MemberPath::resolve(&schema, order, "Customer.Name").unwrap();
    /// assert_eq!(path.shape(), text);
    /// assert_eq!(path.dotted(), "Customer.Name");
    /// ```
    pub fn resolve(schema: &Schema, root: ShapeId, path: &str) -> Result<Self, ConfigurationError> {
        let mut steps = SmallVec::new();
        let mut owner = root;
        for name in path.split('.') {
            let shape = schema.shape(owner)?;
            let layout = shape.layout().ok_or_else(|| ConfigurationError::UnknownMember {
                shape: shape.name.clone(),
                member: name.to_owned(),
            })?;
            let index = layout
                .member_index(name)
                .ok_or_else(|| ConfigurationError::UnknownMember {
                    shape: shape.name.clone(),
                    member: name.to_owned(),
                })?;
            let member_shape = layout.members[index].shape;
            steps.push(MemberStep {
                index,
                name: name.to_owned(),
                owner,
                shape: member_shape,
            });
            owner = member_shape;
        }
        Ok(Self(steps))
    }

    /// Shape of the value at the end of the path.
    #[must_use]
    pub fn shape(&self) -> ShapeId {
        self.0.last().map_or(ShapeId::new(0), |step| step.shape)
    }

    /// Renders the path with dots.
    #[must_use]
    pub fn dotted(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(&step.name);
        }
        out
    }

    /// The hops of the path, outermost first.
    #[must_use]
    pub fn steps(&self) -> &[MemberStep] {
        &self.0
    }

    /// Returns `true` for a single-hop path.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.0.len() == 1
    }

    /// Reads the value at the end of the path.
    ///
    /// Returns `Ok(None)` when an intermediate hop is null.
    pub fn get(&self, schema: &Schema, root: &Value) -> Result<Option<Value>, MapError> {
        let mut current = root.clone();
        for step in &self.0 {
            current = match &current {
                Value::Null => return Ok(None),
                Value::Ref(object) => object
                    .field(step.index)
                    .ok_or_else(|| MapError::mismatch(schema.name(step.owner), "object without the member"))?,
                Value::Struct(value) => value
                    .fields
                    .get(step.index)
                    .cloned()
                    .ok_or_else(|| MapError::mismatch(schema.name(step.owner), "struct without the member"))?,
                other => return Err(MapError::mismatch(schema.name(step.owner), other.kind_name())),
            };
        }
        Ok(Some(current))
    }

    /// Writes `value` at the end of the path.
    ///
    /// Null intermediate records are instantiated; null intermediate structs
    /// start from their zero value.
    pub fn set(&self, schema: &Schema, root: &mut Value, value: Value) -> Result<(), MapError> {
        set_at(schema, &self.0, root, value)
    }
}

fn set_at(schema: &Schema, steps: &[MemberStep], container: &mut Value, value: Value) -> Result<(), MapError> {
    let Some((step, rest)) = steps.split_first() else {
        *container = value;
        return Ok(());
    };
    match container {
        Value::Ref(object) => {
            if rest.is_empty() {
                object.set_field(step.index, value);
                return Ok(());
            }
            let mut child = object.field(step.index).unwrap_or_default();
            if child.is_null() {
                child = fresh_intermediate(schema, step.shape)?;
            }
            set_at(schema, rest, &mut child, value)?;
            object.set_field(step.index, child);
            Ok(())
        }
        Value::Struct(fields) => {
            let slot = fields
                .fields
                .get_mut(step.index)
                .ok_or_else(|| MapError::mismatch(schema.name(step.owner), "struct without the member"))?;
            if rest.is_empty() {
                *slot = value;
                return Ok(());
            }
            if slot.is_null() {
                *slot = fresh_intermediate(schema, step.shape)?;
            }
            set_at(schema, rest, slot, value)
        }
        other => Err(MapError::mismatch(schema.name(step.owner), other.kind_name())),
    }
}

fn fresh_intermediate(schema: &Schema, shape: ShapeId) -> Result<Value, MapError> {
    match &schema.shape(shape)?.kind {
        ShapeKind::Struct(_) => Ok(schema.zero_value(shape)),
        _ => Ok(Value::Ref(schema.instantiate(shape)?)),
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// A computed source value, evaluated against the whole source object.
#[derive(Clone)]
pub struct ComputedAccessor {
    /// Name shown in plans and error messages.
    pub label: String,
    /// Declared shape of the computed value.
    pub shape: ShapeId,
    getter: Arc<dyn Fn(&Value) -> Result<Value, ConversionError> + Send + Sync>,
}

impl ComputedAccessor {
    /// Wraps a getter returning values of `shape`.
    pub fn new(
        label: impl Into<String>,
        shape: ShapeId,
        getter: impl Fn(&Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            shape,
            getter: Arc::new(getter),
        }
    }

    /// Evaluates the getter.
    pub fn eval(&self, source: &Value) -> Result<Value, ConversionError> {
        (self.getter)(source)
    }
}

impl fmt::Debug for ComputedAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedAccessor")
            .field("label", &self.label)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Where a correspondence reads its value from.
#[derive(Debug, Clone)]
pub enum SourceAccessor {
    /// A member path of the source shape.
    Member(MemberPath),
    /// A computed getter.
    Computed(ComputedAccessor),
}

impl SourceAccessor {
    /// Declared shape of the value read.
    #[must_use]
    pub fn shape(&self) -> ShapeId {
        match self {
            Self::Member(path) => path.shape(),
            Self::Computed(computed) => computed.shape,
        }
    }

    /// Name shown in plans and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Member(path) => path.dotted(),
            Self::Computed(computed) => format!("{}()", computed.label),
        }
    }

    /// Reads the value from a source object.
    ///
    /// `Ok(None)` means a null hop was met before the end of a member path.
    pub fn read(&self, schema: &Schema, source: &Value) -> Result<Option<Value>, MapError> {
        match self {
            Self::Member(path) => path.get(schema, source),
            Self::Computed(computed) => computed
                .eval(source)
                .map(Some)
                .map_err(|e| MapError::conversion(self.label(), e)),
        }
    }
}

/// A user conversion from a source value to a target value.
#[derive(Clone)]
pub struct Converter(Arc<dyn Fn(&Value) -> Result<Value, ConversionError> + Send + Sync>);

impl Converter {
    /// Wraps a conversion function.
    pub fn new(convert: impl Fn(&Value) -> Result<Value, ConversionError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(convert))
    }

    /// Applies the conversion.
    pub fn convert(&self, value: &Value) -> Result<Value, ConversionError> {
        (self.0)(value)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Converter(..)")
    }
}

/// A predicate on the source object; a false guard skips the correspondence.
#[derive(Clone)]
pub struct Guard(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl Guard {
    /// Wraps a predicate.
    pub fn new(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Evaluates the predicate.
    #[must_use]
    pub fn allows(&self, source: &Value) -> bool {
        (self.0)(source)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

/// One source accessor → target member link.
#[derive(Debug, Clone)]
pub struct Correspondence {
    /// Where the value comes from; `None` only for ignored members.
    pub source: Option<SourceAccessor>,
    /// The target member written.
    pub target: MemberPath,
    /// Replaces the nested plan when set; must yield the target member shape.
    pub converter: Option<Converter>,
    /// Skips the link when it rejects the source object.
    pub guard: Option<Guard>,
    /// Leaves the target member untouched.
    pub ignore: bool,
    /// Member-level options.
    pub options: OptionsOverride,
}

impl Correspondence {
    /// Links `source` to `target`.
    #[must_use]
    pub fn new(source: SourceAccessor, target: MemberPath) -> Self {
        Self {
            source: Some(source),
            target,
            converter: None,
            guard: None,
            ignore: false,
            options: OptionsOverride::default(),
        }
    }

    /// Marks `target` as not mapped.
    #[must_use]
    pub fn ignored(target: MemberPath) -> Self {
        Self {
            source: None,
            target,
            converter: None,
            guard: None,
            ignore: true,
            options: OptionsOverride::default(),
        }
    }

    /// Sets the converter.
    #[must_use]
    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Sets the guard.
    #[must_use]
    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Sets member-level options.
    #[must_use]
    pub fn with_options(mut self, options: OptionsOverride) -> Self {
        self.options = options;
        self
    }
}

/// The ordered correspondences of one type pair, at most one per target.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceList(Vec<Correspondence>);

impl CorrespondenceList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a correspondence, replacing any earlier one for the same target
    /// in place.
    ///
    /// Returns the replaced correspondence.
    pub fn upsert(&mut self, correspondence: Correspondence) -> Option<Correspondence> {
        match self.0.iter_mut().find(|c| c.target == correspondence.target) {
            Some(slot) => Some(std::mem::replace(slot, correspondence)),
            None => {
                self.0.push(correspondence);
                None
            }
        }
    }

    /// Finds the correspondence for a dotted target path.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&Correspondence> {
        self.0.iter().find(|c| c.target.dotted() == target)
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Correspondence> {
        self.0.iter()
    }

    /// Number of correspondences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are none.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a CorrespondenceList {
    type Item = &'a Correspondence;
    type IntoIter = std::slice::Iter<'a, Correspondence>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Correspondence> for CorrespondenceList {
    fn from_iter<I: IntoIterator<Item = Correspondence>>(iter: I) -> Self {
        let mut list = Self::new();
        for correspondence in iter {
            list.upsert(correspondence);
        }
        list
    }
}

/// Produces the correspondences of a type pair that has no explicit list.
pub trait CorrespondenceResolver: Send + Sync + fmt::Debug {
    /// Resolves the correspondences between two struct or record shapes.
    fn resolve(&self, schema: &Schema, pair: TypePair) -> Result<CorrespondenceList, ConfigurationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{RecordDef, ScalarKind, SchemaBuilder};

    struct Fixture {
        schema: Schema,
        order: ShapeId,
        customer: ShapeId,
        dto: ShapeId,
    }

    fn fixture() -> Fixture {
        let mut builder = SchemaBuilder::new();
        let text = builder.scalar(ScalarKind::Text);
        let customer = builder
            .record("Customer", RecordDef::new().member("Name", text))
            .unwrap();
        let order = builder
            .record("Order", RecordDef::new().member("Customer", customer))
            .unwrap();
        let dto = builder
            .record("OrderDto", RecordDef::new().member("CustomerName", text))
            .unwrap();
        Fixture {
            schema: builder.build().unwrap(),
            order,
            customer,
            dto,
        }
    }

    #[test]
    fn test_get_flattens_nested_member() {
        let f = fixture();
        let customer = f.schema.object(f.customer, &[("Name", Value::text("Ada"))]).unwrap();
        let order = f.schema.object(f.order, &[("Customer", Value::Ref(customer))]).unwrap();
        let path = MemberPath::resolve(&f.schema, f.order, "Customer.Name").unwrap();

        let value = path.get(&f.schema, &Value::Ref(order)).unwrap();
        assert_eq!(value, Some(Value::text("Ada")));
    }

    #[test]
    fn test_get_short_circuits_on_null_hop() {
        let f = fixture();
        let order = f.schema.instantiate(f.order).unwrap();
        let path = MemberPath::resolve(&f.schema, f.order, "Customer.Name").unwrap();
        assert_eq!(path.get(&f.schema, &Value::Ref(order)).unwrap(), None);
    }

    #[test]
    fn test_set_instantiates_intermediate_record() {
        let f = fixture();
        let order = f.schema.instantiate(f.order).unwrap();
        let path = MemberPath::resolve(&f.schema, f.order, "Customer.Name").unwrap();

        let mut root = Value::Ref(order.clone());
        path.set(&f.schema, &mut root, Value::text("Grace")).unwrap();

        let customer = f.schema.field(&order, "Customer").unwrap();
        let customer = customer.as_object().unwrap();
        assert_eq!(f.schema.field(customer, "Name"), Some(Value::text("Grace")));
    }

    #[test]
    fn test_resolve_unknown_member() {
        let f = fixture();
        let err = MemberPath::resolve(&f.schema, f.order, "Customer.Email").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownMember {
                shape: "Customer".to_owned(),
                member: "Email".to_owned(),
            }
        );
    }

    #[test]
    fn test_upsert_replaces_and_clears_converter() {
        let f = fixture();
        let target = MemberPath::resolve(&f.schema, f.dto, "CustomerName").unwrap();
        let source = MemberPath::resolve(&f.schema, f.order, "Customer.Name").unwrap();

        let mut list = CorrespondenceList::new();
        list.upsert(
            Correspondence::new(SourceAccessor::Member(source.clone()), target.clone())
                .with_converter(Converter::new(|v| Ok(v.clone()))),
        );
        let replaced = list.upsert(Correspondence::new(SourceAccessor::Member(source), target));

        assert!(replaced.is_some_and(|c| c.converter.is_some()));
        assert_eq!(list.len(), 1);
        assert!(list.get("CustomerName").is_some_and(|c| c.converter.is_none()));
    }

    #[test]
    fn test_computed_accessor_reads_whole_source() {
        let f = fixture();
        let text = f.schema.scalar(ScalarKind::Text);
        let accessor = SourceAccessor::Computed(ComputedAccessor::new("Label", text, |source| {
            Ok(Value::text(source.kind_name()))
        }));
        let order = Value::Ref(f.schema.instantiate(f.order).unwrap());
        assert_eq!(accessor.read(&f.schema, &order).unwrap(), Some(Value::text("object")));
        assert_eq!(accessor.label(), "Label()");
    }
}
