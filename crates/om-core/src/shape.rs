//! Shapes: the static structure of values.
//!
//! A [`Schema`] is an immutable registry of [`Shape`]s built once through a
//! [`SchemaBuilder`]. Every value handled by the engine is classified by a
//! shape, and every transformation unit is keyed by a [`TypePair`] of shape
//! identifiers.
//!
//! # Examples
//!
//! ```
//! use om_core::{RecordDef, ScalarKind, SchemaBuilder};
//!
//! let mut builder = SchemaBuilder::new();
//! let text = builder.scalar(ScalarKind::Text);
//! let node = builder.declare_record("Node").unwrap();
//! builder
//!     .define_record(node, RecordDef::new().member("Name", text).member("Next", node))
//!     .unwrap();
//! let schema = builder.build().unwrap();
//!
//! assert_eq!(schema.lookup("Node"), Some(node));
//! assert!(schema.shape(node).unwrap().is_reference());
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ConversionError};
use crate::hash::{FxHashMap, FxHashSet};
use crate::value::{EnumValue, ObjRef, ObjectData, StructValue, Value};

/// An opaque identifier for a shape within one [`Schema`].
///
/// Identifiers are dense indices handed out by the [`SchemaBuilder`]; an id
/// from one schema is meaningless in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub u32);

impl ShapeId {
    /// Creates a shape id from its raw index.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the index of this shape in its schema.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A (source shape, target shape) pair: the unit of strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypePair {
    /// Shape of the value being read.
    pub source: ShapeId,
    /// Shape of the value being produced.
    pub target: ShapeId,
}

impl TypePair {
    /// Creates a new type pair.
    #[inline]
    #[must_use]
    pub const fn new(source: ShapeId, target: ShapeId) -> Self {
        Self { source, target }
    }

    /// Returns `true` when source and target are the same shape.
    #[inline]
    #[must_use]
    pub fn is_identity(self) -> bool {
        self.source == self.target
    }
}

/// Builtin scalar kinds.
///
/// Every [`SchemaBuilder`] pre-registers one shape per kind, so
/// [`SchemaBuilder::scalar`] never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    /// `true` / `false`.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// 96-bit decimal.
    Decimal,
    /// A Unicode scalar value.
    Char,
    /// UTF-8 text.
    Text,
}

impl ScalarKind {
    /// All scalar kinds, in registration order.
    pub const ALL: [Self; 14] = [
        Self::Bool,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::Decimal,
        Self::Char,
        Self::Text,
    ];

    /// Returns the canonical lowercase name of this kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use om_core::ScalarKind;
    ///
    /// assert_eq!(ScalarKind::I32.name(), "i32");
    /// assert_eq!(ScalarKind::from_name("text"), Some(ScalarKind::Text));
    /// ```
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
            Self::Char => "char",
            Self::Text => "text",
        }
    }

    /// Parses a canonical kind name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Returns `true` for the signed integer kinds.
    #[inline]
    #[must_use]
    pub const fn is_signed_integer(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns `true` for the unsigned integer kinds.
    #[inline]
    #[must_use]
    pub const fn is_unsigned_integer(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Returns `true` for all integer kinds.
    #[inline]
    #[must_use]
    pub const fn is_integral(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    /// Returns `true` for `f32` and `f64`.
    #[inline]
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns `true` for integers, floats and decimals.
    #[inline]
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integral() || self.is_float() || matches!(self, Self::Decimal)
    }

    /// Returns the zero value of this kind.
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::I8 => Value::I8(0),
            Self::I16 => Value::I16(0),
            Self::I32 => Value::I32(0),
            Self::I64 => Value::I64(0),
            Self::U8 => Value::U8(0),
            Self::U16 => Value::U16(0),
            Self::U32 => Value::U32(0),
            Self::U64 => Value::U64(0),
            Self::F32 => Value::F32(0.0),
            Self::F64 => Value::F64(0.0),
            Self::Decimal => Value::Decimal(rust_decimal::Decimal::ZERO),
            Self::Char => Value::Char('\0'),
            Self::Text => Value::Text(String::new()),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named member of a struct or record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDef {
    /// Member name.
    pub name: String,
    /// Shape of the member value.
    pub shape: ShapeId,
}

/// Layout of a struct (value) or record (reference) shape.
///
/// Built with the chained helpers:
///
/// ```
/// use om_core::{RecordDef, ShapeId};
///
/// let def = RecordDef::new()
///     .member("Id", ShapeId::new(3))
///     .abstract_shape();
/// assert_eq!(def.member_index("Id"), Some(0));
/// assert!(def.is_abstract);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDef {
    /// Members in declaration order, base members first.
    pub members: Vec<MemberDef>,
    /// Optional base record whose members are inherited.
    pub base: Option<ShapeId>,
    /// Abstract records (interfaces) cannot be instantiated.
    pub is_abstract: bool,
    /// Whether the shape can be created without a custom constructor.
    pub default_constructible: bool,
}

impl Default for RecordDef {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            base: None,
            is_abstract: false,
            default_constructible: true,
        }
    }
}

impl RecordDef {
    /// Creates an empty, concrete, default-constructible layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member.
    #[must_use]
    pub fn member(mut self, name: impl Into<String>, shape: ShapeId) -> Self {
        self.members.push(MemberDef {
            name: name.into(),
            shape,
        });
        self
    }

    /// Sets the base record.
    #[must_use]
    pub const fn base(mut self, base: ShapeId) -> Self {
        self.base = Some(base);
        self
    }

    /// Marks the shape abstract.
    #[must_use]
    pub const fn abstract_shape(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Marks the shape as lacking a default constructor.
    #[must_use]
    pub const fn without_default_constructor(mut self) -> Self {
        self.default_constructible = false;
        self
    }

    /// Returns the index of the named member.
    #[must_use]
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

/// One named value of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    /// Variant name.
    pub name: String,
    /// Underlying value.
    pub value: i64,
}

/// An enumerated shape with an integral underlying kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    /// Integral kind the values are stored as.
    pub underlying: ScalarKind,
    /// Declared variants.
    pub variants: Vec<EnumVariant>,
}

impl EnumDef {
    /// Looks up a variant by exact name.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variants.iter().find(|v| v.name == name).map(|v| v.value)
    }

    /// Looks up a variant by name, ignoring ASCII case.
    #[must_use]
    pub fn value_of_ignore_case(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .map(|v| v.value)
    }

    /// Returns the name of the first variant with the given value.
    #[must_use]
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }
}

/// Sequence container flavours, each with its own insertion operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    /// Growable list; appends.
    List,
    /// LIFO stack; iteration order is pop order.
    Stack,
    /// FIFO queue; enqueues at the back.
    Queue,
    /// Doubly linked list; adds last.
    LinkedList,
    /// Read-only list; can only be built whole.
    ReadOnly,
    /// Insertion-ordered set; inserts if absent.
    Set,
    /// Ordered set; inserts in sort position if absent.
    SortedSet,
}

impl SequenceKind {
    /// All sequence kinds.
    pub const ALL: [Self; 7] = [
        Self::List,
        Self::Stack,
        Self::Queue,
        Self::LinkedList,
        Self::ReadOnly,
        Self::Set,
        Self::SortedSet,
    ];

    /// Returns the type-expression keyword for this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Stack => "stack",
            Self::Queue => "queue",
            Self::LinkedList => "linked_list",
            Self::ReadOnly => "read_only",
            Self::Set => "set",
            Self::SortedSet => "sorted_set",
        }
    }

    /// Parses a type-expression keyword.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Returns `true` if an existing instance can be modified in place.
    #[inline]
    #[must_use]
    pub const fn is_mutable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Parse/format contract of a textual shape.
///
/// Implemented by opaque value types that round-trip through text, such as
/// addresses or identifiers.
pub trait TextCodec: Send + Sync + fmt::Debug {
    /// Parses text into a value of the textual shape.
    fn parse(&self, text: &str) -> Result<Value, ConversionError>;

    /// Formats a value of the textual shape.
    fn format(&self, value: &Value) -> Result<String, ConversionError>;
}

/// The structural classification of a shape.
#[derive(Debug, Clone)]
pub enum ShapeKind {
    /// A builtin scalar.
    Scalar(ScalarKind),
    /// An optional wrapper; absence is [`Value::Null`].
    Optional(ShapeId),
    /// An enumeration.
    Enum(EnumDef),
    /// A value type copied member by member.
    Struct(RecordDef),
    /// A reference object with identity.
    Record(RecordDef),
    /// A fixed-size indexed sequence.
    Array(ShapeId),
    /// A growable sequence.
    Sequence {
        /// Container flavour.
        kind: SequenceKind,
        /// Element shape.
        element: ShapeId,
    },
    /// A key → value container.
    Dictionary {
        /// Key shape.
        key: ShapeId,
        /// Value shape.
        value: ShapeId,
    },
    /// An opaque value with a parse/format contract.
    Textual(Arc<dyn TextCodec>),
}

/// A named shape.
#[derive(Debug, Clone)]
pub struct Shape {
    /// Identifier within the owning schema.
    pub id: ShapeId,
    /// Display name, unique within the schema.
    pub name: String,
    /// Structural classification.
    pub kind: ShapeKind,
}

impl Shape {
    /// Returns `true` for shapes whose instances carry identity.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(
            self.kind,
            ShapeKind::Record(_)
                | ShapeKind::Array(_)
                | ShapeKind::Sequence { .. }
                | ShapeKind::Dictionary { .. }
        )
    }

    /// Returns the layout of a struct or record shape.
    #[must_use]
    pub const fn layout(&self) -> Option<&RecordDef> {
        match &self.kind {
            ShapeKind::Struct(def) | ShapeKind::Record(def) => Some(def),
            _ => None,
        }
    }

    /// Returns the scalar kind of a scalar shape.
    #[must_use]
    pub const fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.kind {
            ShapeKind::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` for abstract records.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        matches!(&self.kind, ShapeKind::Record(def) if def.is_abstract)
    }

    /// Returns the element shape of arrays and sequences.
    #[must_use]
    pub const fn element(&self) -> Option<ShapeId> {
        match self.kind {
            ShapeKind::Array(element) | ShapeKind::Sequence { element, .. } => Some(element),
            _ => None,
        }
    }
}

/// An immutable registry of shapes.
#[derive(Debug, Clone)]
pub struct Schema {
    shapes: Vec<Shape>,
    by_name: FxHashMap<String, ShapeId>,
}

impl Schema {
    /// Returns the shape with the given id.
    pub fn shape(&self, id: ShapeId) -> Result<&Shape, ConfigurationError> {
        self.shapes
            .get(id.index())
            .ok_or_else(|| ConfigurationError::UnknownShape(id.to_string()))
    }

    /// Looks up a shape id by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ShapeId> {
        self.by_name.get(name).copied()
    }

    /// Returns the id of a builtin scalar shape.
    #[must_use]
    pub fn scalar(&self, kind: ScalarKind) -> ShapeId {
        scalar_id(kind)
    }

    /// Returns the display name of a shape, or its id when unknown.
    #[must_use]
    pub fn name(&self, id: ShapeId) -> String {
        self.shapes
            .get(id.index())
            .map_or_else(|| id.to_string(), |shape| shape.name.clone())
    }

    /// Renders a type pair as `Source -> Target`.
    #[must_use]
    pub fn pair_label(&self, pair: TypePair) -> String {
        format!("{} -> {}", self.name(pair.source), self.name(pair.target))
    }

    /// Returns the number of shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Returns `true` if the schema holds no shapes (never the case for
    /// a built schema, which always contains the scalars).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterates over all shapes.
    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter()
    }

    /// Returns `true` if a value of shape `from` may stand where `to` is expected.
    #[must_use]
    pub fn is_assignable(&self, from: ShapeId, to: ShapeId) -> bool {
        let mut current = Some(from);
        while let Some(id) = current {
            if id == to {
                return true;
            }
            current = self
                .shapes
                .get(id.index())
                .and_then(Shape::layout)
                .and_then(|def| def.base);
        }
        false
    }

    /// Returns the zero value of a shape.
    ///
    /// Reference shapes, optionals and textual shapes are `Null`.
    #[must_use]
    pub fn zero_value(&self, id: ShapeId) -> Value {
        let Some(shape) = self.shapes.get(id.index()) else {
            return Value::Null;
        };
        match &shape.kind {
            ShapeKind::Scalar(kind) => kind.zero(),
            ShapeKind::Enum(_) => Value::Enum(EnumValue::new(id, 0)),
            ShapeKind::Struct(def) => Value::Struct(StructValue::new(
                id,
                def.members.iter().map(|m| self.zero_value(m.shape)).collect(),
            )),
            _ => Value::Null,
        }
    }

    /// Checks that [`instantiate`](Self::instantiate) can create `id`.
    pub fn check_constructible(&self, id: ShapeId) -> Result<(), ConfigurationError> {
        let shape = self.shape(id)?;
        let reason = match &shape.kind {
            ShapeKind::Record(def) if def.is_abstract => "shape is abstract",
            ShapeKind::Record(def) if !def.default_constructible => {
                "no default constructor and no custom constructor supplied"
            }
            ShapeKind::Record(_) | ShapeKind::Array(_) | ShapeKind::Sequence { .. } | ShapeKind::Dictionary { .. } => {
                return Ok(());
            }
            _ => "not a reference shape",
        };
        Err(ConfigurationError::not_constructible(&shape.name, reason))
    }

    /// Creates a fresh instance of a reference shape with its default
    /// constructor.
    pub fn instantiate(&self, id: ShapeId) -> Result<ObjRef, ConfigurationError> {
        self.check_constructible(id)?;
        let data = match &self.shape(id)?.kind {
            ShapeKind::Record(def) => {
                ObjectData::Fields(def.members.iter().map(|m| self.zero_value(m.shape)).collect())
            }
            ShapeKind::Dictionary { .. } => ObjectData::Entries(Vec::new()),
            _ => ObjectData::Items(Vec::new()),
        };
        Ok(ObjRef::new(id, data))
    }

    /// Creates a record instance and assigns the named fields.
    ///
    /// Unlisted members keep their zero value.
    pub fn object(&self, id: ShapeId, fields: &[(&str, Value)]) -> Result<ObjRef, ConfigurationError> {
        let object = self.instantiate(id)?;
        for (name, value) in fields {
            self.set_field(&object, name, value.clone())?;
        }
        Ok(object)
    }

    /// Reads a record field by name.
    #[must_use]
    pub fn field(&self, object: &ObjRef, name: &str) -> Option<Value> {
        let index = self.member_index(object.shape(), name)?;
        object.field(index)
    }

    /// Writes a record field by name.
    pub fn set_field(&self, object: &ObjRef, name: &str, value: Value) -> Result<(), ConfigurationError> {
        let index = self
            .member_index(object.shape(), name)
            .ok_or_else(|| ConfigurationError::UnknownMember {
                shape: self.name(object.shape()),
                member: name.to_owned(),
            })?;
        object.set_field(index, value);
        Ok(())
    }

    /// Returns the index of a member of a struct or record shape.
    #[must_use]
    pub fn member_index(&self, id: ShapeId, name: &str) -> Option<usize> {
        self.shapes
            .get(id.index())
            .and_then(Shape::layout)
            .and_then(|def| def.member_index(name))
    }

    /// Returns the runtime shape of a value, when it carries one.
    ///
    /// Scalars map to their builtin shape; `Null` and opaque values have no
    /// intrinsic shape.
    #[must_use]
    pub fn shape_of(&self, value: &Value) -> Option<ShapeId> {
        match value {
            Value::Ref(object) => Some(object.shape()),
            Value::Struct(value) => Some(value.shape),
            Value::Enum(value) => Some(value.shape),
            Value::Null | Value::Opaque(_) => None,
            other => other.scalar_kind().map(scalar_id),
        }
    }
}

const fn scalar_id(kind: ScalarKind) -> ShapeId {
    // Scalars are registered first, in `ScalarKind::ALL` order.
    ShapeId(kind as u32)
}

/// Mutable builder for a [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    shapes: Vec<Shape>,
    by_name: FxHashMap<String, ShapeId>,
    pending: FxHashSet<ShapeId>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a builder with all builtin scalars registered.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self {
            shapes: Vec::with_capacity(32),
            by_name: FxHashMap::default(),
            pending: FxHashSet::default(),
        };
        for kind in ScalarKind::ALL {
            builder.push(kind.name().to_owned(), ShapeKind::Scalar(kind));
        }
        builder
    }

    fn push(&mut self, name: String, kind: ShapeKind) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.shapes.push(Shape { id, name, kind });
        id
    }

    fn push_named(&mut self, name: &str, kind: ShapeKind) -> Result<ShapeId, ConfigurationError> {
        if self.by_name.contains_key(name) {
            return Err(ConfigurationError::InvalidSchema(format!(
                "shape `{name}` is declared twice"
            )));
        }
        Ok(self.push(name.to_owned(), kind))
    }

    fn push_derived(&mut self, name: String, kind: ShapeKind) -> ShapeId {
        match self.by_name.get(&name) {
            Some(id) => *id,
            None => self.push(name, kind),
        }
    }

    fn name_of(&self, id: ShapeId) -> String {
        self.shapes
            .get(id.index())
            .map_or_else(|| id.to_string(), |shape| shape.name.clone())
    }

    fn check(&self, id: ShapeId) -> Result<(), ConfigurationError> {
        if id.index() < self.shapes.len() {
            Ok(())
        } else {
            Err(ConfigurationError::UnknownShape(id.to_string()))
        }
    }

    /// Returns the id of a builtin scalar shape.
    #[must_use]
    pub fn scalar(&self, kind: ScalarKind) -> ShapeId {
        scalar_id(kind)
    }

    /// Looks up a shape registered so far.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ShapeId> {
        self.by_name.get(name).copied()
    }

    /// Registers (or reuses) the optional wrapper of `inner`.
    pub fn optional(&mut self, inner: ShapeId) -> Result<ShapeId, ConfigurationError> {
        self.check(inner)?;
        let name = format!("{}?", self.name_of(inner));
        Ok(self.push_derived(name, ShapeKind::Optional(inner)))
    }

    /// Registers (or reuses) an array of `element`.
    pub fn array(&mut self, element: ShapeId) -> Result<ShapeId, ConfigurationError> {
        self.check(element)?;
        let name = format!("{}[]", self.name_of(element));
        Ok(self.push_derived(name, ShapeKind::Array(element)))
    }

    /// Registers (or reuses) a sequence of `element`.
    pub fn sequence(&mut self, kind: SequenceKind, element: ShapeId) -> Result<ShapeId, ConfigurationError> {
        self.check(element)?;
        let name = format!("{}<{}>", kind.name(), self.name_of(element));
        Ok(self.push_derived(name, ShapeKind::Sequence { kind, element }))
    }

    /// Registers (or reuses) a dictionary from `key` to `value`.
    pub fn dictionary(&mut self, key: ShapeId, value: ShapeId) -> Result<ShapeId, ConfigurationError> {
        self.check(key)?;
        self.check(value)?;
        let name = format!("map<{}, {}>", self.name_of(key), self.name_of(value));
        Ok(self.push_derived(name, ShapeKind::Dictionary { key, value }))
    }

    /// Registers an enumeration over an integral kind.
    pub fn enumeration(
        &mut self,
        name: &str,
        underlying: ScalarKind,
        variants: &[(&str, i64)],
    ) -> Result<ShapeId, ConfigurationError> {
        if !underlying.is_integral() {
            return Err(ConfigurationError::InvalidSchema(format!(
                "enum `{name}` must have an integral underlying kind, not {underlying}"
            )));
        }
        let def = EnumDef {
            underlying,
            variants: variants
                .iter()
                .map(|(variant, value)| EnumVariant {
                    name: (*variant).to_owned(),
                    value: *value,
                })
                .collect(),
        };
        self.push_named(name, ShapeKind::Enum(def))
    }

    /// Registers a value-type struct.
    pub fn structure(&mut self, name: &str, def: RecordDef) -> Result<ShapeId, ConfigurationError> {
        for member in &def.members {
            self.check(member.shape)?;
        }
        self.push_named(name, ShapeKind::Struct(def))
    }

    /// Registers a textual shape backed by `codec`.
    pub fn textual(&mut self, name: &str, codec: Arc<dyn TextCodec>) -> Result<ShapeId, ConfigurationError> {
        self.push_named(name, ShapeKind::Textual(codec))
    }

    /// Forward-declares a record so that members may refer to it.
    ///
    /// The record must be completed with [`define_record`](Self::define_record)
    /// before [`build`](Self::build).
    pub fn declare_record(&mut self, name: &str) -> Result<ShapeId, ConfigurationError> {
        let id = self.push_named(name, ShapeKind::Record(RecordDef::new()))?;
        self.pending.insert(id);
        Ok(id)
    }

    /// Completes a declared record.
    pub fn define_record(&mut self, id: ShapeId, mut def: RecordDef) -> Result<(), ConfigurationError> {
        if !self.pending.contains(&id) {
            return Err(ConfigurationError::InvalidSchema(format!(
                "record `{}` is not awaiting a definition",
                self.name_of(id)
            )));
        }
        for member in &def.members {
            self.check(member.shape)?;
        }
        if let Some(base) = def.base {
            let inherited = match self.shapes.get(base.index()).map(|s| &s.kind) {
                Some(ShapeKind::Record(base_def)) if !self.pending.contains(&base) => {
                    base_def.members.clone()
                }
                _ => {
                    return Err(ConfigurationError::InvalidSchema(format!(
                        "base of `{}` must be a defined record",
                        self.name_of(id)
                    )));
                }
            };
            if let Some(clash) = def
                .members
                .iter()
                .find(|m| inherited.iter().any(|i| i.name == m.name))
            {
                return Err(ConfigurationError::InvalidSchema(format!(
                    "member `{}` of `{}` hides an inherited member",
                    clash.name,
                    self.name_of(id)
                )));
            }
            let own = std::mem::take(&mut def.members);
            def.members = inherited;
            def.members.extend(own);
        }
        if let Some(shape) = self.shapes.get_mut(id.index()) {
            shape.kind = ShapeKind::Record(def);
        }
        self.pending.remove(&id);
        Ok(())
    }

    /// Declares and defines a record in one step.
    pub fn record(&mut self, name: &str, def: RecordDef) -> Result<ShapeId, ConfigurationError> {
        let id = self.declare_record(name)?;
        self.define_record(id, def)?;
        Ok(id)
    }

    /// Freezes the schema.
    ///
    /// Fails when a declared record was never defined. Structs can only
    /// refer to shapes that already exist, so they never contain themselves.
    pub fn build(self) -> Result<Schema, ConfigurationError> {
        if let Some(id) = self.pending.iter().min() {
            return Err(ConfigurationError::InvalidSchema(format!(
                "record `{}` was declared but never defined",
                self.name_of(*id)
            )));
        }
        Ok(Schema {
            shapes: self.shapes,
            by_name: self.by_name,
        })
    }
}
