//! Dynamic values.
//!
//! Scalars, enums, structs and opaque textual values are plain data and are
//! cloned by value. Records and containers live behind an [`ObjRef`], a
//! shared handle whose pointer identity is what the reference tracker keys
//! on.
//!
//! # Examples
//!
//! ```
//! use om_core::{ObjRef, ObjectData, ShapeId, Value};
//!
//! let a = ObjRef::new(ShapeId::new(20), ObjectData::Items(vec![Value::I32(1)]));
//! let b = a.clone();
//! assert!(a.ptr_eq(&b));
//! assert_eq!(Value::Ref(a), Value::Ref(b));
//! ```

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::shape::{ScalarKind, ShapeId};

/// Identity of a reference object, stable while the object is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Returns the raw identity.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:x}", self.0)
    }
}

/// Storage of a reference object.
#[derive(Debug, Clone)]
pub enum ObjectData {
    /// Record members, indexed like the shape's member list.
    Fields(Vec<Value>),
    /// Array or sequence elements in iteration order.
    Items(Vec<Value>),
    /// Dictionary entries in insertion order.
    Entries(Vec<(Value, Value)>),
}

/// A heap object: its runtime shape plus its storage.
#[derive(Debug, Clone)]
pub struct Object {
    /// Runtime shape (may be a subtype of the static shape).
    pub shape: ShapeId,
    /// Contents.
    pub data: ObjectData,
}

/// A shared handle to a reference object.
///
/// Cloning the handle never clones the object. Equality is identity.
#[derive(Clone)]
pub struct ObjRef(Rc<RefCell<Object>>);

impl ObjRef {
    /// Allocates a new object.
    #[must_use]
    pub fn new(shape: ShapeId, data: ObjectData) -> Self {
        Self(Rc::new(RefCell::new(Object { shape, data })))
    }

    /// Returns the identity of this object.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        ObjectId(Rc::as_ptr(&self.0).cast::<()>() as usize)
    }

    /// Returns `true` if both handles point at the same object.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the runtime shape of the object.
    #[must_use]
    pub fn shape(&self) -> ShapeId {
        self.0.borrow().shape
    }

    /// Borrows the object.
    ///
    /// Do not hold the borrow across a call that may reach the same object
    /// again (cyclic graphs do).
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Mutably borrows the object.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    /// Returns a clone of the field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<Value> {
        match &self.0.borrow().data {
            ObjectData::Fields(fields) => fields.get(index).cloned(),
            _ => None,
        }
    }

    /// Overwrites the field at `index`; returns `false` if there is none.
    pub fn set_field(&self, index: usize, value: Value) -> bool {
        match &mut self.0.borrow_mut().data {
            ObjectData::Fields(fields) => fields.get_mut(index).map(|slot| *slot = value).is_some(),
            _ => false,
        }
    }

    /// Returns a snapshot of the elements of an array or sequence.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        match &self.0.borrow().data {
            ObjectData::Items(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Replaces the elements of an array or sequence.
    pub fn set_items(&self, items: Vec<Value>) {
        self.0.borrow_mut().data = ObjectData::Items(items);
    }

    /// Returns a snapshot of the entries of a dictionary.
    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match &self.0.borrow().data {
            ObjectData::Entries(entries) => entries.clone(),
            _ => Vec::new(),
        }
    }

    /// Replaces the entries of a dictionary.
    pub fn set_entries(&self, entries: Vec<(Value, Value)>) {
        self.0.borrow_mut().data = ObjectData::Entries(entries);
    }

    /// Returns the number of elements, entries or fields.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.0.borrow().data {
            ObjectData::Fields(v) | ObjectData::Items(v) => v.len(),
            ObjectData::Entries(v) => v.len(),
        }
    }

    /// Returns `true` if [`len`](Self::len) is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ObjRef {
    // Never recurse: object graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "ObjRef({}, shape {})", self.id(), object.shape),
            Err(_) => write!(f, "ObjRef({}, <borrowed>)", self.id()),
        }
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjRef {}

/// An enum value: its shape and underlying integer.
///
/// The value need not correspond to a declared variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Enumeration shape.
    pub shape: ShapeId,
    /// Underlying value.
    pub value: i64,
}

impl EnumValue {
    /// Creates an enum value.
    #[must_use]
    pub const fn new(shape: ShapeId, value: i64) -> Self {
        Self { shape, value }
    }
}

/// A value-type struct instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Struct shape.
    pub shape: ShapeId,
    /// Members, indexed like the shape's member list.
    pub fields: Vec<Value>,
}

impl StructValue {
    /// Creates a struct value.
    #[must_use]
    pub const fn new(shape: ShapeId, fields: Vec<Value>) -> Self {
        Self { shape, fields }
    }
}

/// An opaque payload of a textual shape.
#[derive(Clone)]
pub struct OpaqueValue(Arc<dyn Any + Send + Sync>);

impl OpaqueValue {
    /// Wraps a payload.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    /// Downcasts the payload.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueValue(..)")
    }
}

/// A dynamically shaped value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value (null reference or empty optional).
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// `i8`.
    I8(i8),
    /// `i16`.
    I16(i16),
    /// `i32`.
    I32(i32),
    /// `i64`.
    I64(i64),
    /// `u8`.
    U8(u8),
    /// `u16`.
    U16(u16),
    /// `u32`.
    U32(u32),
    /// `u64`.
    U64(u64),
    /// `f32`.
    F32(f32),
    /// `f64`.
    F64(f64),
    /// Decimal.
    Decimal(Decimal),
    /// Character.
    Char(char),
    /// Text.
    Text(String),
    /// Enumeration value.
    Enum(EnumValue),
    /// Struct value.
    Struct(StructValue),
    /// Opaque textual value.
    Opaque(OpaqueValue),
    /// Reference object.
    Ref(ObjRef),
}

impl Value {
    /// Creates a text value.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns `true` for [`Value::Null`].
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the object handle of a reference value.
    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Self::Ref(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the text of a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns integral, char, bool and enum values widened to `i128`.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Self::Bool(v) => i128::from(v),
            Self::I8(v) => i128::from(v),
            Self::I16(v) => i128::from(v),
            Self::I32(v) => i128::from(v),
            Self::I64(v) => i128::from(v),
            Self::U8(v) => i128::from(v),
            Self::U16(v) => i128::from(v),
            Self::U32(v) => i128::from(v),
            Self::U64(v) => i128::from(v),
            Self::Char(v) => i128::from(u32::from(v)),
            Self::Enum(v) => i128::from(v.value),
            _ => return None,
        })
    }

    /// Returns the builtin scalar kind of a scalar value.
    #[must_use]
    pub const fn scalar_kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::I8(_) => ScalarKind::I8,
            Self::I16(_) => ScalarKind::I16,
            Self::I32(_) => ScalarKind::I32,
            Self::I64(_) => ScalarKind::I64,
            Self::U8(_) => ScalarKind::U8,
            Self::U16(_) => ScalarKind::U16,
            Self::U32(_) => ScalarKind::U32,
            Self::U64(_) => ScalarKind::U64,
            Self::F32(_) => ScalarKind::F32,
            Self::F64(_) => ScalarKind::F64,
            Self::Decimal(_) => ScalarKind::Decimal,
            Self::Char(_) => ScalarKind::Char,
            Self::Text(_) => ScalarKind::Text,
            _ => return None,
        })
    }

    /// Short description of the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Enum(_) => "enum",
            Self::Struct(_) => "struct",
            Self::Opaque(_) => "opaque",
            Self::Ref(_) => "object",
            other => match other.scalar_kind() {
                Some(kind) => kind.name(),
                None => "value",
            },
        }
    }

    /// Total order used by sorted containers.
    ///
    /// Numbers of any kind compare numerically; text and chars
    /// lexicographically; objects by identity. Values of unrelated kinds are
    /// ordered by a fixed kind rank.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Char(a), Self::Char(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => a.cmp(b),
            (Self::Enum(a), Self::Enum(b)) => a.value.cmp(&b.value),
            (Self::Ref(a), Self::Ref(b)) => a.id().cmp(&b.id()),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            Self::Decimal(v) => rust_decimal::prelude::ToPrimitive::to_f64(&v),
            Self::Bool(_) | Self::Char(_) | Self::Enum(_) => None,
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::I8(_)
            | Self::I16(_)
            | Self::I32(_)
            | Self::I64(_)
            | Self::U8(_)
            | Self::U16(_)
            | Self::U32(_)
            | Self::U64(_)
            | Self::F32(_)
            | Self::F64(_)
            | Self::Decimal(_) => 2,
            Self::Char(_) => 3,
            Self::Text(_) => 4,
            Self::Enum(_) => 5,
            Self::Struct(_) => 6,
            Self::Opaque(_) => 7,
            Self::Ref(_) => 8,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::I8(a), Self::I8(b)) => a == b,
            (Self::I16(a), Self::I16(b)) => a == b,
            (Self::I32(a), Self::I32(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::U8(a), Self::U8(b)) => a == b,
            (Self::U16(a), Self::U16(b)) => a == b,
            (Self::U32(a), Self::U32(b)) => a == b,
            (Self::U64(a), Self::U64(b)) => a == b,
            (Self::F32(a), Self::F32(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Self::Ref(a), Self::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    char => Char,
    String => Text,
    ObjRef => Ref,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: Vec<Value>) -> ObjRef {
        ObjRef::new(ShapeId::new(99), ObjectData::Items(items))
    }

    #[test]
    fn test_ref_equality_is_identity() {
        let a = list(vec![Value::I32(1)]);
        let b = list(vec![Value::I32(1)]);
        assert_ne!(Value::Ref(a.clone()), Value::Ref(b));
        assert_eq!(Value::Ref(a.clone()), Value::Ref(a));
    }

    #[test]
    fn test_scalar_equality_is_structural() {
        assert_eq!(Value::from("x"), Value::text("x"));
        assert_ne!(Value::I32(1), Value::I64(1));
        assert_eq!(Value::from(Some(3_i32)), Value::I32(3));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn test_field_access() {
        let object = ObjRef::new(ShapeId::new(50), ObjectData::Fields(vec![Value::Null]));
        assert!(object.set_field(0, Value::I32(7)));
        assert!(!object.set_field(1, Value::I32(7)));
        assert_eq!(object.field(0), Some(Value::I32(7)));
        assert_eq!(object.field(1), None);
    }

    #[test]
    fn test_debug_does_not_recurse_into_cycles() {
        let object = ObjRef::new(ShapeId::new(50), ObjectData::Fields(vec![Value::Null]));
        object.set_field(0, Value::Ref(object.clone()));
        let rendered = format!("{object:?}");
        assert!(rendered.starts_with("ObjRef("));
    }

    #[test]
    fn test_sort_cmp_orders_numbers_across_kinds() {
        assert_eq!(Value::I32(2).sort_cmp(&Value::F64(2.5)), Ordering::Less);
        assert_eq!(Value::text("b").sort_cmp(&Value::text("a")), Ordering::Greater);
        assert_eq!(Value::Null.sort_cmp(&Value::I32(0)), Ordering::Less);
    }

    #[test]
    fn test_opaque_downcast() {
        let value = OpaqueValue::new(42_u16);
        assert_eq!(value.downcast_ref::<u16>(), Some(&42));
        assert!(value.downcast_ref::<u32>().is_none());
    }
}
