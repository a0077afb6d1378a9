//! Per-invocation identity map.
//!
//! Maps (source object, target shape) to the target object materialized for
//! it. Entries are recorded before the object's members are populated, which
//! is what makes cycles terminate.

use om_core::{FxHashMap, ObjRef, ObjectId, ShapeId, fx_hash_map_with_capacity};

/// Identity map of one top-level mapping call.
///
/// The tracker holds a handle to every recorded source object so that no
/// source identity can be freed and reused while the call is running.
///
/// # Examples
///
/// ```
/// use om_core::{ObjRef, ObjectData, ShapeId};
/// use om_engine::ReferenceTracker;
///
/// let mut tracker = ReferenceTracker::with_capacity(4);
/// let source = ObjRef::new(ShapeId::new(20), ObjectData::Fields(vec![]));
/// let target = ObjRef::new(ShapeId::new(21), ObjectData::Fields(vec![]));
///
/// assert!(tracker.record(&source, ShapeId::new(21), target.clone()));
/// assert_eq!(tracker.try_get(&source, ShapeId::new(21)), Some(target));
/// assert_eq!(tracker.try_get(&source, ShapeId::new(22)), None);
/// ```
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    entries: FxHashMap<(ObjectId, ShapeId), ObjRef>,
    pinned: Vec<ObjRef>,
}

impl ReferenceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tracker sized for `capacity` objects.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: fx_hash_map_with_capacity(capacity),
            pinned: Vec::with_capacity(capacity),
        }
    }

    /// Returns the target already materialized for `source` as `target_shape`.
    #[must_use]
    pub fn try_get(&self, source: &ObjRef, target_shape: ShapeId) -> Option<ObjRef> {
        self.entries.get(&(source.id(), target_shape)).cloned()
    }

    /// Records the target of `source` as `target_shape`.
    ///
    /// A key is recorded at most once; returns `false` and keeps the first
    /// target if the key is already present.
    pub fn record(&mut self, source: &ObjRef, target_shape: ShapeId, target: ObjRef) -> bool {
        let key = (source.id(), target_shape);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, target);
        self.pinned.push(source.clone());
        true
    }

    /// Number of recorded keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
