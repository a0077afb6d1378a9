//! Behavioral options and their override chain.
//!
//! Options can be attached at three levels: globally, per type pair and per
//! correspondence. [`OptionsOverride`] uses `None` as the "inherit" sentinel;
//! the engine folds the chain into an [`EffectiveOptions`], which is hashable
//! so it can take part in plan cache keys.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{ObjRef, Value};

/// Policy for an existing target-side object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceBehavior {
    /// Always materialize a new target instance.
    #[default]
    CreateNewInstance,
    /// Populate the target member's current instance when it is not null.
    UseTargetInstanceIfNotNull,
}

/// Policy for reconciling a source collection against the target's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionBehavior {
    /// Clear, then insert every source element.
    #[default]
    Reset,
    /// Keep existing elements and append every source element.
    Merge,
    /// Match elements with a comparer; update matches, add and remove the rest.
    Update,
}

/// Decides whether a source element and a target element represent the same
/// item under [`CollectionBehavior::Update`].
///
/// Two comparers are equal only if they are the same allocation.
#[derive(Clone)]
pub struct ElementComparer(Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>);

impl ElementComparer {
    /// Wraps a comparison function `(source element, target element)`.
    pub fn new(compare: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(compare))
    }

    /// A comparer using [`Value`] equality (identity for objects).
    #[must_use]
    pub fn by_value() -> Self {
        Self::new(|source, target| source == target)
    }

    /// Applies the comparer.
    #[inline]
    #[must_use]
    pub fn matches(&self, source: &Value, target: &Value) -> bool {
        (self.0)(source, target)
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl PartialEq for ElementComparer {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for ElementComparer {}

impl Hash for ElementComparer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for ElementComparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementComparer({:#x})", self.address())
    }
}

/// Creates target instances in place of the default constructor.
///
/// Two constructors are equal only if they are the same allocation.
#[derive(Clone)]
pub struct TargetConstructor(Arc<dyn Fn() -> ObjRef + Send + Sync>);

impl TargetConstructor {
    /// Wraps a constructor function.
    pub fn new(construct: impl Fn() -> ObjRef + Send + Sync + 'static) -> Self {
        Self(Arc::new(construct))
    }

    /// Invokes the constructor.
    #[inline]
    #[must_use]
    pub fn construct(&self) -> ObjRef {
        (self.0)()
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl PartialEq for TargetConstructor {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for TargetConstructor {}

impl Hash for TargetConstructor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for TargetConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetConstructor({:#x})", self.address())
    }
}

/// Process-wide defaults: the root of the override chain.
///
/// # Examples
///
/// ```
/// use om_core::{CollectionBehavior, GlobalOptions, ReferenceBehavior};
///
/// let defaults = GlobalOptions::default();
/// assert_eq!(defaults.reference_behavior, ReferenceBehavior::CreateNewInstance);
/// assert_eq!(defaults.collection_behavior, CollectionBehavior::Reset);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalOptions {
    /// Default reference behavior.
    pub reference_behavior: ReferenceBehavior,
    /// Default collection behavior.
    pub collection_behavior: CollectionBehavior,
}

/// Options set at the type-pair or correspondence level.
///
/// `None` in any field means "inherit from the next level up".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsOverride {
    /// Reference behavior override.
    pub reference_behavior: Option<ReferenceBehavior>,
    /// Collection behavior override.
    pub collection_behavior: Option<CollectionBehavior>,
    /// Element comparer override.
    pub comparer: Option<ElementComparer>,
    /// Target constructor override.
    pub constructor: Option<TargetConstructor>,
}

impl OptionsOverride {
    /// An override that inherits everything.
    #[must_use]
    pub fn inherit() -> Self {
        Self::default()
    }

    /// Sets the reference behavior.
    #[must_use]
    pub const fn with_reference_behavior(mut self, behavior: ReferenceBehavior) -> Self {
        self.reference_behavior = Some(behavior);
        self
    }

    /// Sets the collection behavior.
    #[must_use]
    pub const fn with_collection_behavior(mut self, behavior: CollectionBehavior) -> Self {
        self.collection_behavior = Some(behavior);
        self
    }

    /// Sets the element comparer.
    #[must_use]
    pub fn with_comparer(mut self, comparer: ElementComparer) -> Self {
        self.comparer = Some(comparer);
        self
    }

    /// Sets the target constructor.
    #[must_use]
    pub fn with_constructor(mut self, constructor: TargetConstructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.reference_behavior.is_none()
            && self.collection_behavior.is_none()
            && self.comparer.is_none()
            && self.constructor.is_none()
    }
}

/// Fully resolved options for one mapping unit.
///
/// Equality and hashing follow the cache-key fingerprint rules: scalar fields
/// by value, comparer and constructor by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EffectiveOptions {
    /// Resolved reference behavior.
    pub reference_behavior: ReferenceBehavior,
    /// Resolved collection behavior.
    pub collection_behavior: CollectionBehavior,
    /// Resolved comparer, if any level set one.
    pub comparer: Option<ElementComparer>,
    /// Resolved constructor, if any level set one.
    pub constructor: Option<TargetConstructor>,
}

impl From<GlobalOptions> for EffectiveOptions {
    fn from(global: GlobalOptions) -> Self {
        Self {
            reference_behavior: global.reference_behavior,
            collection_behavior: global.collection_behavior,
            comparer: None,
            constructor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_comparer_identity_equality() {
        let a = ElementComparer::by_value();
        let b = ElementComparer::by_value();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(hash_of(&a), hash_of(&a.clone()));
    }

    #[test]
    fn test_effective_options_fingerprint() {
        let comparer = ElementComparer::by_value();
        let a = EffectiveOptions {
            collection_behavior: CollectionBehavior::Update,
            comparer: Some(comparer.clone()),
            ..EffectiveOptions::default()
        };
        let b = EffectiveOptions {
            collection_behavior: CollectionBehavior::Update,
            comparer: Some(comparer),
            ..EffectiveOptions::default()
        };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = EffectiveOptions {
            comparer: Some(ElementComparer::by_value()),
            ..b
        };
        assert_ne!(a, c);
    }

    #[test]
    fn test_override_builders() {
        let options = OptionsOverride::inherit()
            .with_reference_behavior(ReferenceBehavior::UseTargetInstanceIfNotNull);
        assert!(!options.is_empty());
        assert!(OptionsOverride::inherit().is_empty());
    }

    #[test]
    fn test_global_options_serialization() {
        let json = r#"{"collection_behavior": "merge"}"#;
        let options: GlobalOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.collection_behavior, CollectionBehavior::Merge);
        assert_eq!(options.reference_behavior, ReferenceBehavior::CreateNewInstance);
    }
}
