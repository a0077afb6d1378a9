//! Options resolution: member → type pair → global.

use om_core::{EffectiveOptions, GlobalOptions, OptionsOverride};

/// Resolves the effective options of one mapping unit.
///
/// Each field takes the member-level value if set, else the type-pair value
/// if set, else the global default. Comparer and constructor have no global
/// default.
///
/// # Examples
///
/// ```
/// use om_core::{CollectionBehavior, GlobalOptions, OptionsOverride, ReferenceBehavior};
/// use om_engine::resolve_options;
///
/// let pair = OptionsOverride::inherit().with_collection_behavior(CollectionBehavior::Merge);
/// let member = OptionsOverride::inherit()
///     .with_reference_behavior(ReferenceBehavior::UseTargetInstanceIfNotNull);
///
/// let options = resolve_options(Some(&member), Some(&pair), &GlobalOptions::default());
/// assert_eq!(options.collection_behavior, CollectionBehavior::Merge);
/// assert_eq!(options.reference_behavior, ReferenceBehavior::UseTargetInstanceIfNotNull);
/// ```
#[must_use]
pub fn resolve_options(
    member: Option<&OptionsOverride>,
    pair: Option<&OptionsOverride>,
    global: &GlobalOptions,
) -> EffectiveOptions {
    let reference_behavior = member
        .and_then(|o| o.reference_behavior)
        .or_else(|| pair.and_then(|o| o.reference_behavior))
        .unwrap_or(global.reference_behavior);
    let collection_behavior = member
        .and_then(|o| o.collection_behavior)
        .or_else(|| pair.and_then(|o| o.collection_behavior))
        .unwrap_or(global.collection_behavior);
    let comparer = member
        .and_then(|o| o.comparer.clone())
        .or_else(|| pair.and_then(|o| o.comparer.clone()));
    let constructor = member
        .and_then(|o| o.constructor.clone())
        .or_else(|| pair.and_then(|o| o.constructor.clone()));
    EffectiveOptions {
        reference_behavior,
        collection_behavior,
        comparer,
        constructor,
    }
}

/// Lays the fields a type pair sets over already effective options.
///
/// Used when a polymorphic unit dispatches to a runtime pair: the dispatched
/// unit keeps the options it was reached with unless its own pair says
/// otherwise.
#[must_use]
pub(crate) fn overlay(base: &EffectiveOptions, pair: Option<&OptionsOverride>) -> EffectiveOptions {
    let Some(pair) = pair else {
        return base.clone();
    };
    EffectiveOptions {
        reference_behavior: pair.reference_behavior.unwrap_or(base.reference_behavior),
        collection_behavior: pair.collection_behavior.unwrap_or(base.collection_behavior),
        comparer: pair.comparer.clone().or_else(|| base.comparer.clone()),
        constructor: pair.constructor.clone().or_else(|| base.constructor.clone()),
    }
}

#[cfg(test)]
mod tests {
    use om_core::{CollectionBehavior, ElementComparer, ReferenceBehavior};

    use super::*;

    #[test]
    fn test_global_defaults_when_nothing_set() {
        let options = resolve_options(None, None, &GlobalOptions::default());
        assert_eq!(options, EffectiveOptions::default());
    }

    #[test]
    fn test_member_wins_over_pair() {
        let pair = OptionsOverride::inherit().with_collection_behavior(CollectionBehavior::Merge);
        let member = OptionsOverride::inherit().with_collection_behavior(CollectionBehavior::Reset);
        let options = resolve_options(Some(&member), Some(&pair), &GlobalOptions::default());
        assert_eq!(options.collection_behavior, CollectionBehavior::Reset);
    }

    #[test]
    fn test_fields_resolve_independently() {
        let comparer = ElementComparer::by_value();
        let pair = OptionsOverride::inherit()
            .with_comparer(comparer.clone())
            .with_reference_behavior(ReferenceBehavior::UseTargetInstanceIfNotNull);
        let member = OptionsOverride::inherit().with_collection_behavior(CollectionBehavior::Update);
        let global = GlobalOptions {
            collection_behavior: CollectionBehavior::Merge,
            ..GlobalOptions::default()
        };

        let options = resolve_options(Some(&member), Some(&pair), &global);
        assert_eq!(options.collection_behavior, CollectionBehavior::Update);
        assert_eq!(
            options.reference_behavior,
            ReferenceBehavior::UseTargetInstanceIfNotNull
        );
        assert_eq!(options.comparer, Some(comparer));
    }

    #[test]
    fn test_resolution_is_stable() {
        let comparer = ElementComparer::by_value();
        let pair = OptionsOverride::inherit().with_comparer(comparer);
        let a = resolve_options(None, Some(&pair), &GlobalOptions::default());
        let b = resolve_options(None, Some(&pair), &GlobalOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlay_keeps_unset_fields() {
        let base = EffectiveOptions {
            collection_behavior: CollectionBehavior::Merge,
            ..EffectiveOptions::default()
        };
        let pair = OptionsOverride::inherit()
            .with_reference_behavior(ReferenceBehavior::UseTargetInstanceIfNotNull);
        let options = overlay(&base, Some(&pair));
        assert_eq!(options.collection_behavior, CollectionBehavior::Merge);
        assert_eq!(
            options.reference_behavior,
            ReferenceBehavior::UseTargetInstanceIfNotNull
        );
        assert_eq!(overlay(&base, None), base);
    }
}
