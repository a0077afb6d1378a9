//! Collection reconciliation.
//!
//! [`reconcile`] decides which existing target elements survive and which
//! converted source elements are new. How the result is laid out (append,
//! insert if absent, sorted insert, indexed write) is up to the collection
//! kind.

use om_core::{CollectionBehavior, ElementComparer, MapError, Value};

/// Whether and how a nested plan may reuse a target value.
#[derive(Debug, Clone)]
pub(crate) enum Existing {
    /// Nothing to reuse.
    None,
    /// The current target value, reused only where the options allow it.
    PerOptions(Value),
    /// A target the caller requires to be populated in place.
    Forced(Value),
}

impl Existing {
    /// Wraps the current value of a target member.
    pub(crate) fn current(value: Option<Value>) -> Self {
        match value {
            Some(value) if !value.is_null() => Self::PerOptions(value),
            _ => Self::None,
        }
    }

    pub(crate) const fn value(&self) -> Option<&Value> {
        match self {
            Self::None => None,
            Self::PerOptions(value) | Self::Forced(value) => Some(value),
        }
    }

    pub(crate) const fn is_forced(&self) -> bool {
        matches!(self, Self::Forced(_))
    }
}

/// Elements of a reconciled collection.
#[derive(Debug, Default)]
pub(crate) struct Reconciled {
    /// Surviving target elements in their original order, updated in place
    /// where matched.
    pub(crate) kept: Vec<Value>,
    /// Converted source elements without a surviving counterpart, in source
    /// order.
    pub(crate) added: Vec<Value>,
}

impl Reconciled {
    pub(crate) fn into_vec(self) -> Vec<Value> {
        let mut all = self.kept;
        all.extend(self.added);
        all
    }
}

/// Reconciles `source` against the `existing` target elements.
///
/// - `Reset` drops every existing element.
/// - `Merge` keeps every existing element.
/// - `Update` visits source elements in order; each claims the first
///   unclaimed existing element the comparer matches and is mapped onto it.
///   Unclaimed existing elements are dropped.
///
/// `map` converts one source element, optionally onto an existing one.
pub(crate) fn reconcile<F>(
    behavior: CollectionBehavior,
    comparer: Option<&ElementComparer>,
    existing: Vec<Value>,
    source: &[Value],
    mut map: F,
) -> Result<Reconciled, MapError>
where
    F: FnMut(&Value, Existing) -> Result<Value, MapError>,
{
    let mut out = Reconciled::default();
    match (behavior, comparer) {
        (CollectionBehavior::Update, Some(comparer)) => {
            let mut claimed: Vec<Option<Value>> = vec![None; existing.len()];
            for element in source {
                let slot = existing
                    .iter()
                    .enumerate()
                    .find(|(i, target)| claimed[*i].is_none() && comparer.matches(element, target))
                    .map(|(i, _)| i);
                match slot {
                    Some(i) => {
                        claimed[i] = Some(map(element, Existing::Forced(existing[i].clone()))?);
                    }
                    None => out.added.push(map(element, Existing::None)?),
                }
            }
            out.kept = claimed.into_iter().flatten().collect();
        }
        (CollectionBehavior::Merge, _) => {
            out.kept = existing;
            for element in source {
                out.added.push(map(element, Existing::None)?);
            }
        }
        _ => {
            for element in source {
                out.added.push(map(element, Existing::None)?);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().map(|v| Value::I32(*v)).collect()
    }

    fn double(value: &Value, _existing: Existing) -> Result<Value, MapError> {
        match value {
            Value::I32(v) => Ok(Value::I32(v * 2)),
            other => Ok(other.clone()),
        }
    }

    #[test]
    fn test_reset_replaces() {
        let out = reconcile(CollectionBehavior::Reset, None, ints(&[9, 9]), &ints(&[1, 2]), double).unwrap();
        assert_eq!(out.into_vec(), ints(&[2, 4]));
    }

    #[test]
    fn test_merge_appends() {
        let out = reconcile(CollectionBehavior::Merge, None, ints(&[9]), &ints(&[1, 2]), double).unwrap();
        assert_eq!(out.kept, ints(&[9]));
        assert_eq!(out.into_vec(), ints(&[9, 2, 4]));
    }

    #[test]
    fn test_update_first_match_wins() {
        // Matches when the target is twice the source.
        let comparer = ElementComparer::new(|s, t| match (s, t) {
            (Value::I32(s), Value::I32(t)) => s * 2 == *t,
            _ => false,
        });
        let mut forced = Vec::new();
        let out = reconcile(
            CollectionBehavior::Update,
            Some(&comparer),
            ints(&[2, 8, 4, 2]),
            &ints(&[1, 1, 1, 5]),
            |value, existing| {
                if let Existing::Forced(target) = &existing {
                    forced.push(target.clone());
                }
                double(value, existing)
            },
        )
        .unwrap();
        // Source 1 claims the first 2, the second 1 claims the last 2, the
        // third 1 finds nothing unclaimed and is added. The 8 and 4 are removed.
        assert_eq!(forced, ints(&[2, 2]));
        assert_eq!(out.kept, ints(&[2, 2]));
        assert_eq!(out.added, ints(&[2, 10]));
    }

    #[test]
    fn test_existing_current_skips_null() {
        assert!(matches!(Existing::current(None), Existing::None));
        assert!(matches!(Existing::current(Some(Value::Null)), Existing::None));
        let existing = Existing::current(Some(Value::I32(1)));
        assert!(!existing.is_forced());
        assert_eq!(existing.value(), Some(&Value::I32(1)));
    }
}
