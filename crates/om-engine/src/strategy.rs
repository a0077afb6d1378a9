//! Transformation strategies and their priority-ordered registry.

use std::fmt;

use om_core::{ConfigurationError, FxHashMap, Schema, TypePair};
use parking_lot::RwLock;
use tracing::debug;

use crate::compiler::BuildContext;
use crate::plan::{PlanBody, PlanKey};
use crate::strategies;

/// A rule that turns a type pair into a plan body.
///
/// Strategies are asked in registry order; the first whose
/// [`can_handle`](Self::can_handle) accepts a pair builds its plan. Nested
/// units are requested through [`BuildContext::require`].
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Stable name shown in plans and logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy applies to `pair`.
    fn can_handle(&self, schema: &Schema, pair: TypePair) -> bool;

    /// Builds the plan body for `key`.
    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<PlanBody, ConfigurationError>;
}

/// Priority-ordered strategies with a per-pair selection memo.
///
/// # Examples
///
/// ```
/// use om_engine::StrategyRegistry;
///
/// let registry = StrategyRegistry::new();
/// assert_eq!(registry.names().first(), Some(&"text-enum"));
/// assert_eq!(registry.names().last(), Some(&"reference"));
/// ```
#[derive(Debug)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
    memo: RwLock<FxHashMap<TypePair, Option<usize>>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    /// Creates a registry with the builtin strategies in their default order.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for strategy in strategies::builtin() {
            registry.strategies.push(strategy);
        }
        registry
    }

    /// Creates a registry without any strategy.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
            memo: RwLock::new(FxHashMap::default()),
        }
    }

    /// Appends a strategy at the lowest priority.
    pub fn push(&mut self, strategy: impl Strategy + 'static) {
        self.strategies.push(Box::new(strategy));
        self.memo.get_mut().clear();
    }

    /// Inserts a strategy right before the one named `before`.
    ///
    /// Returns `false` and leaves the registry unchanged if there is no
    /// strategy by that name.
    pub fn insert_before(&mut self, before: &str, strategy: impl Strategy + 'static) -> bool {
        let Some(index) = self.strategies.iter().position(|s| s.name() == before) else {
            return false;
        };
        self.strategies.insert(index, Box::new(strategy));
        self.memo.get_mut().clear();
        true
    }

    /// Strategy names in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Number of strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns `true` if the registry holds no strategy.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns the first strategy that handles `pair`.
    pub fn select(&self, schema: &Schema, pair: TypePair) -> Option<&dyn Strategy> {
        let memoized = self.memo.read().get(&pair).copied();
        let index = match memoized {
            Some(index) => index,
            None => {
                let index = self
                    .strategies
                    .iter()
                    .position(|s| s.can_handle(schema, pair));
                debug!(
                    pair = %schema.pair_label(pair),
                    strategy = index.map_or("none", |i| self.strategies[i].name()),
                    "selected strategy"
                );
                self.memo.write().insert(pair, index);
                index
            }
        };
        index.and_then(|i| self.strategies.get(i)).map(|s| &**s)
    }
}
