//! Plan compilation and the process-wide plan cache.
//!
//! # Locking
//!
//! - Cache hits take only the read side of the cache lock.
//! - Misses are serialized by the compile mutex and re-check the cache
//!   after acquiring it, so a key is compiled once.
//! - A miss compiles the whole tree of nested units into a staging map and
//!   commits it under the write lock only if every unit built.
//!
//! A unit that is still being built when one of its members asks for it
//! again (a self-referential record) is not built twice: the member simply
//! refers to it by key.

use std::sync::Arc;

use om_core::{
    ConfigurationError, CorrespondenceList, EffectiveOptions, FxHashMap, FxHashSet, OptionsOverride,
    Schema, TypePair,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::configuration::Configuration;
use crate::options::{overlay, resolve_options};
use crate::plan::{MemberPlan, Plan, PlanBody, PlanKey, RecordPlan, ValueStep};
use crate::stats::MapperStats;
use crate::strategy::StrategyRegistry;

/// Compiles and caches plans.
#[derive(Debug)]
pub struct PlanCompiler {
    registry: StrategyRegistry,
    cache: RwLock<FxHashMap<PlanKey, Arc<Plan>>>,
    compile_lock: Mutex<()>,
    stats: Arc<MapperStats>,
    log_plans: bool,
}

impl PlanCompiler {
    /// Creates a compiler over `registry` reporting into `stats`.
    #[must_use]
    pub fn new(registry: StrategyRegistry, stats: Arc<MapperStats>) -> Self {
        Self {
            registry,
            cache: RwLock::new(FxHashMap::default()),
            compile_lock: Mutex::new(()),
            stats,
            log_plans: false,
        }
    }

    /// Logs every compiled plan body at `debug` level.
    #[must_use]
    pub const fn with_plan_logging(mut self, enabled: bool) -> Self {
        self.log_plans = enabled;
        self
    }

    /// The strategy registry.
    #[must_use]
    pub const fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Number of cached plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns `true` if nothing was compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Returns the cached plan of `key` without compiling.
    #[must_use]
    pub fn cached(&self, key: &PlanKey) -> Option<Arc<Plan>> {
        self.cache.read().get(key).map(Arc::clone)
    }

    /// Returns the plan of `key`, compiling it and every nested unit on a miss.
    pub fn get_plan(&self, config: &Configuration, key: &PlanKey) -> Result<Arc<Plan>, ConfigurationError> {
        if let Some(plan) = self.cached(key) {
            self.stats.increment_cache_hits();
            trace!(pair = %config.schema().pair_label(key.pair), "plan cache hit");
            return Ok(plan);
        }

        let _guard = self.compile_lock.lock();
        if let Some(plan) = self.cached(key) {
            self.stats.increment_cache_hits();
            return Ok(plan);
        }
        self.stats.increment_cache_misses();

        let mut ctx = BuildContext {
            config,
            compiler: self,
            pending: FxHashSet::default(),
            staged: FxHashMap::default(),
        };
        ctx.ensure(key)?;
        let BuildContext { staged, .. } = ctx;

        let mut cache = self.cache.write();
        for (staged_key, plan) in staged {
            self.stats.increment_plans_compiled();
            cache.entry(staged_key).or_insert(plan);
        }
        cache
            .get(key)
            .map(Arc::clone)
            .ok_or_else(|| ConfigurationError::UnknownShape(config.schema().pair_label(key.pair)))
    }

    fn build(&self, ctx: &mut BuildContext<'_>, key: &PlanKey) -> Result<Plan, ConfigurationError> {
        let schema = ctx.schema();
        let label = schema.pair_label(key.pair);
        let (strategy, body) = if let Some(converter) = ctx.config().converter(key.pair) {
            ("custom", PlanBody::Custom(converter.clone()))
        } else {
            let strategy = self
                .registry
                .select(schema, key.pair)
                .ok_or_else(|| ConfigurationError::NoStrategy { pair: label.clone() })?;
            (strategy.name(), strategy.build(ctx, key)?)
        };
        debug!(pair = %label, strategy, "compiled plan");
        if self.log_plans {
            debug!(pair = %label, plan = ?body, "plan body");
        }
        Ok(Plan {
            key: key.clone(),
            strategy,
            body,
        })
    }
}

/// State of one compile session, handed to [`Strategy::build`](crate::Strategy::build).
#[derive(Debug)]
pub struct BuildContext<'a> {
    config: &'a Configuration,
    compiler: &'a PlanCompiler,
    pending: FxHashSet<PlanKey>,
    staged: FxHashMap<PlanKey, Arc<Plan>>,
}

impl<'a> BuildContext<'a> {
    /// The schema.
    #[must_use]
    pub fn schema(&self) -> &'a Schema {
        self.config.schema()
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &'a Configuration {
        self.config
    }

    /// Requests the nested unit for `pair`, resolving its options from the
    /// member override, the pair override and the global defaults.
    ///
    /// Returns the key the current plan should refer to.
    pub fn require(&mut self, pair: TypePair, member: Option<&OptionsOverride>) -> Result<PlanKey, ConfigurationError> {
        let options = resolve_options(member, self.config.pair_options(pair), self.config.defaults());
        let key = PlanKey::new(pair, options);
        self.ensure(&key)?;
        Ok(key)
    }

    /// Requests the nested unit for `pair` behind a transparent wrapper such
    /// as an optional: it keeps `options` except where the pair overrides
    /// them.
    pub fn require_inheriting(
        &mut self,
        pair: TypePair,
        options: &EffectiveOptions,
    ) -> Result<PlanKey, ConfigurationError> {
        let key = PlanKey::new(pair, overlay(options, self.config.pair_options(pair)));
        self.ensure(&key)?;
        Ok(key)
    }

    /// Builds the member steps of a struct or record pair from its
    /// correspondences.
    pub fn record_plan(&mut self, key: &PlanKey) -> Result<RecordPlan, ConfigurationError> {
        let correspondences: CorrespondenceList = self.config.correspondences(key.pair)?;
        let mut members = Vec::with_capacity(correspondences.len());
        for correspondence in &correspondences {
            if correspondence.ignore {
                continue;
            }
            let source = correspondence.source.clone().ok_or_else(|| {
                ConfigurationError::invalid_correspondence(
                    self.schema().pair_label(key.pair),
                    format!("member `{}` has no source", correspondence.target),
                )
            })?;
            let step = match &correspondence.converter {
                Some(converter) => ValueStep::Convert(converter.clone()),
                None => {
                    let pair = TypePair::new(source.shape(), correspondence.target.shape());
                    ValueStep::Nested(self.require(pair, Some(&correspondence.options))?)
                }
            };
            members.push(MemberPlan {
                source,
                target: correspondence.target.clone(),
                guard: correspondence.guard.clone(),
                step,
            });
        }
        Ok(RecordPlan { members })
    }

    fn ensure(&mut self, key: &PlanKey) -> Result<(), ConfigurationError> {
        if self.pending.contains(key) || self.staged.contains_key(key) || self.compiler.cached(key).is_some() {
            return Ok(());
        }
        self.pending.insert(key.clone());
        let compiler = self.compiler;
        let built = compiler.build(self, key);
        self.pending.remove(key);
        self.staged.insert(key.clone(), Arc::new(built?));
        Ok(())
    }
}
