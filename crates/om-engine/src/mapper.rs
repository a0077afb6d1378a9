//! The public mapping entry points.

use std::sync::Arc;

use om_core::{
    ConfigError, EngineConfig, FxHashSet, MapError, MapperConfig, ObjRef, Schema, ShapeId, TypePair, Value,
};
use tracing::trace;

use crate::compiler::PlanCompiler;
use crate::configuration::Configuration;
use crate::executor::Executor;
use crate::options::resolve_options;
use crate::plan::{Plan, PlanKey};
use crate::reconcile::Existing;
use crate::stats::{MapperStats, StatsSnapshot};
use crate::strategy::StrategyRegistry;

/// Maps object graphs between shapes.
///
/// A `Mapper` owns its configuration and a plan cache shared by every call.
/// It is `Send + Sync`; each call keeps its own reference tracker, so shared
/// and cyclic source graphs map to equally shared and cyclic targets.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use om_core::{RecordDef, ScalarKind, SchemaBuilder, Value};
/// use om_engine::{Configuration, Mapper};
///
/// let mut builder = SchemaBuilder::new();
/// let text = builder.scalar(ScalarKind::Text);
/// let int = builder.scalar(ScalarKind::I32);
/// let order = builder.record("Order", RecordDef::new().member("Qty", text)).unwrap();
/// let dto = builder.record("OrderDto", RecordDef::new().member("Qty", int)).unwrap();
/// let schema = Arc::new(builder.build().unwrap());
///
/// let mapper = Mapper::new(Configuration::new(Arc::clone(&schema)));
/// let source = schema.object(order, &[("Qty", Value::text("5"))]).unwrap();
///
/// let target = mapper.map(&Value::Ref(source), order, dto)?;
/// let target = target.as_object().unwrap();
/// assert_eq!(schema.field(target, "Qty"), Some(Value::I32(5)));
/// # Ok::<(), om_core::MapError>(())
/// ```
#[derive(Debug)]
pub struct Mapper {
    config: Configuration,
    compiler: PlanCompiler,
    stats: Arc<MapperStats>,
    engine: EngineConfig,
}

impl Mapper {
    /// Creates a mapper with the builtin strategies.
    #[must_use]
    pub fn new(config: Configuration) -> Self {
        Self::with_strategies(config, StrategyRegistry::new())
    }

    /// Creates a mapper with a custom strategy registry.
    #[must_use]
    pub fn with_strategies(config: Configuration, registry: StrategyRegistry) -> Self {
        let stats = Arc::new(MapperStats::new());
        Self {
            config,
            compiler: PlanCompiler::new(registry, Arc::clone(&stats)),
            stats,
            engine: EngineConfig::default(),
        }
    }

    /// Creates a mapper whose global defaults and engine settings come from
    /// `settings`.
    pub fn from_config(config: Configuration, settings: &MapperConfig) -> Result<Self, ConfigError> {
        settings.validate()?;
        let config = config.with_defaults(settings.defaults);
        let stats = Arc::new(MapperStats::new());
        Ok(Self {
            config,
            compiler: PlanCompiler::new(StrategyRegistry::new(), Arc::clone(&stats))
                .with_plan_logging(settings.engine.log_plans),
            stats,
            engine: settings.engine,
        })
    }

    /// The schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.config.schema()
    }

    /// The configuration.
    #[must_use]
    pub const fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// A snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn root_key(&self, source: ShapeId, target: ShapeId) -> PlanKey {
        let pair = TypePair::new(source, target);
        PlanKey::new(
            pair,
            resolve_options(None, self.config.pair_options(pair), self.config.defaults()),
        )
    }

    /// Compiles, or fetches from the cache, the plan of `source → target`.
    pub fn plan(&self, source: ShapeId, target: ShapeId) -> Result<Arc<Plan>, MapError> {
        Ok(self.compiler.get_plan(&self.config, &self.root_key(source, target))?)
    }

    /// Renders the plan tree of `source → target`.
    ///
    /// Units already shown are referred to as `(see above)`, which is how a
    /// cycle shows up.
    pub fn explain(&self, source: ShapeId, target: ShapeId) -> Result<String, MapError> {
        let mut out = String::new();
        let mut visited = FxHashSet::default();
        self.explain_into(&self.root_key(source, target), None, 0, &mut visited, &mut out)?;
        Ok(out)
    }

    fn explain_into(
        &self,
        key: &PlanKey,
        label: Option<&str>,
        depth: usize,
        visited: &mut FxHashSet<PlanKey>,
        out: &mut String,
    ) -> Result<(), MapError> {
        let indent = "  ".repeat(depth);
        let prefix = label.map(|l| format!("{l}: ")).unwrap_or_default();
        if !visited.insert(key.clone()) {
            out.push_str(&format!("{indent}{prefix}{} (see above)\n", self.schema().pair_label(key.pair)));
            return Ok(());
        }
        let plan = self.compiler.get_plan(&self.config, key)?;
        out.push_str(&format!("{indent}{prefix}{}\n", plan.summary(self.schema())));
        for (child_label, child) in plan.body.children() {
            match child {
                Some(child) => self.explain_into(child, Some(&child_label), depth + 1, visited, out)?,
                None => out.push_str(&format!("{indent}  {child_label}\n")),
            }
        }
        Ok(())
    }

    /// Maps `value` of shape `source` to a freshly allocated `target`.
    pub fn map(&self, value: &Value, source: ShapeId, target: ShapeId) -> Result<Value, MapError> {
        self.execute(&self.root_key(source, target), value, Existing::None)
    }

    /// Maps `value` of shape `source` onto an existing reference object.
    ///
    /// The object itself is always populated in place; nested members
    /// follow the options.
    pub fn map_onto(&self, value: &Value, source: ShapeId, target: &ObjRef) -> Result<(), MapError> {
        let key = self.root_key(source, target.shape());
        self.execute(&key, value, Existing::Forced(Value::Ref(target.clone())))?;
        Ok(())
    }

    /// Maps `value` of shape `source` into `out`, a value of shape `target`.
    ///
    /// A non-null `out` is populated in place where the target shape allows
    /// it; otherwise it is overwritten with the result.
    pub fn map_value_into(
        &self,
        value: &Value,
        source: ShapeId,
        target: ShapeId,
        out: &mut Value,
    ) -> Result<(), MapError> {
        let existing = if out.is_null() {
            Existing::None
        } else {
            Existing::Forced(out.clone())
        };
        *out = self.execute(&self.root_key(source, target), value, existing)?;
        Ok(())
    }

    fn execute(&self, key: &PlanKey, value: &Value, existing: Existing) -> Result<Value, MapError> {
        self.stats.increment_invocations();
        trace!(pair = %self.schema().pair_label(key.pair), "mapping");
        let mut executor = Executor::new(&self.config, &self.compiler, &self.stats, self.engine.tracker_capacity);
        executor.run(key, value, existing)
    }
}
