//! Static mapping configuration.
//!
//! A [`Configuration`] is assembled once, before the first mapping call, and
//! read-only afterwards. It holds the schema, global defaults and per-pair
//! settings: explicit correspondences, a custom converter and option
//! overrides. Pairs registered with [`Configuration::register_pair`] are also
//! the candidates for polymorphic dispatch.

use std::sync::Arc;

use om_core::{
    ComputedAccessor, ConfigurationError, Converter, Correspondence, CorrespondenceList,
    CorrespondenceResolver, FxHashMap, GlobalOptions, MemberPath, OptionsOverride, Schema, ShapeId,
    SourceAccessor, TypePair,
};
use tracing::warn;

use crate::resolver::ExactNameResolver;

/// Settings of one type pair.
#[derive(Debug, Clone)]
pub struct TypePairConfig {
    /// Explicit correspondences, applied over the resolved ones.
    pub correspondences: CorrespondenceList,
    /// Replaces every strategy for this pair when set.
    pub converter: Option<Converter>,
    /// Pair-level options.
    pub options: OptionsOverride,
    /// Whether members without an explicit correspondence are filled in by
    /// the resolver.
    pub auto_resolve: bool,
}

impl Default for TypePairConfig {
    fn default() -> Self {
        Self {
            correspondences: CorrespondenceList::new(),
            converter: None,
            options: OptionsOverride::default(),
            auto_resolve: true,
        }
    }
}

/// The configuration a [`Mapper`](crate::Mapper) is built from.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use om_core::{RecordDef, ScalarKind, SchemaBuilder, TypePair};
/// use om_engine::Configuration;
///
/// let mut builder = SchemaBuilder::new();
/// let text = builder.scalar(ScalarKind::Text);
/// let order = builder.record("Order", RecordDef::new().member("Ref", text)).unwrap();
/// let dto = builder.record("OrderDto", RecordDef::new().member("Code", text)).unwrap();
/// let schema = Arc::new(builder.build().unwrap());
///
/// let mut config = Configuration::new(schema);
/// let pair = TypePair::new(order, dto);
/// config.map_member(pair, "Code", "Ref").unwrap();
/// assert_eq!(config.correspondences(pair).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Configuration {
    schema: Arc<Schema>,
    defaults: GlobalOptions,
    pairs: FxHashMap<TypePair, TypePairConfig>,
    registered: Vec<TypePair>,
    resolver: Arc<dyn CorrespondenceResolver>,
}

impl Configuration {
    /// Creates an empty configuration over `schema` using exact-name
    /// resolution.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            defaults: GlobalOptions::default(),
            pairs: FxHashMap::default(),
            registered: Vec::new(),
            resolver: Arc::new(ExactNameResolver),
        }
    }

    /// Sets the global defaults.
    #[must_use]
    pub const fn with_defaults(mut self, defaults: GlobalOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the correspondence resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn CorrespondenceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// The schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The global defaults.
    #[must_use]
    pub const fn defaults(&self) -> &GlobalOptions {
        &self.defaults
    }

    /// Returns the settings of `pair`, creating and registering them if needed.
    pub fn pair_mut(&mut self, pair: TypePair) -> &mut TypePairConfig {
        self.register_pair(pair.source, pair.target);
        self.pairs.entry(pair).or_default()
    }

    /// Returns the settings of `pair`, if any.
    #[must_use]
    pub fn pair(&self, pair: TypePair) -> Option<&TypePairConfig> {
        self.pairs.get(&pair)
    }

    /// Registers `source → target` as a known pair.
    ///
    /// Registered pairs are what polymorphic dispatch looks for.
    pub fn register_pair(&mut self, source: ShapeId, target: ShapeId) -> TypePair {
        let pair = TypePair::new(source, target);
        if !self.registered.contains(&pair) {
            self.registered.push(pair);
        }
        pair
    }

    /// Resolves `path` against `root`.
    pub fn member_path(&self, root: ShapeId, path: &str) -> Result<MemberPath, ConfigurationError> {
        MemberPath::resolve(&self.schema, root, path)
    }

    /// Adds a correspondence to `pair`, replacing any earlier one for the
    /// same target member.
    pub fn correspond(&mut self, pair: TypePair, correspondence: Correspondence) -> Result<(), ConfigurationError> {
        if !correspondence.ignore && correspondence.source.is_none() {
            return Err(ConfigurationError::invalid_correspondence(
                self.schema.pair_label(pair),
                format!("member `{}` has no source", correspondence.target),
            ));
        }
        let label = self.schema.pair_label(pair);
        if let Some(previous) = self.pair_mut(pair).correspondences.upsert(correspondence) {
            warn!(
                pair = %label,
                member = %previous.target,
                "correspondence replaced by a later registration"
            );
        }
        Ok(())
    }

    /// Maps target member `target` from source member `source` (both may be
    /// dotted paths).
    pub fn map_member(&mut self, pair: TypePair, target: &str, source: &str) -> Result<(), ConfigurationError> {
        let to = self.member_path(pair.target, target)?;
        let from = self.member_path(pair.source, source)?;
        self.correspond(pair, Correspondence::new(SourceAccessor::Member(from), to))
    }

    /// Maps target member `target` from source member `source` through
    /// `converter`.
    pub fn map_member_with(
        &mut self,
        pair: TypePair,
        target: &str,
        source: &str,
        converter: Converter,
    ) -> Result<(), ConfigurationError> {
        let to = self.member_path(pair.target, target)?;
        let from = self.member_path(pair.source, source)?;
        self.correspond(
            pair,
            Correspondence::new(SourceAccessor::Member(from), to).with_converter(converter),
        )
    }

    /// Maps target member `target` from a computed value.
    pub fn map_computed(
        &mut self,
        pair: TypePair,
        target: &str,
        computed: ComputedAccessor,
    ) -> Result<(), ConfigurationError> {
        let to = self.member_path(pair.target, target)?;
        self.correspond(pair, Correspondence::new(SourceAccessor::Computed(computed), to))
    }

    /// Leaves target member `target` untouched.
    pub fn ignore_member(&mut self, pair: TypePair, target: &str) -> Result<(), ConfigurationError> {
        let to = self.member_path(pair.target, target)?;
        self.correspond(pair, Correspondence::ignored(to))
    }

    /// Registers a converter that replaces every strategy for `pair`.
    pub fn set_converter(&mut self, pair: TypePair, converter: Converter) {
        self.pair_mut(pair).converter = Some(converter);
    }

    /// Sets the options of `pair`.
    pub fn set_pair_options(&mut self, pair: TypePair, options: OptionsOverride) {
        self.pair_mut(pair).options = options;
    }

    /// Returns the converter of `pair`, if one was registered.
    #[must_use]
    pub fn converter(&self, pair: TypePair) -> Option<&Converter> {
        self.pairs.get(&pair).and_then(|p| p.converter.as_ref())
    }

    /// Returns the pair-level options of `pair`, if any were set.
    #[must_use]
    pub fn pair_options(&self, pair: TypePair) -> Option<&OptionsOverride> {
        self.pairs
            .get(&pair)
            .map(|p| &p.options)
            .filter(|o| !o.is_empty())
    }

    /// Returns the correspondences of `pair`: the resolved ones (unless
    /// disabled) with the explicit ones applied on top.
    pub fn correspondences(&self, pair: TypePair) -> Result<CorrespondenceList, ConfigurationError> {
        let explicit = self.pairs.get(&pair);
        let mut list = if explicit.is_none_or(|p| p.auto_resolve) {
            self.resolver.resolve(&self.schema, pair)?
        } else {
            CorrespondenceList::new()
        };
        if let Some(explicit) = explicit {
            for correspondence in &explicit.correspondences {
                list.upsert(correspondence.clone());
            }
        }
        Ok(list)
    }

    /// Picks the target shape for a source object of runtime shape `runtime`
    /// whose static target is `static_target`.
    ///
    /// The first registered pair from `runtime` whose target is assignable to
    /// `static_target` wins. Without one, a concrete static target is used
    /// as is; an abstract one falls back to `runtime` itself when that is
    /// assignable to it.
    pub fn polymorphic_target(&self, runtime: ShapeId, static_target: ShapeId) -> Result<ShapeId, ConfigurationError> {
        if let Some(pair) = self
            .registered
            .iter()
            .find(|p| p.source == runtime && self.schema.is_assignable(p.target, static_target))
        {
            return Ok(pair.target);
        }
        let target = self.schema.shape(static_target)?;
        if !target.is_abstract() {
            return Ok(static_target);
        }
        let candidate = self.schema.shape(runtime)?;
        if !candidate.is_abstract() && self.schema.is_assignable(runtime, static_target) {
            return Ok(runtime);
        }
        Err(ConfigurationError::UnmappedRuntimeShape {
            runtime: candidate.name.clone(),
            target: target.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use om_core::{CollectionBehavior, RecordDef, ScalarKind, SchemaBuilder, Value};

    use super::*;

    struct Fixture {
        config: Configuration,
        animal: ShapeId,
        dog: ShapeId,
        cat: ShapeId,
        animal_dto: ShapeId,
        dog_dto: ShapeId,
    }

    fn fixture() -> Fixture {
        let mut builder = SchemaBuilder::new();
        let text = builder.scalar(ScalarKind::Text);
        let animal = builder
            .record("Animal", RecordDef::new().member("Name", text).abstract_shape())
            .unwrap();
        let dog = builder.record("Dog", RecordDef::new().base(animal)).unwrap();
        let cat = builder.record("Cat", RecordDef::new().base(animal)).unwrap();
        let animal_dto = builder
            .record("AnimalDto", RecordDef::new().member("Name", text).abstract_shape())
            .unwrap();
        let dog_dto = builder.record("DogDto", RecordDef::new().base(animal_dto)).unwrap();
        let config = Configuration::new(Arc::new(builder.build().unwrap()));
        Fixture {
            config,
            animal,
            dog,
            cat,
            animal_dto,
            dog_dto,
        }
    }

    #[test]
    fn test_polymorphic_target_uses_registered_pair() {
        let mut f = fixture();
        f.config.register_pair(f.dog, f.dog_dto);
        assert_eq!(f.config.polymorphic_target(f.dog, f.animal_dto), Ok(f.dog_dto));
    }

    #[test]
    fn test_polymorphic_target_unmapped() {
        let mut f = fixture();
        f.config.register_pair(f.dog, f.dog_dto);
        let err = f.config.polymorphic_target(f.cat, f.animal_dto).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnmappedRuntimeShape {
                runtime: "Cat".to_owned(),
                target: "AnimalDto".to_owned(),
            }
        );
    }

    #[test]
    fn test_polymorphic_target_same_hierarchy_falls_back_to_runtime() {
        let f = fixture();
        assert_eq!(f.config.polymorphic_target(f.cat, f.animal), Ok(f.cat));
    }

    #[test]
    fn test_explicit_correspondence_applies_over_resolved() {
        let mut f = fixture();
        let pair = TypePair::new(f.dog, f.dog_dto);
        f.config
            .map_computed(
                pair,
                "Name",
                ComputedAccessor::new("Constant", f.config.schema().scalar(ScalarKind::Text), |_| {
                    Ok(Value::text("Rex"))
                }),
            )
            .unwrap();
        let list = f.config.correspondences(pair).unwrap();
        assert_eq!(list.len(), 1);
        assert!(matches!(
            list.get("Name").and_then(|c| c.source.as_ref()),
            Some(SourceAccessor::Computed(_))
        ));
    }

    #[test]
    fn test_auto_resolve_can_be_disabled() {
        let mut f = fixture();
        let pair = TypePair::new(f.dog, f.dog_dto);
        f.config.pair_mut(pair).auto_resolve = false;
        assert!(f.config.correspondences(pair).unwrap().is_empty());
    }

    #[test]
    fn test_ignore_member_shadows_resolved() {
        let mut f = fixture();
        let pair = TypePair::new(f.dog, f.dog_dto);
        f.config.ignore_member(pair, "Name").unwrap();
        let list = f.config.correspondences(pair).unwrap();
        assert!(list.get("Name").is_some_and(|c| c.ignore));
    }

    #[test]
    fn test_empty_pair_options_inherit() {
        let mut f = fixture();
        let pair = TypePair::new(f.dog, f.dog_dto);
        f.config.set_pair_options(pair, OptionsOverride::inherit());
        assert!(f.config.pair_options(pair).is_none());
        f.config.set_pair_options(
            pair,
            OptionsOverride::inherit().with_collection_behavior(CollectionBehavior::Merge),
        );
        assert!(f.config.pair_options(pair).is_some());
    }

    #[test]
    fn test_unknown_member_rejected() {
        let mut f = fixture();
        let pair = TypePair::new(f.dog, f.dog_dto);
        let err = f.config.map_member(pair, "Nickname", "Name").unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownMember { .. }));
    }
}
