//! Mapping documents: shape declarations, pair configuration and the graphs
//! to map, read from one JSON file.
//!
//! ```json
//! {
//!   "shapes": [
//!     { "kind": "record", "name": "Customer", "members": { "Name": "text" } },
//!     { "kind": "record", "name": "Order", "members": { "Customer": "Customer", "Qty": "text" } },
//!     { "kind": "record", "name": "OrderDto", "members": { "CustomerName": "text", "Qty": "i32" } }
//!   ],
//!   "pairs": [
//!     { "source": "Order", "target": "OrderDto", "members": { "CustomerName": "Customer.Name" } }
//!   ],
//!   "source": "Order",
//!   "target": "OrderDto",
//!   "value": { "Customer": { "Name": "Ada" }, "Qty": "3" }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::Utf8Path;
use color_eyre::eyre::{WrapErr, bail, eyre};
use om_core::{
    CollectionBehavior, Correspondence, ElementComparer, FxHashSet, MapperConfig, OptionsOverride, RecordDef,
    ReferenceBehavior, ScalarKind, Schema, SchemaBuilder, ShapeId, SourceAccessor, Value,
};
use om_engine::{Configuration, Mapper, render};
use serde::Deserialize;
use tracing::debug;

use crate::types::TypeExpr;

/// One shape declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeDecl {
    /// A reference record.
    Record {
        /// Shape name.
        name: String,
        /// Own members in declaration order; values are type expressions.
        #[serde(default)]
        members: serde_json::Map<String, serde_json::Value>,
        /// Base record whose members come first.
        #[serde(default)]
        base: Option<String>,
        /// Abstract records are never instantiated.
        #[serde(default, rename = "abstract")]
        is_abstract: bool,
    },
    /// A value-type struct.
    Struct {
        /// Shape name.
        name: String,
        /// Members in declaration order.
        #[serde(default)]
        members: serde_json::Map<String, serde_json::Value>,
    },
    /// An enumeration.
    Enum {
        /// Shape name.
        name: String,
        /// Integral underlying kind.
        #[serde(default = "default_underlying")]
        underlying: String,
        /// Variant name to value.
        variants: serde_json::Map<String, serde_json::Value>,
    },
}

fn default_underlying() -> String {
    ScalarKind::I32.name().to_owned()
}

impl ShapeDecl {
    fn name(&self) -> &str {
        match self {
            Self::Record { name, .. } | Self::Struct { name, .. } | Self::Enum { name, .. } => name,
        }
    }
}

/// Options attached to a pair or a member.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsDecl {
    /// Reference behavior override.
    pub reference_behavior: Option<ReferenceBehavior>,
    /// Collection behavior override.
    pub collection_behavior: Option<CollectionBehavior>,
    /// Member whose rendered value identifies an element for `update`.
    pub match_by: Option<String>,
}

/// Where a target member reads from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MemberDecl {
    /// A dotted source member path.
    Path(String),
    /// A source path with member-level options.
    Detailed {
        /// Dotted source member path.
        from: String,
        /// Member-level options.
        #[serde(default)]
        options: OptionsDecl,
    },
}

/// Configuration of one type pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairDecl {
    /// Source type expression.
    pub source: String,
    /// Target type expression.
    pub target: String,
    /// Explicit correspondences, target member path to source.
    #[serde(default)]
    pub members: BTreeMap<String, MemberDecl>,
    /// Target members left untouched.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Pair-level options.
    #[serde(default)]
    pub options: OptionsDecl,
}

/// A complete mapping document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    /// Declared shapes.
    #[serde(default)]
    pub shapes: Vec<ShapeDecl>,
    /// Type pair configuration.
    #[serde(default)]
    pub pairs: Vec<PairDecl>,
    /// Global option defaults and engine settings.
    #[serde(default)]
    pub config: MapperConfig,
    /// Source type expression.
    pub source: String,
    /// Target type expression.
    pub target: String,
    /// The source graph.
    #[serde(default)]
    pub value: serde_json::Value,
    /// An existing target graph to map onto.
    #[serde(default)]
    pub existing: Option<serde_json::Value>,
}

/// A document turned into a ready mapper.
#[derive(Debug)]
pub struct Session {
    /// The mapper.
    pub mapper: Mapper,
    /// Shape of the source graph.
    pub source: ShapeId,
    /// Shape of the target graph.
    pub target: ShapeId,
}

impl Session {
    /// The schema shared with the mapper.
    pub fn schema(&self) -> &Schema {
        self.mapper.schema()
    }
}

impl Document {
    /// Parses a document.
    pub fn from_json_str(json: &str) -> color_eyre::Result<Self> {
        serde_json::from_str(json).wrap_err("invalid mapping document")
    }

    /// Reads and parses a document file.
    pub fn from_path(path: &Utf8Path) -> color_eyre::Result<Self> {
        let json = std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {path}"))?;
        Self::from_json_str(&json).wrap_err_with(|| format!("in {path}"))
    }

    /// Builds the schema and the configured mapper.
    pub fn compile(&self) -> color_eyre::Result<Session> {
        let mut builder = SchemaBuilder::new();
        self.declare_shapes(&mut builder)?;

        let source = resolve(&mut builder, &self.source)?;
        let target = resolve(&mut builder, &self.target)?;
        let mut pairs = Vec::with_capacity(self.pairs.len());
        for decl in &self.pairs {
            pairs.push((resolve(&mut builder, &decl.source)?, resolve(&mut builder, &decl.target)?));
        }

        let schema = Arc::new(builder.build()?);
        let mut config = Configuration::new(Arc::clone(&schema));
        for (decl, (from, to)) in self.pairs.iter().zip(pairs) {
            configure_pair(&mut config, &schema, decl, from, to)
                .wrap_err_with(|| format!("in pair {} -> {}", decl.source, decl.target))?;
        }
        debug!(shapes = schema.len(), pairs = self.pairs.len(), "document compiled");

        Ok(Session {
            mapper: Mapper::from_config(config, &self.config)?,
            source,
            target,
        })
    }

    /// Registers enums first, then declares every record so members may
    /// refer to any of them, then defines structs and records once their
    /// member types and bases exist.
    fn declare_shapes(&self, builder: &mut SchemaBuilder) -> color_eyre::Result<()> {
        let mut records = Vec::new();
        for decl in &self.shapes {
            match decl {
                ShapeDecl::Enum {
                    name,
                    underlying,
                    variants,
                } => declare_enum(builder, name, underlying, variants)?,
                ShapeDecl::Record { name, .. } => records.push(builder.declare_record(name)?),
                ShapeDecl::Struct { .. } => {}
            }
        }

        let mut pending: Vec<&ShapeDecl> = self
            .shapes
            .iter()
            .filter(|d| !matches!(d, ShapeDecl::Enum { .. }))
            .collect();
        let mut undefined: FxHashSet<&str> = pending
            .iter()
            .filter(|d| matches!(d, ShapeDecl::Record { .. }))
            .map(|d| d.name())
            .collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for decl in pending {
                if define(builder, decl, &undefined)? {
                    undefined.remove(decl.name());
                } else {
                    waiting.push(decl);
                }
            }
            if waiting.len() == before {
                return Err(stuck(builder, waiting[0], &undefined));
            }
            pending = waiting;
        }
        debug!(records = records.len(), "shapes declared");
        Ok(())
    }
}

fn declare_enum(
    builder: &mut SchemaBuilder,
    name: &str,
    underlying: &str,
    variants: &serde_json::Map<String, serde_json::Value>,
) -> color_eyre::Result<()> {
    let kind = ScalarKind::from_name(underlying).ok_or_else(|| eyre!("unknown scalar kind `{underlying}`"))?;
    let variants = variants
        .iter()
        .map(|(variant, value)| {
            value
                .as_i64()
                .map(|value| (variant.as_str(), value))
                .ok_or_else(|| eyre!("variant `{variant}` of `{name}` needs an integer value"))
        })
        .collect::<color_eyre::Result<Vec<_>>>()?;
    builder.enumeration(name, kind, &variants)?;
    Ok(())
}

fn member_types(
    members: &serde_json::Map<String, serde_json::Value>,
) -> color_eyre::Result<Vec<(&str, TypeExpr)>> {
    members
        .iter()
        .map(|(member, expr)| {
            let expr = expr
                .as_str()
                .ok_or_else(|| eyre!("member `{member}` needs a type expression"))?;
            Ok((member.as_str(), TypeExpr::parse(expr)?))
        })
        .collect()
}

/// Builds the layout once every member type is registered.
fn layout(
    builder: &mut SchemaBuilder,
    members: &serde_json::Map<String, serde_json::Value>,
) -> color_eyre::Result<Option<RecordDef>> {
    let mut def = RecordDef::new();
    for (member, expr) in member_types(members)? {
        match expr.register(builder)? {
            Some(shape) => def = def.member(member, shape),
            None => return Ok(None),
        }
    }
    Ok(Some(def))
}

/// Defines a struct or record; `false` means it has to wait.
fn define(builder: &mut SchemaBuilder, decl: &ShapeDecl, undefined: &FxHashSet<&str>) -> color_eyre::Result<bool> {
    match decl {
        ShapeDecl::Struct { name, members } => {
            let Some(def) = layout(builder, members)? else {
                return Ok(false);
            };
            builder.structure(name, def)?;
        }
        ShapeDecl::Record {
            name,
            members,
            base,
            is_abstract,
        } => {
            if base.as_deref().is_some_and(|base| undefined.contains(base)) {
                return Ok(false);
            }
            let Some(mut def) = layout(builder, members)? else {
                return Ok(false);
            };
            if let Some(base) = base {
                let id = builder
                    .lookup(base)
                    .ok_or_else(|| eyre!("unknown base `{base}` of `{name}`"))?;
                def = def.base(id);
            }
            if *is_abstract {
                def = def.abstract_shape();
            }
            let id = builder
                .lookup(name)
                .ok_or_else(|| eyre!("record `{name}` was not declared"))?;
            builder.define_record(id, def)?;
        }
        ShapeDecl::Enum { .. } => {}
    }
    Ok(true)
}

fn stuck(builder: &SchemaBuilder, decl: &ShapeDecl, undefined: &FxHashSet<&str>) -> color_eyre::Report {
    let name = decl.name();
    let members = match decl {
        ShapeDecl::Record {
            base: Some(base), ..
        } if undefined.contains(base.as_str()) => {
            return eyre!("`{name}` cannot be defined: base `{base}` is never defined (inheritance cycle?)");
        }
        ShapeDecl::Record { members, .. } | ShapeDecl::Struct { members, .. } => member_types(members).ok(),
        ShapeDecl::Enum { .. } => None,
    };
    let unknown = members
        .iter()
        .flatten()
        .find_map(|(_, expr)| expr.unknown_name(builder).map(str::to_owned));
    match unknown {
        Some(unknown) if unknown != name => eyre!("`{name}` refers to unknown shape `{unknown}`"),
        _ => eyre!("`{name}` cannot be defined: a struct contains itself"),
    }
}

fn resolve(builder: &mut SchemaBuilder, text: &str) -> color_eyre::Result<ShapeId> {
    let expr = TypeExpr::parse(text)?;
    match expr.register(builder)? {
        Some(id) => Ok(id),
        None => bail!(
            "unknown shape `{}` in `{text}`",
            expr.unknown_name(builder).unwrap_or(text)
        ),
    }
}

fn configure_pair(
    config: &mut Configuration,
    schema: &Arc<Schema>,
    decl: &PairDecl,
    source_shape: ShapeId,
    target_shape: ShapeId,
) -> color_eyre::Result<()> {
    let pair = config.register_pair(source_shape, target_shape);
    for (target, member) in &decl.members {
        match member {
            MemberDecl::Path(source) => config.map_member(pair, target, source)?,
            MemberDecl::Detailed { from, options } => {
                let source = config.member_path(pair.source, from)?;
                let member = config.member_path(pair.target, target)?;
                let correspondence = Correspondence::new(SourceAccessor::Member(source), member)
                    .with_options(options_override(schema, options));
                config.correspond(pair, correspondence)?;
            }
        }
    }
    for target in &decl.ignore {
        config.ignore_member(pair, target)?;
    }
    let options = options_override(schema, &decl.options);
    if !options.is_empty() {
        config.set_pair_options(pair, options);
    }
    Ok(())
}

fn options_override(schema: &Arc<Schema>, decl: &OptionsDecl) -> OptionsOverride {
    let mut options = OptionsOverride::inherit();
    options.reference_behavior = decl.reference_behavior;
    options.collection_behavior = decl.collection_behavior;
    if let Some(member) = &decl.match_by {
        options.comparer = Some(match_by(Arc::clone(schema), member.clone()));
    }
    options
}

/// Matches elements whose `member` renders to the same text, so keys of
/// different scalar kinds still pair up.
fn match_by(schema: Arc<Schema>, member: String) -> ElementComparer {
    ElementComparer::new(move |source, target| {
        let key = |value: &Value| member_value(&schema, value, &member).map(|v| render(&v));
        match (key(source), key(target)) {
            (Some(source), Some(target)) => source == target,
            _ => false,
        }
    })
}

fn member_value(schema: &Schema, value: &Value, member: &str) -> Option<Value> {
    match value {
        Value::Ref(object) => schema.field(object, member),
        Value::Struct(value) => {
            let index = schema.member_index(value.shape, member)?;
            value.fields.get(index).cloned()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(json: &str) -> Document {
        Document::from_json_str(json).unwrap()
    }

    #[test]
    fn test_forward_references_and_inheritance() {
        let doc = document(
            r#"{
                "shapes": [
                    { "kind": "record", "name": "Dog", "base": "Animal", "members": { "Owner": "Person?" } },
                    { "kind": "struct", "name": "Tagged", "members": { "Label": "text", "At": "Point" } },
                    { "kind": "struct", "name": "Point", "members": { "X": "i32", "Y": "i32" } },
                    { "kind": "record", "name": "Animal", "abstract": true, "members": { "Name": "text" } },
                    { "kind": "record", "name": "Person", "members": { "Pets": "list<Animal>" } }
                ],
                "source": "Dog",
                "target": "Tagged"
            }"#,
        );
        let session = doc.compile().unwrap();
        let schema = session.schema();
        let dog = schema.lookup("Dog").unwrap();
        assert_eq!(schema.member_index(dog, "Name"), Some(0));
        assert_eq!(schema.member_index(dog, "Owner"), Some(1));
        assert!(schema.shape(schema.lookup("Animal").unwrap()).unwrap().is_abstract());
        assert_eq!(session.source, dog);
        assert_eq!(schema.name(session.target), "Tagged");
    }

    #[test]
    fn test_enum_declaration() {
        let doc = document(
            r#"{
                "shapes": [{ "kind": "enum", "name": "Color", "underlying": "u8", "variants": { "Red": 1, "Blue": 2 } }],
                "source": "Color",
                "target": "text"
            }"#,
        );
        let session = doc.compile().unwrap();
        let om_core::ShapeKind::Enum(def) = &session.schema().shape(session.source).unwrap().kind else {
            unreachable!("Color is an enum");
        };
        assert_eq!(def.underlying, ScalarKind::U8);
        assert_eq!(def.value_of("Blue"), Some(2));
    }

    #[test]
    fn test_unknown_shape_is_reported() {
        let doc = document(
            r#"{
                "shapes": [{ "kind": "record", "name": "Order", "members": { "Lines": "list<Line>" } }],
                "source": "Order",
                "target": "Order"
            }"#,
        );
        insta::assert_snapshot!(
            doc.compile().unwrap_err().to_string(),
            @"`Order` refers to unknown shape `Line`"
        );
    }

    #[test]
    fn test_inheritance_cycle_is_reported() {
        let doc = document(
            r#"{
                "shapes": [
                    { "kind": "record", "name": "A", "base": "B" },
                    { "kind": "record", "name": "B", "base": "A" }
                ],
                "source": "A",
                "target": "B"
            }"#,
        );
        insta::assert_snapshot!(
            doc.compile().unwrap_err().to_string(),
            @"`A` cannot be defined: base `B` is never defined (inheritance cycle?)"
        );
    }

    #[test]
    fn test_pair_configuration() {
        let doc = document(
            r#"{
                "shapes": [
                    { "kind": "record", "name": "Customer", "members": { "Name": "text" } },
                    { "kind": "record", "name": "Order", "members": { "Customer": "Customer", "Note": "text" } },
                    { "kind": "record", "name": "OrderDto", "members": { "CustomerName": "text", "Note": "text" } }
                ],
                "pairs": [{
                    "source": "Order",
                    "target": "OrderDto",
                    "members": { "CustomerName": "Customer.Name" },
                    "ignore": ["Note"],
                    "options": { "reference_behavior": "use_target_instance_if_not_null" }
                }],
                "source": "Order",
                "target": "OrderDto"
            }"#,
        );
        let session = doc.compile().unwrap();
        let config = session.mapper.configuration();
        let pair = om_core::TypePair::new(session.source, session.target);
        let list = config.correspondences(pair).unwrap();
        assert!(list.get("Note").unwrap().ignore);
        assert_eq!(
            list.get("CustomerName").unwrap().source.as_ref().unwrap().label(),
            "Customer.Name"
        );
        assert_eq!(
            config.pair_options(pair).unwrap().reference_behavior,
            Some(ReferenceBehavior::UseTargetInstanceIfNotNull)
        );
    }

    #[test]
    fn test_match_by_compares_rendered_members() {
        let doc = document(
            r#"{
                "shapes": [
                    { "kind": "record", "name": "Line", "members": { "Sku": "i32" } },
                    { "kind": "record", "name": "LineDto", "members": { "Sku": "text" } }
                ],
                "source": "Line",
                "target": "LineDto"
            }"#,
        );
        let session = doc.compile().unwrap();
        let schema = Arc::new(session.schema().clone());
        let line = schema.object(session.source, &[("Sku", Value::I32(7))]).unwrap();
        let same = schema.object(session.target, &[("Sku", Value::text("7"))]).unwrap();
        let other = schema.object(session.target, &[("Sku", Value::text("8"))]).unwrap();

        let comparer = match_by(Arc::clone(&schema), "Sku".to_owned());
        assert!(comparer.matches(&Value::Ref(line.clone()), &Value::Ref(same)));
        assert!(!comparer.matches(&Value::Ref(line), &Value::Ref(other)));
    }
}
