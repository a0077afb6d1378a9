//! JSON rendition of object graphs.
//!
//! Records are JSON objects keyed by member name. A record may carry an
//! `"$id"`; later occurrences of the same object are written as
//! `{"$ref": id}`, which is how shared and cyclic references survive the
//! trip. `"$type"` names the runtime shape when it differs from the
//! declared one. Collections are arrays, dictionaries are objects keyed by
//! the rendered key, enums are variant names.
//!
//! A `$ref` must come after the object it names in document order.

use color_eyre::eyre::{WrapErr, bail, eyre};
use om_core::{
    EnumValue, FxHashMap, FxHashSet, ObjRef, ObjectData, ObjectId, ScalarKind, Schema, ShapeId, ShapeKind,
    StructValue, Value,
};
use om_engine::{parse, render};
use serde_json::{Map, Number, Value as Json};

const ID: &str = "$id";
const REF: &str = "$ref";
const TYPE: &str = "$type";

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

fn id_text(json: &Json) -> color_eyre::Result<String> {
    match json {
        Json::String(id) => Ok(id.clone()),
        Json::Number(id) => Ok(id.to_string()),
        other => bail!("`{ID}`/`{REF}` must be a string or number, found {}", json_kind(other)),
    }
}

/// Reads JSON into values of a schema.
pub struct Decoder<'a> {
    schema: &'a Schema,
    ids: FxHashMap<String, ObjRef>,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder with an empty `$id` table.
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            ids: FxHashMap::default(),
        }
    }

    /// Decodes `json` as a value of `shape`.
    pub fn decode(&mut self, shape: ShapeId, json: &Json) -> color_eyre::Result<Value> {
        let schema = self.schema;
        match &schema.shape(shape)?.kind {
            ShapeKind::Scalar(kind) => scalar(*kind, json),
            ShapeKind::Optional(inner) => {
                if json.is_null() {
                    Ok(Value::Null)
                } else {
                    self.decode(*inner, json)
                }
            }
            ShapeKind::Enum(def) => {
                let value = match json {
                    Json::String(name) => def
                        .value_of(name)
                        .ok_or_else(|| eyre!("`{name}` is not a variant of `{}`", schema.name(shape)))?,
                    Json::Number(n) => n
                        .as_i64()
                        .ok_or_else(|| eyre!("{n} is not a valid `{}`", schema.name(shape)))?,
                    other => bail!("expected a variant of `{}`, found {}", schema.name(shape), json_kind(other)),
                };
                Ok(Value::Enum(EnumValue::new(shape, value)))
            }
            ShapeKind::Struct(def) => {
                let object = as_object(schema, shape, json)?;
                check_members(schema, shape, object)?;
                let fields = def
                    .members
                    .iter()
                    .map(|m| match object.get(&m.name) {
                        Some(field) => self.decode(m.shape, field).wrap_err_with(|| format!("in `{}`", m.name)),
                        None => Ok(schema.zero_value(m.shape)),
                    })
                    .collect::<color_eyre::Result<Vec<_>>>()?;
                Ok(Value::Struct(StructValue::new(shape, fields)))
            }
            ShapeKind::Record(_) => self.record(shape, json),
            ShapeKind::Array(element) | ShapeKind::Sequence { element, .. } => {
                let Json::Array(items) = json else {
                    return null_or(json, || format!("expected an array for `{}`", schema.name(shape)));
                };
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.decode(*element, item).wrap_err_with(|| format!("at index {i}")))
                    .collect::<color_eyre::Result<Vec<_>>>()?;
                Ok(Value::Ref(ObjRef::new(shape, ObjectData::Items(items))))
            }
            ShapeKind::Dictionary { key, value } => {
                let Json::Object(entries) = json else {
                    return null_or(json, || format!("expected an object for `{}`", schema.name(shape)));
                };
                let entries = entries
                    .iter()
                    .map(|(k, v)| {
                        let decoded = self.decode(*key, &Json::String(k.clone()))?;
                        Ok((decoded, self.decode(*value, v).wrap_err_with(|| format!("at key `{k}`"))?))
                    })
                    .collect::<color_eyre::Result<Vec<_>>>()?;
                Ok(Value::Ref(ObjRef::new(shape, ObjectData::Entries(entries))))
            }
            ShapeKind::Textual(codec) => match json {
                Json::Null => Ok(Value::Null),
                Json::String(text) => Ok(codec.parse(text)?),
                other => bail!("expected text for `{}`, found {}", schema.name(shape), json_kind(other)),
            },
        }
    }

    fn record(&mut self, declared: ShapeId, json: &Json) -> color_eyre::Result<Value> {
        let schema = self.schema;
        let Json::Object(object) = json else {
            return null_or(json, || format!("expected an object for `{}`", schema.name(declared)));
        };

        if let Some(id) = object.get(REF) {
            let id = id_text(id)?;
            let target = self
                .ids
                .get(&id)
                .cloned()
                .ok_or_else(|| eyre!("`{REF}` to unknown `{ID}` {id:?}"))?;
            if !schema.is_assignable(target.shape(), declared) {
                bail!(
                    "`{REF}` {id:?} is a `{}`, not a `{}`",
                    schema.name(target.shape()),
                    schema.name(declared)
                );
            }
            return Ok(Value::Ref(target));
        }

        let runtime = match object.get(TYPE) {
            Some(Json::String(name)) => {
                let runtime = schema.lookup(name).ok_or_else(|| eyre!("unknown `{TYPE}` `{name}`"))?;
                if !schema.is_assignable(runtime, declared) {
                    bail!("`{name}` is not a `{}`", schema.name(declared));
                }
                runtime
            }
            Some(other) => bail!("`{TYPE}` must be a string, found {}", json_kind(other)),
            None => declared,
        };
        let shape = schema.shape(runtime)?;
        let Some(layout) = shape.layout().filter(|_| !shape.is_abstract()) else {
            bail!("`{}` is abstract; name a concrete shape with `{TYPE}`", shape.name);
        };
        check_members(schema, runtime, object)?;

        let target = ObjRef::new(
            runtime,
            ObjectData::Fields(layout.members.iter().map(|m| schema.zero_value(m.shape)).collect()),
        );
        if let Some(id) = object.get(ID) {
            let id = id_text(id)?;
            if self.ids.insert(id.clone(), target.clone()).is_some() {
                bail!("duplicate `{ID}` {id:?}");
            }
        }
        for (index, member) in layout.members.iter().enumerate() {
            if let Some(field) = object.get(&member.name) {
                let value = self
                    .decode(member.shape, field)
                    .wrap_err_with(|| format!("in `{}.{}`", shape.name, member.name))?;
                target.set_field(index, value);
            }
        }
        Ok(Value::Ref(target))
    }
}

fn as_object<'j>(schema: &Schema, shape: ShapeId, json: &'j Json) -> color_eyre::Result<&'j Map<String, Json>> {
    json.as_object()
        .ok_or_else(|| eyre!("expected an object for `{}`, found {}", schema.name(shape), json_kind(json)))
}

fn check_members(schema: &Schema, shape: ShapeId, object: &Map<String, Json>) -> color_eyre::Result<()> {
    match object
        .keys()
        .find(|k| !k.starts_with('$') && schema.member_index(shape, k).is_none())
    {
        Some(unknown) => bail!("`{}` has no member `{unknown}`", schema.name(shape)),
        None => Ok(()),
    }
}

fn null_or(json: &Json, message: impl FnOnce() -> String) -> color_eyre::Result<Value> {
    if json.is_null() {
        Ok(Value::Null)
    } else {
        Err(eyre!("{}, found {}", message(), json_kind(json)))
    }
}

fn scalar(kind: ScalarKind, json: &Json) -> color_eyre::Result<Value> {
    Ok(match (kind, json) {
        (ScalarKind::Text, Json::Null) => Value::Null,
        (ScalarKind::Text, Json::String(text)) => Value::Text(text.clone()),
        (ScalarKind::Bool, Json::Bool(b)) => Value::Bool(*b),
        (_, Json::Number(n)) => parse(&n.to_string(), kind)?,
        (_, Json::String(text)) => parse(text, kind)?,
        (_, other) => bail!("expected {kind}, found {}", json_kind(other)),
    })
}

/// Writes values of a schema as JSON.
pub struct Encoder<'a> {
    schema: &'a Schema,
    ids: FxHashMap<ObjectId, usize>,
    open: FxHashSet<ObjectId>,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder; records are numbered from 1 in output order.
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            ids: FxHashMap::default(),
            open: FxHashSet::default(),
        }
    }

    /// Encodes `value`, declared as `shape`.
    pub fn encode(&mut self, shape: ShapeId, value: &Value) -> color_eyre::Result<Json> {
        let schema = self.schema;
        let declared = schema.shape(shape)?;
        if let ShapeKind::Optional(inner) = declared.kind {
            return self.encode(inner, value);
        }
        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) => {
                Json::from(value.as_i128().and_then(|v| i64::try_from(v).ok()).unwrap_or_default())
            }
            Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) => {
                Json::from(value.as_i128().and_then(|v| u64::try_from(v).ok()).unwrap_or_default())
            }
            Value::F32(v) => float(f64::from(*v)),
            Value::F64(v) => float(*v),
            Value::Decimal(_) | Value::Char(_) => Json::String(render(value)),
            Value::Text(text) => Json::String(text.clone()),
            Value::Enum(EnumValue { shape, value }) => match &schema.shape(*shape)?.kind {
                ShapeKind::Enum(def) => def
                    .name_of(*value)
                    .map_or_else(|| Json::from(*value), |name| Json::String(name.to_owned())),
                _ => Json::from(*value),
            },
            Value::Struct(value) => {
                let Some(layout) = schema.shape(value.shape)?.layout() else {
                    bail!("`{}` is not a struct", schema.name(value.shape));
                };
                let mut object = Map::new();
                for (member, field) in layout.members.iter().zip(&value.fields) {
                    object.insert(member.name.clone(), self.encode(member.shape, field)?);
                }
                Json::Object(object)
            }
            Value::Opaque(_) => match &declared.kind {
                ShapeKind::Textual(codec) => Json::String(codec.format(value)?),
                _ => bail!("opaque value of `{}` has no text form", declared.name),
            },
            Value::Ref(object) => self.object(shape, object)?,
        })
    }

    fn object(&mut self, declared: ShapeId, object: &ObjRef) -> color_eyre::Result<Json> {
        let schema = self.schema;
        let runtime = object.shape();
        match &schema.shape(runtime)?.kind {
            ShapeKind::Record(layout) => {
                if let Some(id) = self.ids.get(&object.id()) {
                    let mut reference = Map::new();
                    reference.insert(REF.to_owned(), Json::String(id.to_string()));
                    return Ok(Json::Object(reference));
                }
                let id = self.ids.len() + 1;
                self.ids.insert(object.id(), id);

                let mut out = Map::new();
                out.insert(ID.to_owned(), Json::String(id.to_string()));
                if runtime != declared {
                    out.insert(TYPE.to_owned(), Json::String(schema.name(runtime)));
                }
                for (index, member) in layout.members.iter().enumerate() {
                    let field = object.field(index).unwrap_or_default();
                    out.insert(member.name.clone(), self.encode(member.shape, &field)?);
                }
                Ok(Json::Object(out))
            }
            ShapeKind::Array(element) | ShapeKind::Sequence { element, .. } => {
                let element = *element;
                self.nested(object, |encoder| {
                    object
                        .items()
                        .iter()
                        .map(|item| encoder.encode(element, item))
                        .collect::<color_eyre::Result<Vec<_>>>()
                        .map(Json::Array)
                })
            }
            ShapeKind::Dictionary { key, value } => {
                let (key, value) = (*key, *value);
                self.nested(object, |encoder| {
                    let mut out = Map::new();
                    for (k, v) in object.entries() {
                        let k = match encoder.encode(key, &k)? {
                            Json::String(k) => k,
                            other => other.to_string(),
                        };
                        out.insert(k, encoder.encode(value, &v)?);
                    }
                    Ok(Json::Object(out))
                })
            }
            _ => bail!("`{}` is not a reference shape", schema.name(runtime)),
        }
    }

    /// Collections carry no `$id`, so one that contains itself has no JSON
    /// form.
    fn nested(
        &mut self,
        object: &ObjRef,
        encode: impl FnOnce(&mut Self) -> color_eyre::Result<Json>,
    ) -> color_eyre::Result<Json> {
        if !self.open.insert(object.id()) {
            bail!("`{}` contains itself", self.schema.name(object.shape()));
        }
        let out = encode(self);
        self.open.remove(&object.id());
        out
    }
}

fn float(value: f64) -> Json {
    Number::from_f64(value).map_or(Json::Null, Json::Number)
}

#[cfg(test)]
mod tests {
    use om_core::{RecordDef, SchemaBuilder, SequenceKind};
    use serde_json::json;

    use super::*;

    struct Zoo {
        schema: Schema,
        animal: ShapeId,
        animals: ShapeId,
        keeper: ShapeId,
    }

    fn zoo() -> Zoo {
        let mut builder = SchemaBuilder::new();
        let text = builder.scalar(ScalarKind::Text);
        let int = builder.scalar(ScalarKind::I32);
        let keeper = builder.declare_record("Keeper").unwrap();
        let animal = builder
            .record(
                "Animal",
                RecordDef::new().member("Name", text).member("Keeper", keeper).abstract_shape(),
            )
            .unwrap();
        builder
            .record("Cat", RecordDef::new().base(animal).member("Lives", int))
            .unwrap();
        let animals = builder.sequence(SequenceKind::List, animal).unwrap();
        builder
            .define_record(keeper, RecordDef::new().member("Name", text).member("Animals", animals))
            .unwrap();
        Zoo {
            schema: builder.build().unwrap(),
            animal,
            animals,
            keeper,
        }
    }

    #[test]
    fn test_cycles_round_trip_through_ids() {
        let z = zoo();
        let json = json!({
            "$id": "k",
            "Name": "Ann",
            "Animals": [
                { "$type": "Cat", "$id": "c", "Name": "Tom", "Keeper": { "$ref": "k" }, "Lives": "9" },
                { "$ref": "c" }
            ]
        });
        let value = Decoder::new(&z.schema).decode(z.keeper, &json).unwrap();
        let keeper = value.as_object().unwrap();
        let animals = z.schema.field(keeper, "Animals").unwrap();
        let items = animals.as_object().unwrap().items();
        assert_eq!(items[0], items[1]);
        let cat = items[0].as_object().unwrap();
        assert_eq!(z.schema.field(cat, "Keeper"), Some(value.clone()));
        assert_eq!(z.schema.field(cat, "Lives"), Some(Value::I32(9)));

        let out = Encoder::new(&z.schema).encode(z.keeper, &value).unwrap();
        insta::assert_snapshot!(out.to_string(), @r#"{"$id":"1","Name":"Ann","Animals":[{"$id":"2","$type":"Cat","Name":"Tom","Keeper":{"$ref":"1"},"Lives":9},{"$ref":"2"}]}"#);
    }

    #[test]
    fn test_abstract_record_needs_a_type() {
        let z = zoo();
        let err = Decoder::new(&z.schema)
            .decode(z.animals, &json!([{ "Name": "Rex" }]))
            .unwrap_err();
        insta::assert_snapshot!(format!("{err:#}"), @"at index 0: `Animal` is abstract; name a concrete shape with `$type`");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let z = zoo();
        let mut decoder = Decoder::new(&z.schema);
        assert!(decoder.decode(z.keeper, &json!({ "Nmae": "Ann" })).is_err());
        assert!(decoder.decode(z.keeper, &json!({ "$ref": "missing" })).is_err());
        assert!(decoder.decode(z.animal, &json!({ "$type": "Keeper" })).is_err());
        assert!(
            decoder
                .decode(z.keeper, &json!({ "Animals": [{ "$type": "Cat", "Lives": "lots" }] }))
                .is_err()
        );
        assert_eq!(decoder.decode(z.keeper, &Json::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_scalars_dictionaries_and_enums() {
        let mut builder = SchemaBuilder::new();
        let text = builder.scalar(ScalarKind::Text);
        let long = builder.scalar(ScalarKind::I64);
        let color = builder
            .enumeration("Color", ScalarKind::I32, &[("Red", 1), ("Green", 2)])
            .unwrap();
        let palette = builder.dictionary(text, color).unwrap();
        let totals = builder.dictionary(long, text).unwrap();
        let schema = builder.build().unwrap();

        let json = json!({ "sky": "Green", "rose": 1 });
        let value = Decoder::new(&schema).decode(palette, &json).unwrap();
        let entries = value.as_object().unwrap().entries();
        assert_eq!(entries[1].1, Value::Enum(EnumValue::new(color, 1)));
        assert_eq!(Encoder::new(&schema).encode(palette, &value).unwrap(), json!({ "sky": "Green", "rose": "Red" }));

        let value = Decoder::new(&schema).decode(totals, &json!({ "12": "a" })).unwrap();
        assert_eq!(value.as_object().unwrap().entries()[0].0, Value::I64(12));
        assert_eq!(Encoder::new(&schema).encode(totals, &value).unwrap(), json!({ "12": "a" }));
    }

    #[test]
    fn test_self_containing_collection_is_an_error() {
        let mut builder = SchemaBuilder::new();
        let text = builder.scalar(ScalarKind::Text);
        let items = builder.sequence(SequenceKind::List, text).unwrap();
        let schema = builder.build().unwrap();
        let list = ObjRef::new(items, ObjectData::Items(Vec::new()));
        list.set_items(vec![Value::Ref(list.clone())]);

        let err = Encoder::new(&schema).encode(items, &Value::Ref(list.clone())).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"`list<text>` contains itself");
        list.set_items(Vec::new());
    }
}
