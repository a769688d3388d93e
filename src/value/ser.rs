//! Context conversion through serde.
//!
//! [`to_value`] runs any `Serialize` type through a serializer whose output
//! is a [`Value`] tree: structs and maps become [`Value::Map`], sequences
//! and tuples become [`Value::List`], scalars map onto the matching
//! variant, and unit-like shapes become [`Value::None`]. Enum variants
//! serialize as a single-entry map keyed by the variant name; unit
//! variants become their name.

use serde::ser::{Error as _, Serialize};

use crate::{List, Map, RenderError, Value};

type Result<T, E = RenderError> = std::result::Result<T, E>;

/// Convert any serializable data into a [`Value`].
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub fn to_value<T>(value: T) -> Result<Value>
where
    T: Serialize,
{
    value.serialize(ValueSerializer)
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            // Neither sentinel has a data representation; both collapse to
            // unit.
            Value::None | Value::Default => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(list) => serializer.collect_seq(list),
            Value::Map(map) => serializer.collect_map(map),
        }
    }
}

struct ValueSerializer;

/// Enum variant payloads nest under the variant name.
fn wrap_variant(variant: &'static str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(variant.to_string(), value);
    Value::Map(map)
}

/// Map keys must come out of serialization string-like.
fn key_string(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(RenderError::custom("map key does not serialize to a string")),
    }
}

macro_rules! scalar_methods {
    ($($method:ident($ty:ty) -> $variant:ident;)+) => {
        $(
            fn $method(self, v: $ty) -> Result<Value> {
                Ok(Value::$variant(v.into()))
            }
        )+
    };
}

impl serde::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = RenderError;

    type SerializeSeq = ListBuilder;
    type SerializeTuple = ListBuilder;
    type SerializeTupleStruct = ListBuilder;
    type SerializeTupleVariant = ListBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    scalar_methods! {
        serialize_bool(bool) -> Bool;
        serialize_i8(i8) -> Integer;
        serialize_i16(i16) -> Integer;
        serialize_i32(i32) -> Integer;
        serialize_i64(i64) -> Integer;
        serialize_u8(u8) -> Integer;
        serialize_u16(u16) -> Integer;
        serialize_u32(u32) -> Integer;
        serialize_f32(f32) -> Float;
        serialize_f64(f64) -> Float;
        serialize_str(&str) -> String;
        serialize_char(char) -> String;
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| RenderError::custom("integer out of range for the value model"))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(v.iter().copied().collect())
    }

    // Unit-like shapes all collapse to the explicit-absence sentinel.

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::None)
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::None)
    }

    // Transparent wrappers serialize as their contents.

    fn serialize_some<T>(self, value: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(self)
    }

    // Enum variants.

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        Ok(wrap_variant(variant, value.serialize(ValueSerializer)?))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<ListBuilder> {
        Ok(ListBuilder::new(len, Some(variant)))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapBuilder> {
        Ok(MapBuilder::new(Some(variant)))
    }

    // Containers.

    fn serialize_seq(self, len: Option<usize>) -> Result<ListBuilder> {
        Ok(ListBuilder::new(len.unwrap_or(0), None))
    }

    fn serialize_tuple(self, len: usize) -> Result<ListBuilder> {
        Ok(ListBuilder::new(len, None))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<ListBuilder> {
        Ok(ListBuilder::new(len, None))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder> {
        Ok(MapBuilder::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder> {
        Ok(MapBuilder::new(None))
    }
}

/// Accumulator for everything sequence-shaped: sequences, tuples, tuple
/// structs, and tuple variants.
struct ListBuilder {
    items: List<Value>,
    wrap: Option<&'static str>,
}

impl ListBuilder {
    fn new(capacity: usize, wrap: Option<&'static str>) -> Self {
        Self {
            items: List::with_capacity(capacity),
            wrap,
        }
    }

    fn push<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> Result<Value> {
        let list = Value::List(self.items);
        Ok(match self.wrap {
            Some(variant) => wrap_variant(variant, list),
            None => list,
        })
    }
}

macro_rules! list_like {
    ($($trait_:ident :: $method:ident,)+) => {
        $(
            impl serde::ser::$trait_ for ListBuilder {
                type Ok = Value;
                type Error = RenderError;

                fn $method<T>(&mut self, value: &T) -> Result<()>
                where
                    T: Serialize + ?Sized,
                {
                    self.push(value)
                }

                fn end(self) -> Result<Value> {
                    self.finish()
                }
            }
        )+
    };
}

list_like! {
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
}

/// Accumulator for everything map-shaped: maps, structs, and struct
/// variants.
struct MapBuilder {
    entries: Map<String, Value>,
    pending_key: Option<String>,
    wrap: Option<&'static str>,
}

impl MapBuilder {
    fn new(wrap: Option<&'static str>) -> Self {
        Self {
            entries: Map::new(),
            pending_key: None,
            wrap,
        }
    }

    fn insert<T>(&mut self, key: String, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.entries.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> Result<Value> {
        let map = Value::Map(self.entries);
        Ok(match self.wrap {
            Some(variant) => wrap_variant(variant, map),
            None => map,
        })
    }
}

impl serde::ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = RenderError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.pending_key = Some(key_string(key.serialize(ValueSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        match self.pending_key.take() {
            Some(key) => self.insert(key, value),
            None => Err(RenderError::custom("map value serialized before its key")),
        }
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

macro_rules! struct_like {
    ($($trait_:ident,)+) => {
        $(
            impl serde::ser::$trait_ for MapBuilder {
                type Ok = Value;
                type Error = RenderError;

                fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
                where
                    T: Serialize + ?Sized,
                {
                    self.insert(key.to_string(), value)
                }

                fn end(self) -> Result<Value> {
                    self.finish()
                }
            }
        )+
    };
}

struct_like! {
    SerializeStruct,
    SerializeStructVariant,
}
