// Copyright (c) 2024-2026 The cornichon developers.  Licensed under the Apache
// License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Serde support for `value::Value`.
//!
//! `Value` is the native decoding target; these impls let it travel through
//! the generic serde data model as well, and provide `to_value`/`from_value`
//! for converting between `Value` and arbitrary (de)serializable types.
//! Python-only notions (classes, calls, persistent refs) have no data-model
//! counterpart and error out here; they only survive through the
//! `value_from_*`/`value_to_*` entry points.

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::vec;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::de::{self, IntoDeserializer};
use serde::forward_to_deserialize_any;
use serde::ser::{self, Serialize};

use crate::error::{Error, ErrorCode, Result};
use crate::value::{HashableValue, Value};

impl Serialize for Value {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match *self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(b),
            Value::I64(i) => serializer.serialize_i64(i),
            Value::Int(ref i) => {
                if let Some(i) = i.to_i64() {
                    serializer.serialize_i64(i)
                } else if let Some(u) = i.to_u64() {
                    serializer.serialize_u64(u)
                } else {
                    Err(ser::Error::custom("integer too large"))
                }
            }
            Value::F64(f) => serializer.serialize_f64(f),
            Value::String(ref s) => serializer.serialize_str(s),
            Value::ByteStr(ref b) | Value::Bytes(ref b) | Value::ByteArray(ref b) =>
                serializer.serialize_bytes(b),
            Value::Tuple(ref t) => serializer.collect_seq(t.iter()),
            Value::List(ref l) => serializer.collect_seq(l.iter()),
            Value::Dict(ref d) =>
                serializer.collect_map(d.iter().map(|(k, v)| (k.clone().to_value(), v))),
            Value::PyDict(ref d) => serializer.collect_map(d.iter()),
            Value::Class(_) | Value::Call { .. } | Value::Ref(_) =>
                Err(ser::Error::custom("value not representable in serde data model")),
        }
    }
}

impl<'de> de::Deserialize<'de> for Value {
    #[inline]
    fn deserialize<D: de::Deserializer<'de>>(deser: D) -> std::result::Result<Value, D::Error> {
        struct ValueVisitor;

        impl<'de> de::Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
                fmt.write_str("any pickleable value")
            }

            #[inline]
            fn visit_bool<E>(self, value: bool) -> std::result::Result<Value, E> {
                Ok(Value::Bool(value))
            }

            #[inline]
            fn visit_i64<E>(self, value: i64) -> std::result::Result<Value, E> {
                Ok(Value::I64(value))
            }

            #[inline]
            fn visit_u64<E>(self, value: u64) -> std::result::Result<Value, E> {
                if value <= i64::MAX as u64 {
                    Ok(Value::I64(value as i64))
                } else {
                    Ok(Value::Int(BigInt::from(value)))
                }
            }

            #[inline]
            fn visit_f64<E>(self, value: f64) -> std::result::Result<Value, E> {
                Ok(Value::F64(value))
            }

            #[inline]
            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Value, E> {
                self.visit_string(String::from(value))
            }

            #[inline]
            fn visit_string<E>(self, value: String) -> std::result::Result<Value, E> {
                Ok(Value::String(value))
            }

            #[inline]
            fn visit_bytes<E: de::Error>(self, value: &[u8]) -> std::result::Result<Value, E> {
                self.visit_byte_buf(value.to_vec())
            }

            #[inline]
            fn visit_byte_buf<E>(self, value: Vec<u8>) -> std::result::Result<Value, E> {
                Ok(Value::Bytes(value))
            }

            #[inline]
            fn visit_none<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::None)
            }

            #[inline]
            fn visit_some<D: de::Deserializer<'de>>(self, deser: D)
                                                    -> std::result::Result<Value, D::Error> {
                de::Deserialize::deserialize(deser)
            }

            #[inline]
            fn visit_unit<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::None)
            }

            #[inline]
            fn visit_seq<V: de::SeqAccess<'de>>(self, mut access: V)
                                                -> std::result::Result<Value, V::Error> {
                let mut values = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(item) = access.next_element()? {
                    values.push(item);
                }
                Ok(Value::List(values))
            }

            fn visit_map<V: de::MapAccess<'de>>(self, mut access: V)
                                                -> std::result::Result<Value, V::Error> {
                let mut map = BTreeMap::new();
                while let Some((key, value)) = access.next_entry::<Value, Value>()? {
                    let key = key.to_hashable().ok_or_else(
                        || de::Error::custom("map key not hashable"))?;
                    map.insert(key, value);
                }
                Ok(Value::Dict(map))
            }
        }

        deser.deserialize_any(ValueVisitor)
    }
}

/// Convert any serializable object into a `Value`.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

/// Deserialize a decoded `Value` into any deserializable type.
pub fn from_value<T: de::DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(ValueDeserializer { value })
}

// ---- serde -> Value ----

struct ValueSerializer;

fn hashable(value: Value) -> Result<HashableValue> {
    value.to_hashable()
         .ok_or(Error::Syntax(ErrorCode::NotHashable))
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeVariantVec;
    type SerializeMap = SerializeDict;
    type SerializeStruct = SerializeDict;
    type SerializeStructVariant = SerializeVariantDict;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::I64(v as i64))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::I64(v as i64))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::I64(v as i64))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::I64(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        match i64::try_from(v) {
            Ok(v) => Ok(Value::I64(v)),
            Err(_) => Ok(Value::Int(BigInt::from(v))),
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::I64(v as i64))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::I64(v as i64))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::I64(v as i64))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        if v <= i64::MAX as u64 {
            Ok(Value::I64(v as i64))
        } else {
            Ok(Value::Int(BigInt::from(v)))
        }
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        match i64::try_from(v) {
            Ok(v) => Ok(Value::I64(v)),
            Err(_) => Ok(Value::Int(BigInt::from(v))),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::F64(v as f64))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::F64(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::String(v.into()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::None)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Tuple(Box::new([])))
    }

    fn serialize_unit_variant(self, _name: &'static str, _index: u32,
                              variant: &'static str) -> Result<Value> {
        Ok(Value::Tuple(Box::new([Value::String(variant.into())])))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _name: &'static str, value: &T)
                                                       -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self, _name: &'static str, _index: u32, variant: &'static str, value: &T)
        -> Result<Value>
    {
        Ok(Value::Tuple(Box::new([Value::String(variant.into()),
                                  value.serialize(ValueSerializer)?])))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec { items: Vec::with_capacity(len.unwrap_or(0)), tuple: false })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec> {
        Ok(SerializeVec { items: Vec::with_capacity(len), tuple: true })
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec> {
        ser::Serializer::serialize_tuple(self, len)
    }

    fn serialize_tuple_variant(self, _name: &'static str, _index: u32,
                               variant: &'static str, len: usize) -> Result<SerializeVariantVec> {
        Ok(SerializeVariantVec { variant, items: Vec::with_capacity(len) })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<SerializeDict> {
        Ok(SerializeDict { map: BTreeMap::new(), key: None })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<SerializeDict> {
        Ok(SerializeDict { map: BTreeMap::new(), key: None })
    }

    fn serialize_struct_variant(self, _name: &'static str, _index: u32,
                                variant: &'static str, _len: usize)
                                -> Result<SerializeVariantDict> {
        Ok(SerializeVariantDict { variant, map: BTreeMap::new() })
    }
}

pub struct SerializeVec {
    items: Vec<Value>,
    tuple: bool,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        if self.tuple {
            Ok(Value::Tuple(self.items.into_boxed_slice()))
        } else {
            Ok(Value::List(self.items))
        }
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

pub struct SerializeVariantVec {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeVariantVec {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Tuple(Box::new([Value::String(self.variant.into()),
                                  Value::List(self.items)])))
    }
}

pub struct SerializeDict {
    map: BTreeMap<HashableValue, Value>,
    key: Option<HashableValue>,
}

impl ser::SerializeMap for SerializeDict {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.key = Some(hashable(key.serialize(ValueSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self.key.take()
                          .ok_or_else(|| Error::Syntax(
                              ErrorCode::Structure("value without key".into())))?;
        self.map.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Dict(self.map))
    }
}

impl ser::SerializeStruct for SerializeDict {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T)
                                              -> Result<()> {
        self.map.insert(HashableValue::String(key.into()),
                        value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Dict(self.map))
    }
}

pub struct SerializeVariantDict {
    variant: &'static str,
    map: BTreeMap<HashableValue, Value>,
}

impl ser::SerializeStructVariant for SerializeVariantDict {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T)
                                              -> Result<()> {
        self.map.insert(HashableValue::String(key.into()),
                        value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Tuple(Box::new([Value::String(self.variant.into()),
                                  Value::Dict(self.map)])))
    }
}

// ---- Value -> serde ----

struct ValueDeserializer {
    value: Value,
}

fn structure_error(what: &str) -> Error {
    Error::Syntax(ErrorCode::Structure(what.into()))
}

fn dict_pairs(value: Value) -> Option<Vec<(Value, Value)>> {
    match value {
        Value::Dict(map) =>
            Some(map.into_iter().map(|(k, v)| (k.to_value(), v)).collect()),
        Value::PyDict(dict) =>
            Some(dict.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        _ => None,
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::None => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::I64(i) => visitor.visit_i64(i),
            Value::Int(i) => {
                if let Some(i) = i.to_i64() {
                    visitor.visit_i64(i)
                } else if let Some(u) = i.to_u64() {
                    visitor.visit_u64(u)
                } else {
                    Err(structure_error("integer too large"))
                }
            }
            Value::F64(f) => visitor.visit_f64(f),
            Value::String(s) => visitor.visit_string(s),
            Value::ByteStr(b) | Value::Bytes(b) | Value::ByteArray(b) =>
                visitor.visit_byte_buf(b),
            Value::Tuple(t) => visit_seq(t.into_vec(), visitor),
            Value::List(l) => visit_seq(l, visitor),
            value @ Value::Dict(_) | value @ Value::PyDict(_) => {
                let pairs = dict_pairs(value)
                    .ok_or_else(|| structure_error("expected dict"))?;
                visitor.visit_map(MapDeserializer {
                    iter: pairs.into_iter(),
                    value: None,
                })
            }
            Value::Class(_) =>
                Err(Error::Syntax(ErrorCode::UnsupportedType("class"))),
            Value::Call { .. } =>
                Err(Error::Syntax(ErrorCode::UnsupportedType("call"))),
            Value::Ref(_) =>
                Err(Error::Syntax(ErrorCode::UnsupportedType("persistent reference"))),
        }
    }

    #[inline]
    fn deserialize_option<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.value {
            Value::None => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    #[inline]
    fn deserialize_newtype_struct<V: de::Visitor<'de>>(self, _name: &'static str, visitor: V)
                                                       -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    // Enums are accepted both as ('Variant', data) tuples, the form our
    // serializers emit, and as plain strings or single-entry maps.
    fn deserialize_enum<V: de::Visitor<'de>>(self, _name: &'static str,
                                             _variants: &'static [&'static str],
                                             visitor: V) -> Result<V::Value> {
        let (variant, value) = match self.value {
            Value::String(s) => (s, None),
            Value::Tuple(t) => {
                let mut items = t.into_vec();
                match items.len() {
                    1 | 2 => {
                        let value = if items.len() == 2 { items.pop() } else { None };
                        match items.pop() {
                            Some(Value::String(s)) => (s, value),
                            _ => return Err(structure_error("variant name must be a string")),
                        }
                    }
                    _ => return Err(structure_error("variant tuple must have 1 or 2 items")),
                }
            }
            value @ Value::Dict(_) | value @ Value::PyDict(_) => {
                let mut pairs = dict_pairs(value)
                    .ok_or_else(|| structure_error("expected dict"))?;
                if pairs.len() != 1 {
                    return Err(structure_error("variant dict must have a single entry"));
                }
                match pairs.pop() {
                    Some((Value::String(s), value)) => (s, Some(value)),
                    _ => return Err(structure_error("variant name must be a string")),
                }
            }
            _ => return Err(structure_error("cannot deserialize enum from this value")),
        };
        visitor.visit_enum(EnumDeserializer { variant, value })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

fn visit_seq<'de, V: de::Visitor<'de>>(items: Vec<Value>, visitor: V) -> Result<V::Value> {
    visitor.visit_seq(SeqDeserializer { iter: items.into_iter() })
}

struct SeqDeserializer {
    iter: vec::IntoIter<Value>,
}

impl<'de> de::SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T: de::DeserializeSeed<'de>>(&mut self, seed: T)
                                                      -> Result<Option<T::Value>> {
        match self.iter.next() {
            Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: vec::IntoIter<(Value, Value)>,
    value: Option<Value>,
}

impl<'de> de::MapAccess<'de> for MapDeserializer {
    type Error = Error;

    fn next_key_seed<K: de::DeserializeSeed<'de>>(&mut self, seed: K)
                                                  -> Result<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(ValueDeserializer { value: key }).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: de::DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let value = self.value.take()
                              .ok_or_else(|| structure_error("value without key"))?;
        seed.deserialize(ValueDeserializer { value })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: Option<Value>,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = VariantDeserializer;

    fn variant_seed<V: de::DeserializeSeed<'de>>(self, seed: V)
                                                 -> Result<(V::Value, VariantDeserializer)> {
        let variant = self.variant.into_deserializer();
        let visitor = VariantDeserializer { value: self.value };
        seed.deserialize(variant).map(|v| (v, visitor))
    }
}

struct VariantDeserializer {
    value: Option<Value>,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            None => Ok(()),
            Some(_) => Err(structure_error("unexpected data for unit variant")),
        }
    }

    fn newtype_variant_seed<T: de::DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        match self.value {
            Some(value) => seed.deserialize(ValueDeserializer { value }),
            None => Err(structure_error("missing data for newtype variant")),
        }
    }

    fn tuple_variant<V: de::Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        match self.value {
            Some(Value::Tuple(t)) => visit_seq(t.into_vec(), visitor),
            Some(Value::List(l)) => visit_seq(l, visitor),
            _ => Err(structure_error("missing data for tuple variant")),
        }
    }

    fn struct_variant<V: de::Visitor<'de>>(self, _fields: &'static [&'static str], visitor: V)
                                           -> Result<V::Value> {
        match self.value {
            Some(value) => {
                let pairs = dict_pairs(value)
                    .ok_or_else(|| structure_error("missing data for struct variant"))?;
                visitor.visit_map(MapDeserializer { iter: pairs.into_iter(), value: None })
            }
            None => Err(structure_error("missing data for struct variant")),
        }
    }
}
