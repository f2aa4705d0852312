// Copyright (c) 2024-2026 The cornichon developers.  Licensed under the Apache
// License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Pickle serialization
//!
//! For every value shape the encoder emits the shortest opcode sequence that
//! is legal at the configured protocol, so e.g. small integers become
//! `BININT1` from protocol 1 on while protocol 0 spells them in decimal.

use std::convert::TryFrom;
use std::io;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use num_bigint::BigInt;
use serde::ser::{self, Serialize};

use crate::codecs;
use crate::consts::*;
use crate::error::{Error, ErrorCode, Result};
use crate::value::{Class, HashableValue, Value};

/// Highest protocol version we support generating.
const HIGHEST_PROTOCOL: u8 = 5;

/// Hook turning values into persistent references.  Returning a persistent
/// ID encodes the value as a reference to it instead of its contents.
pub type PersistentRef = Box<dyn Fn(&Value) -> Option<Value>>;

/// Options for serializing.
pub struct SerOptions {
    protocol: u8,
    strict_unicode: bool,
    persistent_ref: Option<PersistentRef>,
}

impl Default for SerOptions {
    fn default() -> Self {
        SerOptions {
            // both Python 2 and Python 3 can decode protocol 2
            protocol: 2,
            strict_unicode: false,
            persistent_ref: None,
        }
    }
}

impl SerOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Select the pickle protocol version, 0 to 5.  Values outside that
    /// range make encoding fail with `InvalidProtocol`.
    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    /// Always emit text as Python unicode and `ByteStr` as py2 str, instead
    /// of following the protocol's natural str type.
    pub fn strict_unicode(mut self) -> Self {
        self.strict_unicode = true;
        self
    }

    /// Encode values the hook recognizes as persistent references.  The
    /// returned persistent ID must not itself be claimed by the hook.
    pub fn persistent_ref<F>(mut self, get_ref: F) -> Self
        where F: Fn(&Value) -> Option<Value> + 'static
    {
        self.persistent_ref = Some(Box::new(get_ref));
        self
    }
}

/// A structure for serializing Rust values into a Pickle stream.
pub struct Serializer<W> {
    writer: W,
    options: SerOptions,
}

impl<W: io::Write> Serializer<W> {
    pub fn new(writer: W, options: SerOptions) -> Self {
        Serializer { writer, options }
    }

    /// Unwrap the `Writer` from the `Serializer`.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn proto(&self) -> u8 {
        self.options.protocol
    }

    #[inline]
    fn write_opcode(&mut self, opcode: u8) -> Result<()> {
        self.writer.write_all(&[opcode]).map_err(From::from)
    }

    /// Emit the `PROTO` preamble where the protocol asks for one.
    fn write_header(&mut self) -> Result<()> {
        let proto = self.proto();
        if proto > HIGHEST_PROTOCOL {
            return Err(Error::Syntax(ErrorCode::InvalidProtocol(proto)));
        }
        if proto >= 2 {
            self.write_opcode(PROTO)?;
            self.writer.write_u8(proto)?;
        }
        Ok(())
    }

    pub fn serialize_value(&mut self, value: &Value) -> Result<()> {
        let as_ref = match &self.options.persistent_ref {
            Some(get_ref) => get_ref(value),
            None => None,
        };
        if let Some(pid) = as_ref {
            return self.serialize_ref(&pid);
        }
        match *value {
            Value::None => self.write_opcode(NONE),
            Value::Bool(b) => self.serialize_bool(b),
            Value::I64(i) => self.serialize_i64(i),
            Value::Int(ref i) => self.serialize_bigint(i),
            Value::F64(f) => self.serialize_f64(f),
            Value::String(ref s) => self.serialize_text(s),
            Value::ByteStr(ref b) => self.serialize_bytestr(b),
            Value::Bytes(ref b) => self.serialize_bytes(b),
            Value::ByteArray(ref b) => self.serialize_bytearray(b),
            Value::Tuple(ref t) =>
                self.serialize_tuplevalue(t, |slf, v| slf.serialize_value(v)),
            Value::List(ref l) => {
                if self.proto() >= 1 && l.is_empty() {
                    return self.write_opcode(EMPTY_LIST);
                }
                self.write_opcode(MARK)?;
                for item in l {
                    self.serialize_value(item)?;
                }
                self.write_opcode(LIST)
            }
            Value::Dict(ref d) => {
                if self.proto() >= 1 && d.is_empty() {
                    return self.write_opcode(EMPTY_DICT);
                }
                self.write_opcode(MARK)?;
                for (key, value) in d {
                    self.serialize_hashable_value(key)?;
                    self.serialize_value(value)?;
                }
                self.write_opcode(DICT)
            }
            Value::PyDict(ref d) => {
                if self.proto() >= 1 && d.is_empty() {
                    return self.write_opcode(EMPTY_DICT);
                }
                self.write_opcode(MARK)?;
                for (key, value) in d {
                    self.serialize_value(key)?;
                    self.serialize_value(value)?;
                }
                self.write_opcode(DICT)
            }
            Value::Class(ref class) => self.serialize_class(class),
            Value::Call { ref callable, ref args } => self.serialize_call(callable, args),
            Value::Ref(ref pid) => self.serialize_ref(pid),
        }
    }

    fn serialize_hashable_value(&mut self, value: &HashableValue) -> Result<()> {
        match *value {
            HashableValue::None => self.write_opcode(NONE),
            HashableValue::Bool(b) => self.serialize_bool(b),
            HashableValue::I64(i) => self.serialize_i64(i),
            HashableValue::Int(ref i) => self.serialize_bigint(i),
            HashableValue::F64(f) => self.serialize_f64(f),
            HashableValue::String(ref s) => self.serialize_text(s),
            HashableValue::ByteStr(ref b) => self.serialize_bytestr(b),
            HashableValue::Bytes(ref b) => self.serialize_bytes(b),
            HashableValue::Tuple(ref t) =>
                self.serialize_tuplevalue(t, |slf, v| slf.serialize_hashable_value(v)),
            HashableValue::Class(ref class) => self.serialize_class(class),
        }
    }

    fn serialize_bool(&mut self, value: bool) -> Result<()> {
        if self.proto() >= 2 {
            self.write_opcode(if value { NEWTRUE } else { NEWFALSE })
        } else {
            // protocol 0/1 spelling, see INT docs in pickletools.py
            self.write_str(if value { "I01\n" } else { "I00\n" })
        }
    }

    fn serialize_i64(&mut self, value: i64) -> Result<()> {
        if self.proto() >= 1 {
            if (0..=0xff).contains(&value) {
                self.write_opcode(BININT1)?;
                return self.writer.write_u8(value as u8).map_err(From::from);
            }
            if (0x100..=0xffff).contains(&value) {
                self.write_opcode(BININT2)?;
                return self.writer.write_u16::<LittleEndian>(value as u16).map_err(From::from);
            }
            if (-0x8000_0000..=0x7fff_ffff).contains(&value) {
                self.write_opcode(BININT)?;
                return self.writer.write_i32::<LittleEndian>(value as i32).map_err(From::from);
            }
        }
        // wider ints have no binary opcode short of LONG; decimal works at
        // every protocol
        write!(self.writer, "I{}\n", value).map_err(From::from)
    }

    fn serialize_bigint(&mut self, value: &BigInt) -> Result<()> {
        write!(self.writer, "L{}L\n", value).map_err(From::from)
    }

    fn serialize_f64(&mut self, value: f64) -> Result<()> {
        if self.proto() >= 1 {
            self.write_opcode(BINFLOAT)?;
            // Yes, this one is big endian.
            self.writer.write_f64::<BigEndian>(value).map_err(From::from)
        } else {
            write!(self.writer, "F{}\n", format_float_g(value)).map_err(From::from)
        }
    }

    /// Text in the protocol's natural str type, unless strict-unicode mode
    /// pins it to unicode.
    fn serialize_text(&mut self, value: &str) -> Result<()> {
        if self.options.strict_unicode || self.proto() >= 3 {
            self.serialize_unicode(value)
        } else {
            self.serialize_bytestr(value.as_bytes())
        }
    }

    /// A py2 str: `STRING` at protocol 0, counted binstrings later on.
    fn serialize_bytestr(&mut self, value: &[u8]) -> Result<()> {
        if self.proto() >= 1 {
            if value.len() < 256 {
                self.write_opcode(SHORT_BINSTRING)?;
                self.writer.write_u8(value.len() as u8)?;
            } else {
                self.write_opcode(BINSTRING)?;
                self.writer.write_u32::<LittleEndian>(value.len() as u32)?;
            }
            self.writer.write_all(value).map_err(From::from)
        } else {
            self.write_opcode(STRING)?;
            self.writer.write_all(&codecs::pyquote(value))?;
            self.write_str("\n")
        }
    }

    /// A unicode object regardless of protocol or mode.
    fn serialize_unicode(&mut self, value: &str) -> Result<()> {
        if self.proto() >= 1 {
            let len = value.len();
            if len < 256 && self.proto() >= 4 {
                self.write_opcode(SHORT_BINUNICODE)?;
                self.writer.write_u8(len as u8)?;
            } else {
                self.write_opcode(BINUNICODE)?;
                self.writer.write_u32::<LittleEndian>(len as u32)?;
            }
            self.writer.write_all(value.as_bytes()).map_err(From::from)
        } else {
            let escaped = codecs::encode_raw_unicode_escape(value.as_bytes(), true)
                .map_err(Error::Syntax)?;
            self.write_opcode(UNICODE)?;
            self.writer.write_all(&escaped)?;
            self.write_str("\n")
        }
    }

    fn serialize_bytes(&mut self, value: &[u8]) -> Result<()> {
        if self.proto() >= 3 {
            if value.len() < 256 {
                self.write_opcode(SHORT_BINBYTES)?;
                self.writer.write_u8(value.len() as u8)?;
            } else {
                self.write_opcode(BINBYTES)?;
                self.writer.write_u32::<LittleEndian>(value.len() as u32)?;
            }
            return self.writer.write_all(value).map_err(From::from);
        }

        // protocol 0..2: emit `_codecs.encode(value.decode('latin1'),
        // 'latin1')`, the way python3 spells bytes for python2's benefit.
        // The text argument must stay unicode and the encoding name a py2
        // str in either unicode mode.
        self.serialize_class(&Class::new("_codecs", "encode"))?;
        let latin1 = codecs::latin1_decode(value);
        if self.proto() >= 2 {
            self.serialize_unicode(&latin1)?;
            self.serialize_bytestr(b"latin1")?;
            self.write_opcode(TUPLE2)?;
        } else {
            self.write_opcode(MARK)?;
            self.serialize_unicode(&latin1)?;
            self.serialize_bytestr(b"latin1")?;
            self.write_opcode(TUPLE)?;
        }
        self.write_opcode(REDUCE)
    }

    fn serialize_bytearray(&mut self, value: &[u8]) -> Result<()> {
        if self.proto() >= 5 {
            self.write_opcode(BYTEARRAY8)?;
            self.writer.write_u64::<LittleEndian>(value.len() as u64)?;
            return self.writer.write_all(value).map_err(From::from);
        }

        // bytearray(bytes) reduce, with the builtins module named the way
        // the target python would
        self.serialize_class(&Class::new(self.pybuiltin(), "bytearray"))?;
        if self.proto() >= 2 {
            self.serialize_bytes(value)?;
            self.write_opcode(TUPLE1)?;
        } else {
            self.write_opcode(MARK)?;
            self.serialize_bytes(value)?;
            self.write_opcode(TUPLE)?;
        }
        self.write_opcode(REDUCE)
    }

    fn pybuiltin(&self) -> &'static str {
        if self.proto() >= 3 { "builtins" } else { "__builtin__" }
    }

    fn serialize_tuplevalue<T, F>(&mut self, t: &[T], f: F) -> Result<()>
        where F: Fn(&mut Self, &T) -> Result<()>
    {
        if self.proto() >= 2 && (1..=3).contains(&t.len()) {
            for item in t {
                f(self, item)?;
            }
            let op = match t.len() {
                1 => TUPLE1,
                2 => TUPLE2,
                _ => TUPLE3,
            };
            return self.write_opcode(op);
        }
        if self.proto() >= 1 && t.is_empty() {
            return self.write_opcode(EMPTY_TUPLE);
        }
        self.write_opcode(MARK)?;
        for item in t {
            f(self, item)?;
        }
        self.write_opcode(TUPLE)
    }

    fn serialize_class(&mut self, class: &Class) -> Result<()> {
        // PEP 3154: protocol 4 forbids GLOBAL in favor of STACK_GLOBAL
        if self.proto() >= 4 {
            self.serialize_unicode(&class.module)?;
            self.serialize_unicode(&class.name)?;
            return self.write_opcode(STACK_GLOBAL);
        }
        if class.module.contains('\n') || class.name.contains('\n') {
            return Err(Error::Syntax(ErrorCode::GlobalNewline));
        }
        write!(self.writer, "c{}\n{}\n", class.module, class.name).map_err(From::from)
    }

    fn serialize_call(&mut self, callable: &Class, args: &[Value]) -> Result<()> {
        self.serialize_class(callable)?;
        self.serialize_tuplevalue(args, |slf, v| slf.serialize_value(v))?;
        self.write_opcode(REDUCE)
    }

    fn serialize_ref(&mut self, pid: &Value) -> Result<()> {
        if self.proto() == 0 {
            // line-based PERSID carries text only
            match *pid {
                Value::String(ref s) if !s.contains('\n') => {
                    write!(self.writer, "P{}\n", s).map_err(From::from)
                }
                _ => Err(Error::Syntax(ErrorCode::Proto0PersIdLineOnly)),
            }
        } else {
            self.serialize_value(pid)?;
            self.write_opcode(BINPERSID)
        }
    }

    fn write_str(&mut self, s: &str) -> Result<()> {
        self.writer.write_all(s.as_bytes()).map_err(From::from)
    }
}

/// Format a float the way `%g` does: shortest round-trip digits, switching
/// to exponent notation (sign and at least two exponent digits) when the
/// decimal exponent is below -4 or at least 6.  Rust's `Display` never uses
/// an exponent, so it would spell 1e100 with 101 digits.
fn format_float_g(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    // LowerExp already produces the shortest round-trip digits
    let sci = format!("{:e}", value);
    let epos = match sci.rfind('e') {
        Some(pos) => pos,
        None => return sci,
    };
    let exp = match sci[epos + 1..].parse::<i32>() {
        Ok(exp) => exp,
        Err(_) => return sci,
    };
    let mantissa = &sci[..epos];

    if exp < -4 || exp >= 6 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }

    // expand the mantissa digits into fixed notation
    let mut out = String::with_capacity(mantissa.len() + 6);
    if mantissa.starts_with('-') {
        out.push('-');
    }
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let ndigits = digits.len() as i32;
    if exp >= ndigits - 1 {
        out.push_str(&digits);
        for _ in 0..(exp - (ndigits - 1)) {
            out.push('0');
        }
    } else if exp >= 0 {
        let point = (exp + 1) as usize;
        out.push_str(&digits[..point]);
        out.push('.');
        out.push_str(&digits[point..]);
    } else {
        out.push_str("0.");
        for _ in 0..(-exp - 1) {
            out.push('0');
        }
        out.push_str(&digits);
    }
    out
}

/// What a compound serializer still has to emit once its elements are done.
enum End {
    Nothing,
    Op(u8),
    Two(u8, u8),
}

/// In-flight sequence/map/variant serialization state.
pub struct Compound<'a, W: io::Write> {
    ser: &'a mut Serializer<W>,
    end: End,
}

impl<'a, W: io::Write> Compound<'a, W> {
    fn finish(self) -> Result<()> {
        match self.end {
            End::Nothing => Ok(()),
            End::Op(op) => self.ser.write_opcode(op),
            End::Two(first, second) => {
                self.ser.write_opcode(first)?;
                self.ser.write_opcode(second)
            }
        }
    }
}

impl<'a, W: io::Write> ser::Serializer for &'a mut Serializer<W> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Compound<'a, W>;
    type SerializeTuple = Compound<'a, W>;
    type SerializeTupleStruct = Compound<'a, W>;
    type SerializeTupleVariant = Compound<'a, W>;
    type SerializeMap = Compound<'a, W>;
    type SerializeStruct = Compound<'a, W>;
    type SerializeStructVariant = Compound<'a, W>;

    #[inline]
    fn serialize_bool(self, value: bool) -> Result<()> {
        Serializer::serialize_bool(self, value)
    }

    #[inline]
    fn serialize_i8(self, value: i8) -> Result<()> {
        self.serialize_i64(value as i64)
    }

    #[inline]
    fn serialize_i16(self, value: i16) -> Result<()> {
        self.serialize_i64(value as i64)
    }

    #[inline]
    fn serialize_i32(self, value: i32) -> Result<()> {
        self.serialize_i64(value as i64)
    }

    #[inline]
    fn serialize_i64(self, value: i64) -> Result<()> {
        Serializer::serialize_i64(self, value)
    }

    fn serialize_i128(self, value: i128) -> Result<()> {
        match i64::try_from(value) {
            Ok(value) => Serializer::serialize_i64(self, value),
            Err(_) => self.serialize_bigint(&BigInt::from(value)),
        }
    }

    #[inline]
    fn serialize_u8(self, value: u8) -> Result<()> {
        self.serialize_i64(value as i64)
    }

    #[inline]
    fn serialize_u16(self, value: u16) -> Result<()> {
        self.serialize_i64(value as i64)
    }

    #[inline]
    fn serialize_u32(self, value: u32) -> Result<()> {
        self.serialize_i64(value as i64)
    }

    #[inline]
    fn serialize_u64(self, value: u64) -> Result<()> {
        match i64::try_from(value) {
            Ok(value) => Serializer::serialize_i64(self, value),
            Err(_) => self.serialize_bigint(&BigInt::from(value)),
        }
    }

    fn serialize_u128(self, value: u128) -> Result<()> {
        match i64::try_from(value) {
            Ok(value) => Serializer::serialize_i64(self, value),
            Err(_) => self.serialize_bigint(&BigInt::from(value)),
        }
    }

    #[inline]
    fn serialize_f32(self, value: f32) -> Result<()> {
        self.serialize_f64(value as f64)
    }

    #[inline]
    fn serialize_f64(self, value: f64) -> Result<()> {
        Serializer::serialize_f64(self, value)
    }

    #[inline]
    fn serialize_char(self, value: char) -> Result<()> {
        let mut string = String::with_capacity(4); // longest utf-8 encoding
        string.push(value);
        self.serialize_text(&string)
    }

    #[inline]
    fn serialize_str(self, value: &str) -> Result<()> {
        self.serialize_text(value)
    }

    #[inline]
    fn serialize_bytes(self, value: &[u8]) -> Result<()> {
        Serializer::serialize_bytes(self, value)
    }

    #[inline]
    fn serialize_none(self) -> Result<()> {
        ser::Serializer::serialize_unit(self)
    }

    #[inline]
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    #[inline]
    fn serialize_unit(self) -> Result<()> {
        // Although Python has an empty tuple, we use None here for
        // compatibility with other serialization formats.
        self.write_opcode(NONE)
    }

    #[inline]
    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_tuplevalue::<Value, _>(&[], |_, _| Ok(()))
    }

    #[inline]
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self, _name: &'static str, value: &T) -> Result<()>
    {
        value.serialize(self)
    }

    // We use tuples for serializing enums:
    // Variant             ('Variant',)
    // Variant(T)          ('Variant', T)
    // Variant(T1, T2)     ('Variant', [T1, T2])
    // Variant { x: T }    ('Variant', {'x': T})
    fn serialize_unit_variant(self, _name: &'static str, _variant_index: u32,
                              variant: &'static str) -> Result<()> {
        if self.proto() >= 2 {
            self.serialize_text(variant)?;
            self.write_opcode(TUPLE1)
        } else {
            self.write_opcode(MARK)?;
            self.serialize_text(variant)?;
            self.write_opcode(TUPLE)
        }
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self, _name: &'static str, _variant_index: u32, variant: &'static str,
        value: &T) -> Result<()>
    {
        if self.proto() >= 2 {
            self.serialize_text(variant)?;
            value.serialize(&mut *self)?;
            self.write_opcode(TUPLE2)
        } else {
            self.write_opcode(MARK)?;
            self.serialize_text(variant)?;
            value.serialize(&mut *self)?;
            self.write_opcode(TUPLE)
        }
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        if self.proto() >= 1 && len == Some(0) {
            self.write_opcode(EMPTY_LIST)?;
            return Ok(Compound { ser: self, end: End::Nothing });
        }
        self.write_opcode(MARK)?;
        Ok(Compound { ser: self, end: End::Op(LIST) })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        if self.proto() >= 2 && (1..=3).contains(&len) {
            let op = match len {
                1 => TUPLE1,
                2 => TUPLE2,
                _ => TUPLE3,
            };
            return Ok(Compound { ser: self, end: End::Op(op) });
        }
        if self.proto() >= 1 && len == 0 {
            self.write_opcode(EMPTY_TUPLE)?;
            return Ok(Compound { ser: self, end: End::Nothing });
        }
        self.write_opcode(MARK)?;
        Ok(Compound { ser: self, end: End::Op(TUPLE) })
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize)
                              -> Result<Self::SerializeTupleStruct> {
        ser::Serializer::serialize_tuple(self, len)
    }

    fn serialize_tuple_variant(self, _name: &'static str, _variant_index: u32,
                               variant: &'static str, _len: usize)
                               -> Result<Self::SerializeTupleVariant> {
        if self.proto() >= 2 {
            self.serialize_text(variant)?;
            self.write_opcode(MARK)?;
            Ok(Compound { ser: self, end: End::Two(LIST, TUPLE2) })
        } else {
            self.write_opcode(MARK)?;
            self.serialize_text(variant)?;
            self.write_opcode(MARK)?;
            Ok(Compound { ser: self, end: End::Two(LIST, TUPLE) })
        }
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        if self.proto() >= 1 && len == Some(0) {
            self.write_opcode(EMPTY_DICT)?;
            return Ok(Compound { ser: self, end: End::Nothing });
        }
        self.write_opcode(MARK)?;
        Ok(Compound { ser: self, end: End::Op(DICT) })
    }

    fn serialize_struct(self, _name: &'static str, len: usize)
                        -> Result<Self::SerializeStruct> {
        ser::Serializer::serialize_map(self, Some(len))
    }

    fn serialize_struct_variant(self, _name: &'static str, _variant_index: u32,
                                variant: &'static str, _len: usize)
                                -> Result<Self::SerializeStructVariant> {
        if self.proto() >= 2 {
            self.serialize_text(variant)?;
            self.write_opcode(MARK)?;
            Ok(Compound { ser: self, end: End::Two(DICT, TUPLE2) })
        } else {
            self.write_opcode(MARK)?;
            self.serialize_text(variant)?;
            self.write_opcode(MARK)?;
            Ok(Compound { ser: self, end: End::Two(DICT, TUPLE) })
        }
    }
}

impl<'a, W: io::Write> ser::SerializeSeq for Compound<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: io::Write> ser::SerializeTuple for Compound<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: io::Write> ser::SerializeTupleStruct for Compound<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: io::Write> ser::SerializeTupleVariant for Compound<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: io::Write> ser::SerializeMap for Compound<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        key.serialize(&mut *self.ser)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: io::Write> ser::SerializeStruct for Compound<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T)
                                              -> Result<()> {
        key.serialize(&mut *self.ser)?;
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, W: io::Write> ser::SerializeStructVariant for Compound<'a, W> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T)
                                              -> Result<()> {
        key.serialize(&mut *self.ser)?;
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

/// Encode the value into a pickle stream.
pub fn value_to_writer<W: io::Write>(writer: &mut W, value: &Value, options: SerOptions)
                                     -> Result<()> {
    let mut ser = Serializer::new(writer, options);
    ser.write_header()?;
    ser.serialize_value(value)?;
    ser.write_opcode(STOP)
}

/// Encode the specified serializable object into a pickle stream.
pub fn to_writer<W: io::Write, T: Serialize>(writer: &mut W, value: &T, options: SerOptions)
                                             -> Result<()> {
    let mut ser = Serializer::new(writer, options);
    ser.write_header()?;
    value.serialize(&mut ser)?;
    ser.write_opcode(STOP)
}

/// Encode the value into a `Vec<u8>` buffer.
#[inline]
pub fn value_to_vec(value: &Value, options: SerOptions) -> Result<Vec<u8>> {
    let mut writer = Vec::with_capacity(128);
    value_to_writer(&mut writer, value, options)?;
    Ok(writer)
}

/// Encode the specified serializable object into a `Vec<u8>` buffer.
#[inline]
pub fn to_vec<T: Serialize>(value: &T, options: SerOptions) -> Result<Vec<u8>> {
    let mut writer = Vec::with_capacity(128);
    to_writer(&mut writer, value, options)?;
    Ok(writer)
}
