//! Pickle deserialization
//!
//! Note: Pickles are not a declarative format, but a program for a stack-based
//! VM.  Each value that is decoded is simply put on the stack, and some
//! operations pop items from the stack and construct new data with them.
//!
//! This means that we cannot decode pickles directly with the serde visitor,
//! since we don't know e.g. when a map starts.  Instead, we have to interpret
//! the pickle into an intermediate representation of Python objects (i.e.
//! `value::Value`) and can then deserialize this into other serde-supported
//! data types.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::str;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use num_bigint::{BigInt, Sign};
use serde::de::DeserializeOwned;

use crate::codecs;
use crate::consts::*;
use crate::error::{Error, ErrorCode, Result};
use crate::pydict::PyDict;
use crate::value::{Class, Value};
use crate::value_impls::from_value;

/// Preallocation ceiling for length-prefixed reads.  A stream advertising a
/// giant length must fail on the missing data, not on the allocation.
const MAX_PREALLOC: usize = 64 * 1024;

/// Hook resolving persistent references.  It receives the persistent ID;
/// `Ok(Some(v))` substitutes `v`, `Ok(None)` keeps the `Ref` in place, and
/// an error aborts decoding.
pub type PersistentLoad = Box<dyn Fn(&Value) -> Result<Option<Value>>>;

/// Options for deserializing.
#[derive(Default)]
pub struct DeOptions {
    persistent_load: Option<PersistentLoad>,
    py_dict: bool,
    strict_unicode: bool,
}

impl DeOptions {
    /// Construct with default options:
    ///
    /// - persistent references are kept as `Value::Ref`
    /// - dicts decode with host key semantics
    /// - py2 strs decode as `Value::String` (and must be UTF-8)
    pub fn new() -> Self {
        Default::default()
    }

    /// Decode `DICT`-family opcodes into [`PyDict`] with Python key equality.
    pub fn py_dict(mut self) -> Self {
        self.py_dict = true;
        self
    }

    /// Keep py2 strs (`STRING` family) as `Value::ByteStr` instead of
    /// decoding them to text.
    pub fn strict_unicode(mut self) -> Self {
        self.strict_unicode = true;
        self
    }

    /// Resolve persistent references through `load`.
    pub fn persistent_load<F>(mut self, load: F) -> Self
        where F: Fn(&Value) -> Result<Option<Value>> + 'static
    {
        self.persistent_load = Some(Box::new(load));
        self
    }
}

struct CharIter<Iter: Iterator<Item = io::Result<u8>>> {
    rdr: Iter,
    pos: usize,
}

impl<Iter: Iterator<Item = io::Result<u8>>> Iterator for CharIter<Iter> {
    type Item = io::Result<u8>;
    fn next(&mut self) -> Option<io::Result<u8>> {
        self.pos += 1;
        self.rdr.next()
    }
}

impl<Iter: Iterator<Item = io::Result<u8>>> CharIter<Iter> {
    fn new(rdr: Iter) -> CharIter<Iter> {
        CharIter { rdr, pos: 0 }
    }

    fn pos(&self) -> usize {
        self.pos
    }
}

/// One pickle stack slot.  The mark gets its own variant so that leaking it
/// into a result is a typed error at the pop site, not a sentinel check.
#[derive(Clone, Debug)]
enum Slot {
    Mark,
    Value(Value),
}

/// Decodes pickle streams into values.
pub struct Deserializer<Iter: Iterator<Item = io::Result<u8>>> {
    rdr: CharIter<Iter>,
    options: DeOptions,
    stack: Vec<Slot>,
    memo: HashMap<u32, Value>,
    protocol: u8,
}

impl<Iter> Deserializer<Iter>
    where Iter: Iterator<Item = io::Result<u8>>
{
    pub fn new(rdr: Iter, options: DeOptions) -> Deserializer<Iter> {
        Deserializer {
            rdr: CharIter::new(rdr),
            options,
            stack: Vec::with_capacity(128),
            memo: HashMap::new(),
            protocol: 0,
        }
    }

    /// Decode one top-level value, consuming the stream up to and including
    /// its `STOP` opcode.  Returns `None` when the stream is cleanly
    /// exhausted; end-of-input in the middle of a pickle is an error.
    pub fn decode_value(&mut self) -> Result<Option<Value>> {
        let mut mid_pickle = false;
        loop {
            let op = match self.rdr.next() {
                Some(Ok(byte)) => byte,
                Some(Err(err)) => return Err(Error::Io(err)),
                None if mid_pickle => return self.error(ErrorCode::EofWhileParsing),
                None => return Ok(None),
            };
            mid_pickle = true;

            match op {
                // Specials
                STOP => return self.pop().map(Some),
                POP => {
                    if self.stack.pop().is_none() {
                        return self.error(ErrorCode::StackUnderflow);
                    }
                }
                POP_MARK => {
                    self.pop_mark()?;
                }
                DUP => match self.stack.last() {
                    Some(top) => {
                        let top = top.clone();
                        self.stack.push(top);
                    }
                    None => return self.error(ErrorCode::StackUnderflow),
                },
                MARK => self.stack.push(Slot::Mark),
                PROTO => {
                    // The documentation says [2, 256), but CPython loads
                    // version 0 and 1 streams as well, and real-world
                    // pickles carry them.
                    let version = self.read_byte()?;
                    if version > 5 {
                        return self.error(ErrorCode::InvalidProtocol(version));
                    }
                    self.protocol = version;
                }
                FRAME => {
                    // Framing is only a read-ahead hint; gobble up the length.
                    self.read_bytes(8)?;
                }

                // Memo
                GET => {
                    let line = self.read_line()?;
                    let key = self.parse_memo_key(line)?;
                    self.push_memo(key)?;
                }
                BINGET => {
                    let key = self.read_byte()? as u32;
                    self.push_memo(key)?;
                }
                LONG_BINGET => {
                    let bytes = self.read_bytes(4)?;
                    self.push_memo(LittleEndian::read_u32(&bytes))?;
                }
                PUT => {
                    let line = self.read_line()?;
                    let key = self.parse_memo_key(line)?;
                    self.memoize(key)?;
                }
                BINPUT => {
                    let key = self.read_byte()? as u32;
                    self.memoize(key)?;
                }
                LONG_BINPUT => {
                    let bytes = self.read_bytes(4)?;
                    let key = LittleEndian::read_u32(&bytes);
                    self.memoize(key)?;
                }
                MEMOIZE => {
                    let key = self.memo.len() as u32;
                    self.memoize(key)?;
                }

                // Singletons
                NONE => self.push(Value::None),
                NEWFALSE => self.push(Value::Bool(false)),
                NEWTRUE => self.push(Value::Bool(true)),

                // ASCII-formatted numbers
                INT => {
                    let line = self.read_line()?;
                    // Protocol 0 way of spelling true/false
                    if line == b"00" {
                        self.push(Value::Bool(false));
                    } else if line == b"01" {
                        self.push(Value::Bool(true));
                    } else {
                        match str::from_utf8(&line).unwrap_or("").parse::<i64>() {
                            Ok(i) => self.push(Value::I64(i)),
                            // py2 emits out-of-range ints on this opcode too
                            Err(_) => match BigInt::parse_bytes(&line, 10) {
                                Some(i) => self.push(Value::Int(i)),
                                None => return self.error(ErrorCode::InvalidLiteral(line)),
                            },
                        }
                    }
                }
                LONG => {
                    let mut line = self.read_line()?;
                    if line.last() != Some(&b'L') {
                        return self.error(ErrorCode::InvalidLong);
                    }
                    line.pop();
                    match BigInt::parse_bytes(&line, 10) {
                        Some(i) => self.push(Value::Int(i)),
                        None => return self.error(ErrorCode::InvalidLong),
                    }
                }
                FLOAT => {
                    let line = self.read_line()?;
                    match str::from_utf8(&line).unwrap_or("").parse::<f64>() {
                        Ok(f) => self.push(Value::F64(f)),
                        Err(_) => return self.error(ErrorCode::InvalidLiteral(line)),
                    }
                }

                // Binary-coded numbers
                BINFLOAT => {
                    let bytes = self.read_bytes(8)?;
                    self.push(Value::F64(BigEndian::read_f64(&bytes)));
                }
                BININT => {
                    let bytes = self.read_bytes(4)?;
                    self.push(Value::I64(LittleEndian::read_i32(&bytes) as i64));
                }
                BININT1 => {
                    let byte = self.read_byte()?;
                    self.push(Value::I64(byte as i64));
                }
                BININT2 => {
                    let bytes = self.read_bytes(2)?;
                    self.push(Value::I64(LittleEndian::read_u16(&bytes) as i64));
                }

                // Length-prefixed longs
                LONG1 => {
                    let bytes = self.read_u8_prefixed_bytes()?;
                    let long = decode_long(&bytes);
                    self.push(long);
                }
                LONG4 => {
                    let bytes = self.read_i32_prefixed_bytes()?;
                    let long = decode_long(&bytes);
                    self.push(long);
                }

                // Strings
                STRING => {
                    let line = self.read_line()?;
                    if line.len() < 2 || line[0] != line[line.len() - 1]
                        || !(line[0] == b'"' || line[0] == b'\'')
                    {
                        return self.error(ErrorCode::InvalidString);
                    }
                    let bytes = match codecs::decode_string_escape(&line[1..line.len() - 1]) {
                        Ok(bytes) => bytes,
                        Err(code) => return self.error(code),
                    };
                    let string = self.decode_string(bytes)?;
                    self.push(string);
                }
                BINSTRING => {
                    let bytes = self.read_i32_prefixed_bytes()?;
                    let string = self.decode_string(bytes)?;
                    self.push(string);
                }
                SHORT_BINSTRING => {
                    let bytes = self.read_u8_prefixed_bytes()?;
                    let string = self.decode_string(bytes)?;
                    self.push(string);
                }
                UNICODE => {
                    let line = self.read_line()?;
                    match codecs::decode_raw_unicode_escape(&line) {
                        Ok(string) => self.push(Value::String(string)),
                        Err(code) => return self.error(code),
                    }
                }
                BINUNICODE => {
                    let bytes = self.read_u32_prefixed_bytes()?;
                    let string = self.decode_unicode(bytes)?;
                    self.push(string);
                }
                SHORT_BINUNICODE => {
                    let bytes = self.read_u8_prefixed_bytes()?;
                    let string = self.decode_unicode(bytes)?;
                    self.push(string);
                }
                BINUNICODE8 => {
                    let bytes = self.read_u64_prefixed_bytes()?;
                    let string = self.decode_unicode(bytes)?;
                    self.push(string);
                }

                // Bytes
                SHORT_BINBYTES => {
                    let bytes = self.read_u8_prefixed_bytes()?;
                    self.push(Value::Bytes(bytes));
                }
                BINBYTES => {
                    let bytes = self.read_u32_prefixed_bytes()?;
                    self.push(Value::Bytes(bytes));
                }
                BINBYTES8 => {
                    let bytes = self.read_u64_prefixed_bytes()?;
                    self.push(Value::Bytes(bytes));
                }
                BYTEARRAY8 => {
                    let bytes = self.read_u64_prefixed_bytes()?;
                    self.push(Value::ByteArray(bytes));
                }

                // Containers
                EMPTY_TUPLE => self.push(Value::Tuple(Box::new([]))),
                TUPLE1 => {
                    let item = self.pop()?;
                    self.push(Value::Tuple(Box::new([item])));
                }
                TUPLE2 => {
                    let item2 = self.pop()?;
                    let item1 = self.pop()?;
                    self.push(Value::Tuple(Box::new([item1, item2])));
                }
                TUPLE3 => {
                    let item3 = self.pop()?;
                    let item2 = self.pop()?;
                    let item1 = self.pop()?;
                    self.push(Value::Tuple(Box::new([item1, item2, item3])));
                }
                TUPLE => {
                    let items = self.pop_mark()?;
                    self.push(Value::Tuple(items.into_boxed_slice()));
                }
                EMPTY_LIST => self.push(Value::List(vec![])),
                LIST => {
                    let items = self.pop_mark()?;
                    self.push(Value::List(items));
                }
                APPEND => {
                    let pos = self.rdr.pos();
                    let value = self.pop()?;
                    match self.top()? {
                        Value::List(list) => list.push(value),
                        other => {
                            let kind = kind_of(other);
                            return Err(Error::Eval(
                                ErrorCode::InvalidStackTop("list", kind.into()), pos));
                        }
                    }
                }
                APPENDS => {
                    let pos = self.rdr.pos();
                    let items = self.pop_mark()?;
                    match self.top()? {
                        Value::List(list) => list.extend(items),
                        other => {
                            let kind = kind_of(other);
                            return Err(Error::Eval(
                                ErrorCode::InvalidStackTop("list", kind.into()), pos));
                        }
                    }
                }
                EMPTY_DICT => {
                    let dict = self.new_dict();
                    self.push(dict);
                }
                DICT => {
                    let pos = self.rdr.pos();
                    let items = self.pop_mark()?;
                    let mut dict = self.new_dict();
                    set_items(&mut dict, items, pos)?;
                    self.push(dict);
                }
                SETITEM => {
                    let pos = self.rdr.pos();
                    let value = self.pop()?;
                    let key = self.pop()?;
                    let top = self.top()?;
                    set_item(top, key, value, pos)?;
                }
                SETITEMS => {
                    let pos = self.rdr.pos();
                    let items = self.pop_mark()?;
                    let top = self.top()?;
                    set_items(top, items, pos)?;
                }

                // Globals, calls and persistent references
                GLOBAL => {
                    let module = self.read_text_line()?;
                    let name = self.read_text_line()?;
                    self.push(Value::Class(Class { module, name }));
                }
                STACK_GLOBAL => {
                    let name = self.pop_text()?;
                    let module = self.pop_text()?;
                    self.push(Value::Class(Class { module, name }));
                }
                REDUCE => {
                    let pos = self.rdr.pos();
                    let args = match self.pop()? {
                        Value::Tuple(args) => args,
                        other => return Err(Error::Eval(
                            ErrorCode::InvalidStackTop("tuple", kind_of(&other).into()), pos)),
                    };
                    let callable = match self.pop()? {
                        Value::Class(class) => class,
                        other => return Err(Error::Eval(
                            ErrorCode::InvalidStackTop("class", kind_of(&other).into()), pos)),
                    };
                    let value = self.reduce(callable, args, pos)?;
                    self.push(value);
                }
                PERSID => {
                    let pid = self.read_text_line()?;
                    self.handle_ref(Value::String(pid))?;
                }
                BINPERSID => {
                    let pid = self.pop()?;
                    self.handle_ref(pid)?;
                }

                // Object building would need host type resolution, which we
                // never perform; sets, the extension registry and
                // out-of-band buffers are likewise not supported.  All of
                // them fail the same way unknown opcodes do, so callers see
                // the position of the offender.
                BUILD | INST | OBJ | NEWOBJ | NEWOBJ_EX |
                EXT1 | EXT2 | EXT4 |
                EMPTY_SET | ADDITEMS | FROZENSET |
                NEXT_BUFFER | READONLY_BUFFER =>
                    return self.error(ErrorCode::UnknownOpcode(op)),

                _ => return self.error(ErrorCode::UnknownOpcode(op)),
            }
        }
    }

    /// The protocol version the stream last declared with `PROTO`, or 0.
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    /// Assert that the whole stream has been consumed.
    pub fn end(&mut self) -> Result<()> {
        match self.rdr.next() {
            Some(Err(err)) => Err(Error::Io(err)),
            Some(Ok(_)) => self.error(ErrorCode::TrailingBytes),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn memo(&self) -> &HashMap<u32, Value> {
        &self.memo
    }

    fn push(&mut self, value: Value) {
        self.stack.push(Slot::Value(value));
    }

    fn pop(&mut self) -> Result<Value> {
        match self.stack.pop() {
            Some(Slot::Value(v)) => Ok(v),
            Some(Slot::Mark) => self.error(ErrorCode::MarkEscape),
            None => self.error(ErrorCode::StackUnderflow),
        }
    }

    fn top(&mut self) -> Result<&mut Value> {
        let pos = self.rdr.pos();
        match self.stack.last_mut() {
            Some(Slot::Value(v)) => Ok(v),
            Some(Slot::Mark) => Err(Error::Eval(ErrorCode::MarkEscape, pos)),
            None => Err(Error::Eval(ErrorCode::StackUnderflow, pos)),
        }
    }

    /// Pop everything above the topmost mark, and the mark itself.
    fn pop_mark(&mut self) -> Result<Vec<Value>> {
        let mark = self.stack.iter()
                             .rposition(|slot| matches!(slot, Slot::Mark));
        match mark {
            Some(k) => {
                // the scan stopped at the topmost mark, so everything above
                // it is a value
                let mut items = Vec::with_capacity(self.stack.len() - k - 1);
                for slot in self.stack.split_off(k + 1) {
                    match slot {
                        Slot::Value(v) => items.push(v),
                        Slot::Mark => return self.error(ErrorCode::MarkEscape),
                    }
                }
                self.stack.pop();
                Ok(items)
            }
            None => self.error(ErrorCode::NoMarker),
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        match self.rdr.next() {
            Some(Ok(byte)) => Ok(byte),
            Some(Err(err)) => Err(Error::Io(err)),
            None => self.error(ErrorCode::EofWhileParsing),
        }
    }

    /// Read until `\n` exclusive.  Only `\n` terminates a line; a carriage
    /// return is an ordinary value byte.
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(16);
        loop {
            match self.read_byte()? {
                b'\n' => return Ok(result),
                byte => result.push(byte),
            }
        }
    }

    fn read_text_line(&mut self) -> Result<String> {
        let line = self.read_line()?;
        String::from_utf8(line).or_else(|_| self.error(ErrorCode::StringNotUtf8))
    }

    fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity((n as usize).min(MAX_PREALLOC));
        for _ in 0..n {
            buf.push(self.read_byte()?);
        }
        Ok(buf)
    }

    fn read_u8_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let lenbyte = self.read_byte()?;
        self.read_bytes(lenbyte as u64)
    }

    fn read_i32_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let lenbytes = self.read_bytes(4)?;
        match LittleEndian::read_i32(&lenbytes) {
            0 => Ok(vec![]),
            l if l < 0 => self.error(ErrorCode::NegativeLength),
            l => self.read_bytes(l as u64),
        }
    }

    fn read_u32_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let lenbytes = self.read_bytes(4)?;
        self.read_bytes(LittleEndian::read_u32(&lenbytes) as u64)
    }

    fn read_u64_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let lenbytes = self.read_bytes(8)?;
        self.read_bytes(LittleEndian::read_u64(&lenbytes))
    }

    fn parse_memo_key(&self, line: Vec<u8>) -> Result<u32> {
        match str::from_utf8(&line).unwrap_or("").parse::<u32>() {
            Ok(key) => Ok(key),
            Err(_) => self.error(ErrorCode::InvalidLiteral(line)),
        }
    }

    fn push_memo(&mut self, key: u32) -> Result<()> {
        match self.memo.get(&key) {
            Some(value) => {
                let value = value.clone();
                self.push(value);
                Ok(())
            }
            None => self.error(ErrorCode::MissingMemo(key)),
        }
    }

    fn memoize(&mut self, key: u32) -> Result<()> {
        let value = match self.stack.last() {
            Some(Slot::Value(v)) => v.clone(),
            Some(Slot::Mark) => return self.error(ErrorCode::MarkEscape),
            None => return self.error(ErrorCode::StackUnderflow),
        };
        self.memo.insert(key, value);
        Ok(())
    }

    /// Natural-str data: a py2 str in strict-unicode mode, text otherwise.
    fn decode_string(&self, bytes: Vec<u8>) -> Result<Value> {
        if self.options.strict_unicode {
            Ok(Value::ByteStr(bytes))
        } else {
            self.decode_unicode(bytes)
        }
    }

    fn decode_unicode(&self, bytes: Vec<u8>) -> Result<Value> {
        match String::from_utf8(bytes) {
            Ok(string) => Ok(Value::String(string)),
            Err(_) => self.error(ErrorCode::StringNotUtf8),
        }
    }

    fn new_dict(&self) -> Value {
        if self.options.py_dict {
            Value::PyDict(PyDict::new())
        } else {
            Value::Dict(BTreeMap::new())
        }
    }

    fn pop_text(&mut self) -> Result<String> {
        let pos = self.rdr.pos();
        match self.pop()? {
            Value::String(s) => Ok(s),
            Value::ByteStr(b) => String::from_utf8(b)
                .map_err(|_| Error::Eval(ErrorCode::StringNotUtf8, pos)),
            other => Err(Error::Eval(
                ErrorCode::InvalidStackTop("string", kind_of(&other).into()), pos)),
        }
    }

    /// Map the reduces Python itself emits for bytes-ish objects back to
    /// native values; anything unrecognized stays a symbolic `Call`.
    fn reduce(&mut self, callable: Class, args: Box<[Value]>, pos: usize) -> Result<Value> {
        if callable.module == "_codecs" && callable.name == "encode" {
            if let [text, encoding] = &args[..] {
                if is_latin1_name(encoding) {
                    let text = match as_text(text) {
                        Some(text) => text,
                        None => return Err(Error::Eval(
                            ErrorCode::InvalidStackTop("string", kind_of(text).into()), pos)),
                    };
                    return match codecs::latin1_encode(text) {
                        Some(bytes) => Ok(Value::Bytes(bytes)),
                        // no fallback here: a non-latin1 payload means the
                        // pickle is corrupt
                        None => Err(Error::Eval(
                            ErrorCode::InvalidStackTop(
                                "latin-1 text", "wide characters".into()), pos)),
                    };
                }
            }
        } else if callable.name == "bytearray"
            && (callable.module == "builtins" || callable.module == "__builtin__")
        {
            match &args[..] {
                [Value::Bytes(bytes)] => return Ok(Value::ByteArray(bytes.clone())),
                [text, encoding] if is_latin1_name(encoding) => {
                    if let Some(text) = as_text(text) {
                        if let Some(bytes) = codecs::latin1_encode(text) {
                            return Ok(Value::ByteArray(bytes));
                        }
                        return Err(Error::Eval(
                            ErrorCode::InvalidStackTop(
                                "latin-1 text", "wide characters".into()), pos));
                    }
                }
                _ => {}
            }
        }
        Ok(Value::Call { callable, args })
    }

    fn handle_ref(&mut self, pid: Value) -> Result<()> {
        let resolved = match &self.options.persistent_load {
            Some(load) => load(&pid)?,
            None => None,
        };
        match resolved {
            Some(value) => self.push(value),
            None => self.push(Value::Ref(Box::new(pid))),
        }
        Ok(())
    }

    fn error<T>(&self, reason: ErrorCode) -> Result<T> {
        Err(Error::Eval(reason, self.rdr.pos()))
    }
}

fn as_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::ByteStr(b) => str::from_utf8(b).ok(),
        _ => None,
    }
}

fn is_latin1_name(value: &Value) -> bool {
    matches!(as_text(value), Some("latin1") | Some("latin-1"))
}

fn set_item(dict: &mut Value, key: Value, value: Value, pos: usize) -> Result<()> {
    match dict {
        Value::Dict(map) => match key.to_hashable() {
            Some(key) => {
                map.insert(key, value);
                Ok(())
            }
            None => Err(Error::Eval(ErrorCode::NotHashable, pos)),
        },
        Value::PyDict(dict) => dict.set(key, value)
                                   .map_err(|code| Error::Eval(code, pos)),
        other => Err(Error::Eval(
            ErrorCode::InvalidStackTop("dict", kind_of(other).into()), pos)),
    }
}

fn set_items(dict: &mut Value, items: Vec<Value>, pos: usize) -> Result<()> {
    if items.len() % 2 != 0 {
        return Err(Error::Eval(
            ErrorCode::InvalidStackTop("key-value pairs", "odd number of items".into()),
            pos));
    }
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        set_item(dict, key, value, pos)?;
    }
    Ok(())
}

/// Two's-complement little-endian bytes to big integer, the CPython
/// `pickletools` way.
fn decode_long(bytes: &[u8]) -> Value {
    // BigInt::from_bytes_le doesn't like a sign bit in the bytes, therefore
    // we have to extract that ourselves and do the two's complement.
    let negative = !bytes.is_empty() && (bytes[bytes.len() - 1] & 0x80 != 0);
    let mut val = BigInt::from_bytes_le(Sign::Plus, bytes);
    if negative {
        val -= BigInt::from(1) << (bytes.len() * 8);
    }
    Value::Int(val)
}

fn kind_of(value: &Value) -> &'static str {
    match *value {
        Value::None => "None",
        Value::Bool(_) => "bool",
        Value::I64(_) | Value::Int(_) => "int",
        Value::F64(_) => "float",
        Value::String(_) => "string",
        Value::ByteStr(_) => "bytestring",
        Value::Bytes(_) => "bytes",
        Value::ByteArray(_) => "bytearray",
        Value::Tuple(_) => "tuple",
        Value::List(_) => "list",
        Value::Dict(_) | Value::PyDict(_) => "dict",
        Value::Class(_) => "class",
        Value::Call { .. } => "call",
        Value::Ref(_) => "ref",
    }
}

/// Decodes a value directly from an iterator.
pub fn value_from_iter<I>(iter: I, options: DeOptions) -> Result<Value>
    where I: Iterator<Item = io::Result<u8>>
{
    let mut de = Deserializer::new(iter, options);
    let value = match de.decode_value()? {
        Some(value) => value,
        None => return Err(Error::Eval(ErrorCode::EofWhileParsing, 0)),
    };
    // Make sure the whole stream has been consumed.
    de.end()?;
    Ok(value)
}

/// Decodes a value from a `std::io::Read`.
pub fn value_from_reader<R: io::Read>(rdr: R, options: DeOptions) -> Result<Value> {
    value_from_iter(rdr.bytes(), options)
}

/// Decodes a value from a byte slice.
pub fn value_from_slice(v: &[u8], options: DeOptions) -> Result<Value> {
    value_from_iter(v.iter().map(|byte| Ok(*byte)), options)
}

/// Decodes a deserializable object directly from an iterator.
pub fn from_iter<I, T>(iter: I, options: DeOptions) -> Result<T>
    where I: Iterator<Item = io::Result<u8>>,
          T: DeserializeOwned
{
    from_value(value_from_iter(iter, options)?)
}

/// Decodes a deserializable object from a `std::io::Read`.
pub fn from_reader<R: io::Read, T: DeserializeOwned>(rdr: R, options: DeOptions) -> Result<T> {
    from_value(value_from_reader(rdr, options)?)
}

/// Decodes a deserializable object from a byte slice.
pub fn from_slice<T: DeserializeOwned>(v: &[u8], options: DeOptions) -> Result<T> {
    from_value(value_from_slice(v, options)?)
}
