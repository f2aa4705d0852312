//! Python values, and conversion between them and the host-map key subset.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use num_bigint::BigInt;

use crate::pydict::PyDict;

/// A symbolic reference to a Python callable, e.g. `decimal.Decimal`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Class {
    pub module: String,
    pub name: String,
}

impl Class {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Class {
        Class { module: module.into(), name: name.into() }
    }
}

/// Represents all the Python objects that can come out of (or go into) a
/// pickle stream.
///
/// Dictionaries come in two flavors, selected by decoder options: `Dict` is
/// keyed with the host ordering of [`HashableValue`] (distinct types are
/// distinct keys), while `PyDict` mirrors Python's cross-type key equality.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// None
    None,
    /// Boolean
    Bool(bool),
    /// Normal-sized integer
    I64(i64),
    /// Big integer (Python 2 `long`; always used for LONG-opcode data)
    Int(BigInt),
    /// Float
    F64(f64),
    /// Unicode string
    String(String),
    /// Python 2 `str`: a byte string that bridges text and bytes
    ByteStr(Vec<u8>),
    /// Bytes object
    Bytes(Vec<u8>),
    /// Mutable bytearray
    ByteArray(Vec<u8>),
    /// Tuple
    Tuple(Box<[Value]>),
    /// List
    List(Vec<Value>),
    /// Dictionary with host key semantics
    Dict(BTreeMap<HashableValue, Value>),
    /// Dictionary with Python key semantics
    PyDict(PyDict),
    /// Symbolic reference to a Python callable
    Class(Class),
    /// Unapplied call `callable(*args)`
    Call {
        callable: Class,
        args: Box<[Value]>,
    },
    /// Persistent reference; payload is the persistent ID
    Ref(Box<Value>),
}

/// The subset of `Value` that can key a host-flavor dictionary.
///
/// Mutable containers (lists, dicts, bytearrays) and symbolic calls cannot;
/// offering one is a `NotHashable` error, not a panic.
#[derive(Clone, Debug)]
pub enum HashableValue {
    /// None
    None,
    /// Boolean
    Bool(bool),
    /// Normal-sized integer
    I64(i64),
    /// Big integer
    Int(BigInt),
    /// Float
    F64(f64),
    /// Unicode string
    String(String),
    /// Python 2 byte string
    ByteStr(Vec<u8>),
    /// Bytes object
    Bytes(Vec<u8>),
    /// Tuple
    Tuple(Box<[HashableValue]>),
    /// Class reference
    Class(Class),
}

impl Value {
    /// Convert to a host-map key, if the value is hashable.
    pub fn to_hashable(self) -> Option<HashableValue> {
        match self {
            Value::None => Some(HashableValue::None),
            Value::Bool(b) => Some(HashableValue::Bool(b)),
            Value::I64(i) => Some(HashableValue::I64(i)),
            Value::Int(i) => Some(HashableValue::Int(i)),
            Value::F64(f) => Some(HashableValue::F64(f)),
            Value::String(s) => Some(HashableValue::String(s)),
            Value::ByteStr(b) => Some(HashableValue::ByteStr(b)),
            Value::Bytes(b) => Some(HashableValue::Bytes(b)),
            Value::Tuple(v) => values_to_hashable(v).map(HashableValue::Tuple),
            Value::Class(c) => Some(HashableValue::Class(c)),
            _ => None,
        }
    }
}

impl HashableValue {
    /// Convert back into a general value.
    pub fn to_value(self) -> Value {
        match self {
            HashableValue::None => Value::None,
            HashableValue::Bool(b) => Value::Bool(b),
            HashableValue::I64(i) => Value::I64(i),
            HashableValue::Int(i) => Value::Int(i),
            HashableValue::F64(f) => Value::F64(f),
            HashableValue::String(s) => Value::String(s),
            HashableValue::ByteStr(b) => Value::ByteStr(b),
            HashableValue::Bytes(b) => Value::Bytes(b),
            HashableValue::Tuple(v) => Value::Tuple(hashable_to_values(v)),
            HashableValue::Class(c) => Value::Class(c),
        }
    }
}

fn values_to_hashable(values: Box<[Value]>) -> Option<Box<[HashableValue]>> {
    values.into_vec()
          .into_iter()
          .map(Value::to_hashable)
          .collect::<Option<Vec<_>>>()
          .map(Vec::into_boxed_slice)
}

fn hashable_to_values(values: Box<[HashableValue]>) -> Box<[Value]> {
    values.into_vec()
          .into_iter()
          .map(HashableValue::to_value)
          .collect::<Vec<_>>()
          .into_boxed_slice()
}

impl PartialEq for HashableValue {
    fn eq(&self, other: &HashableValue) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HashableValue {}

impl PartialOrd for HashableValue {
    fn partial_cmp(&self, other: &HashableValue) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Host-map keys order first by variant, then by value, so that values of
/// different types never collide (`1`, `1.0` and `True` are three keys).
impl Ord for HashableValue {
    fn cmp(&self, other: &HashableValue) -> Ordering {
        use self::HashableValue::*;
        match (self, other) {
            (None, None) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (I64(a), I64(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (F64(a), F64(b)) => float_ord(*a, *b),
            (String(a), String(b)) => a.cmp(b),
            (ByteStr(a), ByteStr(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Tuple(a), Tuple(b)) => a.cmp(b),
            (Class(a), Class(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl HashableValue {
    fn rank(&self) -> u8 {
        use self::HashableValue::*;
        match *self {
            None => 0,
            Bool(_) => 1,
            I64(_) => 2,
            Int(_) => 3,
            F64(_) => 4,
            String(_) => 5,
            ByteStr(_) => 6,
            Bytes(_) => 7,
            Tuple(_) => 8,
            Class(_) => 9,
        }
    }
}

/// A reasonable total ordering for floats.
fn float_ord(f: f64, g: f64) -> Ordering {
    match f.partial_cmp(&g) {
        Some(o) => o,
        None => Ordering::Less,
    }
}
