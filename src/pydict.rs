//! A dictionary with Python's key semantics.
//!
//! Python considers `1`, `1.0`, `True` and `1L` to be the same dict key, and
//! py2 `str` (our `ByteStr`) compares equal to both unicode strings and
//! bytes of the same octets, while unicode and bytes never compare equal to
//! each other.  That last bridge makes equality non-transitive, which a
//! plain map cannot express: [`PyDict::set`] therefore purges every equal
//! key first, and [`PyDict::del`] keeps deleting until no equal key remains.

use std::collections::HashMap;
use std::collections::hash_map;
use std::hash::{Hash, Hasher};

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::error::ErrorCode;
use crate::value::Value;

/// Key wrapper giving the map Python's equality and hash.
#[derive(Clone, Debug)]
struct PyKey(Value);

impl PartialEq for PyKey {
    fn eq(&self, other: &PyKey) -> bool {
        py_equal(&self.0, &other.0)
    }
}

// Non-transitive across the ByteStr bridge; every lookup that can span the
// bridge goes through the looping delete below.
impl Eq for PyKey {}

impl Hash for PyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        py_hash(&self.0, state)
    }
}

/// Dict with Python key equality, produced by decoding in py-dict mode.
#[derive(Clone, Debug, Default)]
pub struct PyDict {
    map: HashMap<PyKey, Value>,
}

impl PyDict {
    /// Returns a new empty dictionary.
    pub fn new() -> PyDict {
        PyDict { map: HashMap::new() }
    }

    /// Returns a new empty dictionary with preallocated space.
    pub fn with_capacity(n: usize) -> PyDict {
        PyDict { map: HashMap::with_capacity(n) }
    }

    /// Returns a dictionary preset with the given pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<PyDict, ErrorCode>
        where I: IntoIterator<Item = (Value, Value)>
    {
        let mut dict = PyDict::new();
        for (key, value) in pairs {
            dict.set(key, value)?;
        }
        Ok(dict)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up the value stored under any key equal to `key`.
    ///
    /// Unhashable queries find nothing.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        if !is_hashable(key) {
            return None;
        }
        self.map.get(&PyKey(key.clone()))
    }

    /// Associates `key` with `value`, removing all equal keys first (a
    /// `ByteStr` key evicts equal `String` and `Bytes` spellings).
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), ErrorCode> {
        if !is_hashable(&key) {
            return Err(ErrorCode::NotHashable);
        }
        self.del(&key);
        self.map.insert(PyKey(key), value);
        Ok(())
    }

    /// Removes every key equal to `key`.  Bridged spellings can be several
    /// distinct entries, so deletion loops until the lookup comes up empty.
    pub fn del(&mut self, key: &Value) {
        if !is_hashable(key) {
            return;
        }
        let probe = PyKey(key.clone());
        while self.map.remove(&probe).is_some() {}
    }

    /// Iterates over entries in arbitrary order.
    pub fn iter(&self) -> Iter {
        Iter { inner: self.map.iter() }
    }
}

pub struct Iter<'a> {
    inner: hash_map::Iter<'a, PyKey, Value>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Value, &'a Value);
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&k.0, v))
    }
}

impl<'a> IntoIterator for &'a PyDict {
    type Item = (&'a Value, &'a Value);
    type IntoIter = Iter<'a>;
    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Dict equality is size plus lookup in both directions; one direction is
/// not enough once the ByteStr bridge lets distinct entries answer the same
/// query.
impl PartialEq for PyDict {
    fn eq(&self, other: &PyDict) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|(k, v)| other.get(k).map_or(false, |w| py_equal(v, w)))
            && other.iter().all(|(k, v)| self.get(k).map_or(false, |w| py_equal(v, w)))
    }
}

/// Whether a value may be used as a `PyDict` key.
///
/// Mutable containers are not (list, dict, bytearray), same as Python.
pub fn is_hashable(v: &Value) -> bool {
    match *v {
        Value::None | Value::Bool(_) | Value::I64(_) | Value::Int(_) |
        Value::F64(_) | Value::String(_) | Value::ByteStr(_) |
        Value::Bytes(_) | Value::Class(_) => true,
        Value::Tuple(ref items) => items.iter().all(is_hashable),
        Value::Call { ref args, .. } => args.iter().all(is_hashable),
        Value::Ref(ref pid) => is_hashable(pid),
        Value::ByteArray(_) | Value::List(_) | Value::Dict(_) | Value::PyDict(_) => false,
    }
}

/// Numeric view used for cross-type comparison.
enum Num<'a> {
    Int(i64),
    Big(&'a BigInt),
    Float(f64),
}

fn as_num(v: &Value) -> Option<Num> {
    match *v {
        Value::Bool(b) => Some(Num::Int(b as i64)),
        Value::I64(i) => Some(Num::Int(i)),
        Value::Int(ref b) => Some(Num::Big(b)),
        Value::F64(f) => Some(Num::Float(f)),
        _ => None,
    }
}

fn num_equal(a: Num, b: Num) -> bool {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => x == y,
        (Num::Int(x), Num::Big(y)) | (Num::Big(y), Num::Int(x)) => y.to_i64() == Some(x),
        (Num::Int(x), Num::Float(y)) | (Num::Float(y), Num::Int(x)) => x as f64 == y,
        (Num::Big(x), Num::Big(y)) => x == y,
        (Num::Big(x), Num::Float(y)) | (Num::Float(y), Num::Big(x)) =>
            bigint_exact_f64(x) == Some(y),
        (Num::Float(x), Num::Float(y)) => x == y,
    }
}

/// The float image of a big int, only when the conversion is exact.
fn bigint_exact_f64(b: &BigInt) -> Option<f64> {
    let f = b.to_f64()?;
    if f.is_finite() && BigInt::from_f64(f).as_ref() == Some(b) {
        Some(f)
    } else {
        None
    }
}

fn as_seq(v: &Value) -> Option<&[Value]> {
    match *v {
        Value::Tuple(ref t) => Some(t),
        Value::List(ref l) => Some(l),
        _ => None,
    }
}

/// Equality matching what Python returns for `a == b`.
///
/// Extends host `==`, is reflexive and symmetric, and is transitive
/// everywhere except across the `ByteStr` bridge.
pub fn py_equal(a: &Value, b: &Value) -> bool {
    use crate::value::Value::*;

    // strings/bytes: ByteStr bridges both neighbours, String and Bytes
    // never meet
    match (a, b) {
        (String(x), String(y)) => return x == y,
        (ByteStr(x), ByteStr(y)) | (Bytes(x), Bytes(y)) => return x == y,
        (String(x), ByteStr(y)) | (ByteStr(y), String(x)) => return x.as_bytes() == &y[..],
        (ByteStr(x), Bytes(y)) | (Bytes(y), ByteStr(x)) => return x == y,
        (String(_), _) | (_, String(_)) |
        (ByteStr(_), _) | (_, ByteStr(_)) |
        (Bytes(_), _) | (_, Bytes(_)) => return false,
        _ => {}
    }

    if let (Some(x), Some(y)) = (as_num(a), as_num(b)) {
        return num_equal(x, y);
    }

    if let (Some(x), Some(y)) = (as_seq(a), as_seq(b)) {
        return x.len() == y.len() && x.iter().zip(y).all(|(u, v)| py_equal(u, v));
    }

    match (a, b) {
        (None, None) => true,
        (ByteArray(x), ByteArray(y)) => x == y,
        (Class(x), Class(y)) => x == y,
        (Call { callable: xc, args: xa }, Call { callable: yc, args: ya }) => {
            xc == yc && xa.len() == ya.len()
                && xa.iter().zip(ya.iter()).all(|(u, v)| py_equal(u, v))
        }
        (Ref(x), Ref(y)) => py_equal(x, y),
        (Dict(x), Dict(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map_or(false, |w| py_equal(v, w)))
                && y.iter().all(|(k, v)| x.get(k).map_or(false, |w| py_equal(v, w)))
        }
        (PyDict(x), PyDict(y)) => x == y,
        (Dict(x), PyDict(y)) | (PyDict(y), Dict(x)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.get(&k.clone().to_value()).map_or(false, |w| py_equal(v, w))
                })
                && y.iter().all(|(k, v)| {
                    k.clone().to_hashable()
                     .and_then(|k| x.get(&k))
                     .map_or(false, |w| py_equal(v, w))
                })
        }
        _ => false,
    }
}

// Hash domain tags.  Equal values must produce identical write sequences;
// unequal collisions are harmless.
const TAG_STR: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT_BITS: u8 = 3;
const TAG_BIGINT: u8 = 4;
const TAG_NONE: u8 = 5;

fn hash_str<H: Hasher>(octets: &[u8], state: &mut H) {
    state.write_u8(TAG_STR);
    state.write_u64(octets.len() as u64);
    state.write(octets);
}

fn hash_int<H: Hasher>(i: i64, state: &mut H) {
    state.write_u8(TAG_INT);
    state.write_u64(i as u64);
}

fn hash_uint<H: Hasher>(u: u64, state: &mut H) {
    state.write_u8(TAG_INT);
    state.write_u64(u);
}

// Integer-valued floats hash as the integer they equal; everything else by
// raw bits.
fn hash_float<H: Hasher>(f: f64, state: &mut H) {
    if f.is_finite() && f.fract() == 0.0 {
        if f >= i64::MIN as f64 && f < i64::MAX as f64 {
            return hash_int(f as i64, state);
        }
        if f >= 0.0 && f < u64::MAX as f64 {
            return hash_uint(f as u64, state);
        }
    }
    state.write_u8(TAG_FLOAT_BITS);
    state.write_u64(f.to_bits());
}

/// Hash consistent with [`py_equal`]: `py_equal(a, b)` implies equal
/// hashes.  Must only be called on hashable values.
pub fn py_hash<H: Hasher>(v: &Value, state: &mut H) {
    match *v {
        Value::None => state.write_u8(TAG_NONE),
        Value::Bool(b) => hash_int(b as i64, state),
        Value::I64(i) => hash_int(i, state),
        Value::F64(f) => hash_float(f, state),
        Value::Int(ref b) => {
            if let Some(i) = b.to_i64() {
                hash_int(i, state);
            } else if let Some(u) = b.to_u64() {
                hash_uint(u, state);
            } else if let Some(f) = bigint_exact_f64(b) {
                hash_float(f, state);
            } else {
                state.write_u8(TAG_BIGINT);
                let (sign, bytes) = b.to_bytes_be();
                state.write_u8(sign as u8);
                state.write(&bytes);
            }
        }
        Value::String(ref s) => hash_str(s.as_bytes(), state),
        Value::ByteStr(ref b) | Value::Bytes(ref b) => hash_str(b, state),
        Value::Tuple(ref items) => {
            state.write(b"tuple");
            state.write_u64(items.len() as u64);
            for item in items.iter() {
                py_hash(item, state);
            }
        }
        Value::Class(ref c) => {
            state.write(b"class");
            hash_str(c.module.as_bytes(), state);
            hash_str(c.name.as_bytes(), state);
        }
        Value::Call { ref callable, ref args } => {
            state.write(b"call");
            hash_str(callable.module.as_bytes(), state);
            hash_str(callable.name.as_bytes(), state);
            state.write_u64(args.len() as u64);
            for arg in args.iter() {
                py_hash(arg, state);
            }
        }
        Value::Ref(ref pid) => {
            state.write(b"ref");
            py_hash(pid, state);
        }
        // is_hashable gates these off before any hashing happens
        Value::ByteArray(_) | Value::List(_) | Value::Dict(_) | Value::PyDict(_) => {
            state.write_u8(0);
        }
    }
}
