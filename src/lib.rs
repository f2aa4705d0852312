// Copyright (c) 2024-2026 The cornichon developers.  Licensed under the Apache
// License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Serialization and deserialization for Python's pickle format
//!
//! # Pickle format
//!
//! Please see the [Python docs](http://docs.python.org/library/pickle) for
//! details on the Pickle format.
//!
//! This crate supports all Pickle protocols (0 to 5) when reading, and
//! writing any of them, selected with [`SerOptions::protocol`].
//!
//! # Supported types
//!
//! Pickle is very powerful.  It is capable of serializing pretty arbitrary
//! graphs of Python objects, with most custom classes being serialized out
//! of the box.  This crate maps Python's built-in types to a [`Value`] sum:
//!
//! * None
//! * Boolean (Rust `bool`)
//! * Integers (Rust `i64` or bigints from num)
//! * Floats (Rust `f64`)
//! * Strings (Rust `String`), py2 byte strings and bytes objects (`Vec<u8>`)
//! * Bytearrays
//! * Lists and tuples
//! * Dictionaries, with either host or Python key semantics ([`PyDict`])
//!
//! Arbitrary Python classes and their instances are not executed: a module
//! global decodes to the symbolic [`Class`], and applying one via `REDUCE`
//! yields a symbolic `Value::Call`, except for the reduces Python itself
//! uses to spell bytes objects at old protocols, which are recognized and
//! mapped back to `Bytes`/`ByteArray`.  Decoding a pickle from an untrusted
//! source is therefore safe: no code runs, giant length prefixes don't
//! preallocate, and malformed input fails with an [`Error`] carrying the
//! stream position.
//!
//! Persistent references (`PERSID` family) decode to `Value::Ref`, and both
//! decoder and encoder accept hooks ([`DeOptions::persistent_load`],
//! [`SerOptions::persistent_ref`]) to resolve or produce them.
//!
//! Out-of-band buffers (protocol 5), the object-building opcodes (`BUILD`,
//! `INST`, `OBJ`, `NEWOBJ`), the extension registry and sets are not
//! supported and fail with an unknown-opcode error.
//!
//! # Exported API
//!
//! The library exports generic serde (de)serializing functions `to_*` and
//! `from_*`.  It also exports functions that produce or take only the
//! specific `Value` struct exposed by this library, which supports all
//! built-in Python types (notably long integers, classes and persistent
//! references, which serde's generic types don't handle).  These functions,
//! called `value_from_*` and `value_to_*`, will correctly (un)pickle these
//! types.

pub use crate::de::{
    from_iter, from_reader, from_slice, value_from_iter, value_from_reader, value_from_slice,
    DeOptions, Deserializer, PersistentLoad,
};

pub use crate::ser::{
    to_vec, to_writer, value_to_vec, value_to_writer, PersistentRef, SerOptions, Serializer,
};

pub use crate::error::{Error, ErrorCode, Result};

pub use crate::pydict::PyDict;

pub use crate::value::{Class, HashableValue, Value};

pub use crate::value_impls::{from_value, to_value};

mod codecs;
mod consts;
pub mod de;
pub mod error;
mod pydict;
pub mod ser;
pub mod value;
mod value_impls;

#[cfg(test)]
#[path = "../test/mod.rs"]
mod test;
