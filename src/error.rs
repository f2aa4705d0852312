// Copyright (c) 2024-2026 The cornichon developers.  Licensed under the Apache
// License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Error objects and codes

use std::error;
use std::fmt;
use std::io;
use std::result;

use serde::{de, ser};

/// All the reasons a pickle stream can fail to decode, or a value fail to
/// encode.
#[derive(Clone, PartialEq, Debug)]
pub enum ErrorCode {
    /// Opcode is unknown, or known but deliberately not implemented
    /// (BUILD family, EXT registry, sets, out-of-band buffers)
    UnknownOpcode(u8),
    /// EOF while an opcode was mid-decode
    EofWhileParsing,
    /// Stack underflowed
    StackUnderflow,
    /// Opcode needed a mark that is not on the stack
    NoMarker,
    /// A mark object would have been returned or stored as a value
    MarkEscape,
    /// GET-family opcode named an absent memo key
    MissingMemo(u32),
    /// Wrong stack top (or operand) type for opcode
    InvalidStackTop(&'static str, String),
    /// PROTO argument (or encoder protocol) outside [0, 5]
    InvalidProtocol(u8),
    /// LONG decimal parse failed or trailing 'L' missing
    InvalidLong,
    /// STRING line too short or missing its matching quote
    InvalidString,
    /// Malformed decimal/escape literal
    InvalidLiteral(Vec<u8>),
    /// Length prefix found negative
    NegativeLength,
    /// Text opcode data is not UTF-8
    StringNotUtf8,
    /// Value not usable as a dict key
    NotHashable,
    /// Trailing bytes after the STOP opcode
    TrailingBytes,
    /// Encoder was given a value it cannot serialize
    UnsupportedType(&'static str),
    /// Protocol 0 persistent ID must be newline-free text
    Proto0PersIdLineOnly,
    /// Protocol 0 unicode must be UTF-8
    Proto0UnicodeUtf8Only,
    /// Protocols 0-3 global module/name must be newline-free
    GlobalNewline,
    /// Structure error raised through the serde traits
    Structure(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ErrorCode::UnknownOpcode(op) =>
                write!(fmt, "unknown opcode {} ({:?})", op, op as char),
            ErrorCode::EofWhileParsing => write!(fmt, "unexpected end of input"),
            ErrorCode::StackUnderflow => write!(fmt, "pickle stack underflow"),
            ErrorCode::NoMarker => write!(fmt, "no marker in stack"),
            ErrorCode::MarkEscape => write!(fmt, "mark object escapes the stack"),
            ErrorCode::MissingMemo(key) => write!(fmt, "memo key error {}", key),
            ErrorCode::InvalidStackTop(what, ref it) =>
                write!(fmt, "invalid stack top, expected {}, got {}", what, it),
            ErrorCode::InvalidProtocol(v) => write!(fmt, "invalid pickle version {}", v),
            ErrorCode::InvalidLong => write!(fmt, "invalid long literal"),
            ErrorCode::InvalidString => write!(fmt, "invalid string delimiters"),
            ErrorCode::InvalidLiteral(ref l) =>
                write!(fmt, "literal is invalid: {}", String::from_utf8_lossy(l)),
            ErrorCode::NegativeLength => write!(fmt, "negative length prefix"),
            ErrorCode::StringNotUtf8 => write!(fmt, "string is not UTF-8 encoded"),
            ErrorCode::NotHashable => write!(fmt, "dict key not hashable"),
            ErrorCode::TrailingBytes => write!(fmt, "trailing bytes found"),
            ErrorCode::UnsupportedType(ty) => write!(fmt, "no support for type '{}'", ty),
            ErrorCode::Proto0PersIdLineOnly =>
                write!(fmt, "protocol 0: persistent ID must be newline-free text"),
            ErrorCode::Proto0UnicodeUtf8Only =>
                write!(fmt, "protocol 0: unicode must be UTF-8"),
            ErrorCode::GlobalNewline =>
                write!(fmt, "protocol 0-3: global module and name must be newline-free"),
            ErrorCode::Structure(ref s) => fmt.write_str(s),
        }
    }
}

/// This type represents all possible errors that can occur when serializing
/// or deserializing a value.
#[derive(Debug)]
pub enum Error {
    /// Some IO error occurred when serializing or deserializing a value.
    Io(io::Error),
    /// The pickle had some error while interpreting.
    Eval(ErrorCode, usize),
    /// Syntax error while transforming into Rust values.
    Syntax(ErrorCode),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

pub type Result<T> = result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref error) => error.fmt(fmt),
            Error::Eval(ref code, offset) =>
                write!(fmt, "eval error at position {}: {}", offset, code),
            Error::Syntax(ref code) => write!(fmt, "decoding error: {}", code),
        }
    }
}

impl error::Error for Error {}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Error {
        Error::Syntax(ErrorCode::Structure(msg.to_string()))
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Error {
        Error::Syntax(ErrorCode::Structure(msg.to_string()))
    }
}
