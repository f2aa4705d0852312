//! The two Python text codecs used by the line-based opcodes.
//!
//! `STRING` data is coded with the py2 "string-escape" codec, `UNICODE` data
//! with "raw-unicode-escape".  Both are tiny, pure-data codecs; they are
//! reimplemented here because their escape rules differ from Rust's in
//! several load-bearing ways (no `\u` in string-escape, the even-backslash
//! rule in raw-unicode-escape, Latin-1 expansion of plain bytes).

use crate::error::ErrorCode;

const HEXDIGITS: &[u8; 16] = b"0123456789abcdef";

/// Decode "string-escape" data into raw octets.
///
/// Handles `\\ \' \" \<LF> \a \b \f \n \r \t \v`, octal escapes of one to
/// three digits and `\xHH`.  An unknown escape `\c` yields a literal
/// backslash followed by `c`, exactly like Python.  The result is not
/// required to be UTF-8.
pub fn decode_string_escape(s: &[u8]) -> Result<Vec<u8>, ErrorCode> {
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        if s[i] != b'\\' {
            out.push(s[i]);
            i += 1;
            continue;
        }
        if i + 1 >= s.len() {
            return Err(ErrorCode::InvalidLiteral(s.to_vec()));
        }
        let c = s[i + 1];
        i += 2;
        match c {
            // line continuation inside a literal: both bytes vanish
            b'\n' => {}
            b'\\' => out.push(b'\\'),
            b'\'' => out.push(b'\''),
            b'"' => out.push(b'"'),
            b'a' => out.push(b'\x07'),
            b'b' => out.push(b'\x08'),
            b't' => out.push(b'\x09'),
            b'n' => out.push(b'\x0a'),
            b'v' => out.push(b'\x0b'),
            b'f' => out.push(b'\x0c'),
            b'r' => out.push(b'\x0d'),
            b'0'..=b'7' => {
                // up to three octal digits, greedy
                let mut val = (c - b'0') as u32;
                for _ in 0..2 {
                    match s.get(i).copied() {
                        Some(d @ b'0'..=b'7') => {
                            val = val * 8 + (d - b'0') as u32;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                if val > 0xff {
                    return Err(ErrorCode::InvalidLiteral(s.to_vec()));
                }
                out.push(val as u8);
            }
            b'x' => {
                let hi = s.get(i).and_then(|&b| (b as char).to_digit(16));
                let lo = s.get(i + 1).and_then(|&b| (b as char).to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        i += 2;
                    }
                    _ => return Err(ErrorCode::InvalidLiteral(s.to_vec())),
                }
            }
            // unknown escape: keep the backslash, reprocess the next byte
            _ => {
                out.push(b'\\');
                i -= 1;
            }
        }
    }
    Ok(out)
}

/// Quote octets the way Python quotes a py2 str literal, for the `STRING`
/// opcode.  Returns the literal including its double quotes.
///
/// `\u`/`\U` must never appear here: Python's `STRING` opcode does not
/// interpret them, so every byte outside printable ASCII goes out as `\xHH`.
pub fn pyquote(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 2);
    out.push(b'"');
    for &b in s {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x20..=0x7e => out.push(b),
            _ => {
                out.extend_from_slice(b"\\x");
                out.push(HEXDIGITS[(b >> 4) as usize]);
                out.push(HEXDIGITS[(b & 0xf) as usize]);
            }
        }
    }
    out.push(b'"');
    out
}

/// Decode "raw-unicode-escape" data.
///
/// Only `\uHHHH` and `\UHHHHHHHH` are escapes, and only when the backslash
/// is preceded by an even number of backslashes (`\\u1234` is two literal
/// backslashes followed by `u1234`).  Every other byte maps to the code
/// point of its own value.
pub fn decode_raw_unicode_escape(s: &[u8]) -> Result<String, ErrorCode> {
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    let mut backslashes = 0usize;
    while i < s.len() {
        let b = s[i];
        if b != b'\\' {
            out.push(char::from(b));
            backslashes = 0;
            i += 1;
            continue;
        }
        let ndigits = match s.get(i + 1) {
            Some(b'u') if backslashes % 2 == 0 => 4,
            Some(b'U') if backslashes % 2 == 0 => 8,
            _ => {
                out.push('\\');
                backslashes += 1;
                i += 1;
                continue;
            }
        };
        i += 2;
        let mut accum = 0u32;
        for _ in 0..ndigits {
            match s.get(i).and_then(|&b| (b as char).to_digit(16)) {
                Some(v) => accum = accum * 16 + v,
                None => return Err(ErrorCode::InvalidLiteral(s.to_vec())),
            }
            i += 1;
        }
        match std::char::from_u32(accum) {
            Some(c) => out.push(c),
            None => return Err(ErrorCode::InvalidLiteral(s.to_vec())),
        }
        backslashes = 0;
    }
    Ok(out)
}

/// Encode octets as "raw-unicode-escape" data for the `UNICODE` opcode.
///
/// The input is interpreted as UTF-8.  Code points up to 0xFF are emitted as
/// the raw byte, larger ones as `\uHHHH` or `\UHHHHHHHH`.  The backslash and
/// the newline are forced through escapes so the line survives a pickle
/// round trip.  Invalid UTF-8 is an error in strict mode and passes through
/// byte-for-byte otherwise.
pub fn encode_raw_unicode_escape(s: &[u8], strict: bool) -> Result<Vec<u8>, ErrorCode> {
    let mut out = Vec::with_capacity(s.len());
    let mut rest = s;
    while !rest.is_empty() {
        let (chunk, bad) = match std::str::from_utf8(rest) {
            Ok(chunk) => (chunk, 0),
            Err(err) => {
                let valid = err.valid_up_to();
                let bad = err.error_len().unwrap_or(rest.len() - valid);
                // from_utf8 already validated this prefix
                (std::str::from_utf8(&rest[..valid]).unwrap_or(""), bad)
            }
        };
        for c in chunk.chars() {
            match c as u32 {
                0x5c => out.extend_from_slice(b"\\u005c"),
                0x0a => out.extend_from_slice(b"\\u000a"),
                cp if cp <= 0xff => out.push(cp as u8),
                cp if cp <= 0xffff => {
                    out.extend_from_slice(b"\\u");
                    push_hex(&mut out, cp, 4);
                }
                cp => {
                    out.extend_from_slice(b"\\U");
                    push_hex(&mut out, cp, 8);
                }
            }
        }
        rest = &rest[chunk.len()..];
        if bad > 0 {
            if strict {
                return Err(ErrorCode::Proto0UnicodeUtf8Only);
            }
            out.extend_from_slice(&rest[..bad]);
            rest = &rest[bad..];
        }
    }
    Ok(out)
}

fn push_hex(out: &mut Vec<u8>, value: u32, width: usize) {
    for i in (0..width).rev() {
        out.push(HEXDIGITS[((value >> (4 * i)) & 0xf) as usize]);
    }
}

/// Expand octets to text, one code point per byte.
pub fn latin1_decode(b: &[u8]) -> String {
    b.iter().map(|&b| char::from(b)).collect()
}

/// Collapse text to octets; `None` if any code point is above 0xFF.
pub fn latin1_encode(s: &str) -> Option<Vec<u8>> {
    s.chars()
     .map(|c| if (c as u32) <= 0xff { Some(c as u32 as u8) } else { None })
     .collect()
}
