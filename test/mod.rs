// Copyright (c) 2024-2026 The cornichon developers.  Licensed under the Apache
// License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.


use std::collections::BTreeMap;
use std::io;

use num_bigint::BigInt;

use crate::error::{Error, ErrorCode};
use crate::pydict::{is_hashable, py_equal, py_hash};
use crate::{
    value_from_slice, value_to_vec, Class, DeOptions, Deserializer, PyDict, SerOptions, Value,
};

// value shorthands

fn i(v: i64) -> Value {
    Value::I64(v)
}

fn big(s: &str) -> Value {
    Value::Int(BigInt::parse_bytes(s.as_bytes(), 10).unwrap())
}

fn f(v: f64) -> Value {
    Value::F64(v)
}

fn s(v: &str) -> Value {
    Value::String(v.into())
}

fn bs(v: &[u8]) -> Value {
    Value::ByteStr(v.to_vec())
}

fn by(v: &[u8]) -> Value {
    Value::Bytes(v.to_vec())
}

fn ba(v: &[u8]) -> Value {
    Value::ByteArray(v.to_vec())
}

fn tup(v: Vec<Value>) -> Value {
    Value::Tuple(v.into_boxed_slice())
}

fn list(v: Vec<Value>) -> Value {
    Value::List(v)
}

fn dict(pairs: Vec<(Value, Value)>) -> Value {
    let map: BTreeMap<_, _> = pairs
        .into_iter()
        .map(|(k, v)| (k.to_hashable().unwrap(), v))
        .collect();
    Value::Dict(map)
}

fn pydict(pairs: Vec<(Value, Value)>) -> Value {
    Value::PyDict(PyDict::from_pairs(pairs).unwrap())
}

fn class(module: &str, name: &str) -> Value {
    Value::Class(Class::new(module, name))
}

fn call(module: &str, name: &str, args: Vec<Value>) -> Value {
    Value::Call {
        callable: Class::new(module, name),
        args: args.into_boxed_slice(),
    }
}

fn pref(pid: Value) -> Value {
    Value::Ref(Box::new(pid))
}

// test drivers, mirroring the decode/encode/corruption checks the upstream
// Go test harness performs per pickle

/// A writer failing after `limit` bytes, to exercise sink-error paths.
struct LimitedWriter {
    limit: usize,
}

impl io::Write for LimitedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.limit == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "write limit reached"));
        }
        let n = buf.len().min(self.limit);
        self.limit -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Decode `data`, expect `value`; then re-feed every truncation (must be
/// "unexpected end of input") and every suffix (must not panic).
fn check_decode_with(data: &[u8], value: &Value, dopts: fn() -> DeOptions) {
    match value_from_slice(data, dopts()) {
        Ok(decoded) => assert_eq!(&decoded, value, "decoding {:?}", data),
        Err(err) => panic!("decoding {:?}: {}", data, err),
    }

    for cut in 1..data.len() {
        match value_from_slice(&data[..cut], dopts()) {
            Err(Error::Eval(ErrorCode::EofWhileParsing, _)) => {}
            other => panic!(
                "no unexpected-eof error on {:?} cut to {}: {:?}", data, cut, other),
        }
    }

    for start in 0..data.len() {
        let _ = value_from_slice(&data[start..], dopts());
    }
}

fn check_decode(data: &[u8], value: &Value) {
    check_decode_with(data, value, DeOptions::new);
}

/// Encode `value` at each protocol in `protos`, expect the `PROTO` header
/// (where applicable) followed by `body`; the output must also decode back,
/// and write errors at any offset must surface.
fn check_encode_with(value: &Value, protos: &[u8], body: &[u8],
                     sopts: fn() -> SerOptions, dopts: fn() -> DeOptions) {
    for &proto in protos {
        let mut expected = Vec::new();
        if proto >= 2 {
            expected.extend_from_slice(&[0x80, proto]);
        }
        expected.extend_from_slice(body);

        let data = value_to_vec(value, sopts().protocol(proto)).unwrap();
        assert_eq!(data, expected, "encoding {:?} at protocol {}", value, proto);

        for limit in 0..data.len() {
            let mut sink = LimitedWriter { limit };
            match crate::value_to_writer(&mut sink, value, sopts().protocol(proto)) {
                Err(Error::Io(_)) => {}
                other => panic!("write error not surfaced at byte {}: {:?}", limit, other),
            }
        }

        check_decode_with(&data, value, dopts);
    }
}

fn check_encode(value: &Value, protos: &[u8], body: &[u8]) {
    check_encode_with(value, protos, body, SerOptions::new, DeOptions::new);
}

/// Encode/decode round trip for protocols without a byte-exact vector.
fn check_roundtrip_with(value: &Value, sopts: fn() -> SerOptions, dopts: fn() -> DeOptions) {
    for proto in 0..=5 {
        let data = value_to_vec(value, sopts().protocol(proto)).unwrap();
        let back = value_from_slice(&data, dopts()).unwrap();
        assert_eq!(&back, value, "round trip at protocol {}", proto);
    }
}

fn check_roundtrip(value: &Value) {
    check_roundtrip_with(value, SerOptions::new, DeOptions::new);
}

fn encode_err(value: &Value, proto: u8, sopts: fn() -> SerOptions) -> ErrorCode {
    match value_to_vec(value, sopts().protocol(proto)) {
        Err(Error::Syntax(code)) => code,
        other => panic!("expected encode error for {:?} at proto {}, got {:?}",
                        value, proto, other),
    }
}

mod value_tests {
    use super::*;

    #[test]
    fn none() {
        check_encode(&Value::None, &[0, 1, 2, 3, 4, 5], b"N.");
    }

    #[test]
    fn booleans() {
        check_encode(&Value::Bool(true), &[0, 1], b"I01\n.");
        check_encode(&Value::Bool(true), &[2, 3, 4, 5], b"\x88.");
        check_encode(&Value::Bool(false), &[0, 1], b"I00\n.");
        check_encode(&Value::Bool(false), &[2, 3, 4, 5], b"\x89.");
    }

    #[test]
    fn integers() {
        check_encode(&i(0), &[0], b"I0\n.");
        check_encode(&i(0), &[1, 2, 3, 4, 5], b"K\x00.");
        check_encode(&i(5), &[0], b"I5\n.");
        check_encode(&i(5), &[1, 2, 3, 4, 5], b"K\x05.");
        check_encode(&i(0xff), &[0], b"I255\n.");
        check_encode(&i(0xff), &[1, 2, 3, 4, 5], b"K\xff.");
        check_encode(&i(0x123), &[0], b"I291\n.");
        check_encode(&i(0x123), &[1, 2, 3, 4, 5], b"M\x23\x01.");
        check_encode(&i(0xffff), &[0], b"I65535\n.");
        check_encode(&i(0xffff), &[1, 2, 3, 4, 5], b"M\xff\xff.");
        check_encode(&i(0x12345), &[0], b"I74565\n.");
        check_encode(&i(0x12345), &[1, 2, 3, 4, 5], b"J\x45\x23\x01\x00.");
        check_encode(&i(0x7fff_ffff), &[0], b"I2147483647\n.");
        check_encode(&i(0x7fff_ffff), &[1, 2, 3, 4, 5], b"J\xff\xff\xff\x7f.");
        check_encode(&i(-7), &[0], b"I-7\n.");
        check_encode(&i(-7), &[1, 2, 3, 4, 5], b"J\xf9\xff\xff\xff.");
        check_encode(&i(-0x8000_0000), &[0], b"I-2147483648\n.");
        check_encode(&i(-0x8000_0000), &[1, 2, 3, 4, 5], b"J\x00\x00\x00\x80.");
        // wider than 32 bits: decimal INT at every protocol
        check_encode(&i(0x1234_ffff_ffff), &[0, 1, 2, 3, 4, 5], b"I20018842566655\n.");
        check_encode(&i(i64::MAX), &[0, 1, 2, 3, 4, 5], b"I9223372036854775807\n.");
        check_encode(&i(i64::MIN), &[0, 1, 2, 3, 4, 5], b"I-9223372036854775808\n.");
        // INT falls back to a long when the decimal overflows
        check_decode(b"I18446744073709551615\n.", &big("18446744073709551615"));
    }

    #[test]
    fn floats() {
        check_encode(&f(1.23), &[0], b"F1.23\n.");
        check_encode(&f(1.23), &[1, 2, 3, 4, 5], b"G?\xf3\xae\x14z\xe1G\xae.");
        check_roundtrip(&f(-0.5));
        check_roundtrip(&f(1e100));
    }

    #[test]
    fn float_g_formatting() {
        // protocol 0 uses %g: fixed notation in the middle, exponent
        // notation (signed, two digits minimum) below 1e-4 and from 1e6 on
        check_encode(&f(0.0), &[0], b"F0\n.");
        check_encode(&f(-0.5), &[0], b"F-0.5\n.");
        check_encode(&f(100000.0), &[0], b"F100000\n.");
        check_encode(&f(1234567.0), &[0], b"F1.234567e+06\n.");
        check_encode(&f(0.0001), &[0], b"F0.0001\n.");
        check_encode(&f(1e-10), &[0], b"F1e-10\n.");
        check_encode(&f(1e100), &[0], b"F1e+100\n.");
        check_decode(b"F1e+100\n.", &f(1e100));
        check_decode(b"F0.0001\n.", &f(0.0001));
    }

    #[test]
    fn longs() {
        check_encode(&big("12321231232131231231"), &[0, 1, 2, 3, 4, 5],
                     b"L12321231232131231231L\n.");
        check_encode(&big("-123"), &[0, 1, 2, 3, 4, 5], b"L-123L\n.");
        // LONG1 input, still a long even though it is small
        check_decode(b"\x8a\x09\xffm\xa1b\x86\xce\xfd\xaa\x00.", &big("12321231232131231231"));
        check_decode(b"\x8a\x01{.", &big("123"));
    }

    #[test]
    fn long1_twos_complement() {
        // sign handling of the little-endian two's-complement payload
        check_decode(b"\x8a\x00.", &big("0"));
        check_decode(b"\x8a\x02\xff\x00.", &big("255"));
        check_decode(b"\x8a\x02\xff\x7f.", &big("32767"));
        check_decode(b"\x8a\x02\x00\xff.", &big("-256"));
        check_decode(b"\x8a\x02\x00\x80.", &big("-32768"));
        check_decode(b"\x8a\x01\x80.", &big("-128"));
        check_decode(b"\x8a\x01\x7f.", &big("127"));
        // LONG4 spells the length on four bytes
        check_decode(b"\x8b\x02\x00\x00\x00\xff\x7f.", &big("32767"));
    }

    #[test]
    fn tuples() {
        check_encode(&tup(vec![]), &[0], b"(t.");
        check_encode(&tup(vec![]), &[1, 2, 3, 4, 5], b").");
        check_encode(&tup(vec![i(1)]), &[0], b"(I1\nt.");
        check_encode(&tup(vec![i(1)]), &[1], b"(K\x01t.");
        check_encode(&tup(vec![i(1)]), &[2, 3, 4, 5], b"K\x01\x85.");
        check_decode(b"I1\n\x85.", &tup(vec![i(1)]));
        check_encode(&tup(vec![i(1), i(2)]), &[0], b"(I1\nI2\nt.");
        check_encode(&tup(vec![i(1), i(2)]), &[1], b"(K\x01K\x02t.");
        check_encode(&tup(vec![i(1), i(2)]), &[2, 3, 4, 5], b"K\x01K\x02\x86.");
        check_decode(b"I1\nI2\n\x86.", &tup(vec![i(1), i(2)]));
        check_encode(&tup(vec![i(1), i(2), i(3)]), &[0], b"(I1\nI2\nI3\nt.");
        check_encode(&tup(vec![i(1), i(2), i(3)]), &[1], b"(K\x01K\x02K\x03t.");
        check_encode(&tup(vec![i(1), i(2), i(3)]), &[2, 3, 4, 5], b"K\x01K\x02K\x03\x87.");
        check_decode(b"I1\nI2\nI3\n\x87.", &tup(vec![i(1), i(2), i(3)]));
        // 4-tuples only have the general form
        check_encode(&tup(vec![i(1), i(2), i(3), i(4)]), &[2, 3, 4, 5],
                     b"(K\x01K\x02K\x03K\x04t.");
    }

    #[test]
    fn nested_tuples() {
        let nested = tup(vec![tup(vec![i(1), i(2)]), tup(vec![i(3), i(4)])]);
        check_encode(&nested, &[0], b"((I1\nI2\nt(I3\nI4\ntt.");
        check_encode(&nested, &[1], b"((K\x01K\x02t(K\x03K\x04tt.");
        check_encode(&nested, &[2, 3, 4, 5], b"K\x01K\x02\x86K\x03K\x04\x86\x86.");
        // with memo puts on the way
        check_decode(b"((I1\nI2\ntp0\n(I3\nI4\ntp1\ntp2\n.", &nested);
    }

    #[test]
    fn lists() {
        check_encode(&list(vec![]), &[0], b"(l.");
        check_encode(&list(vec![]), &[1, 2, 3, 4, 5], b"].");
        check_decode(b"(lp0\n.", &list(vec![]));
        let l = list(vec![i(1), i(2), i(3), Value::Bool(true)]);
        check_encode(&l, &[0], b"(I1\nI2\nI3\nI01\nl.");
        check_encode(&l, &[1], b"(K\x01K\x02K\x03I01\nl.");
        check_encode(&l, &[2, 3, 4, 5], b"(K\x01K\x02K\x03\x88l.");
        check_decode(b"(lp0\nI1\naI2\naI3\naI01\na.", &l);
    }

    #[test]
    fn strings() {
        check_encode(&s("abc"), &[0], b"S\"abc\"\n.");
        check_encode(&s("abc"), &[1, 2], b"U\x03abc.");
        check_encode(&s("abc"), &[3], b"X\x03\x00\x00\x00abc.");
        check_encode(&s("abc"), &[4, 5], b"\x8c\x03abc.");
        check_decode(b"T\x03\x00\x00\x00abc.", &s("abc"));
        check_decode(b"S'abc'\np0\n.", &s("abc"));
        check_decode(b"S'abc'\n.", &s("abc"));
        // unmatched inner quotes are tolerated, as in Python
        check_decode(b"S'hel'lo'\n.", &s("hel'lo"));
        check_decode(b"S\"hel\"lo\"\n.", &s("hel\"lo"));
    }

    #[test]
    fn unicode_strings() {
        let nihongo = "\u{65e5}\u{672c}\u{8a9e}"; // 日本語
        check_encode(&s(nihongo), &[1, 2], b"U\x09\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e.");
        check_encode(&s(nihongo), &[3],
                     b"X\x09\x00\x00\x00\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e.");
        check_encode(&s(nihongo), &[4, 5], b"\x8c\x09\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e.");
        // protocol 0 quotes every non-ASCII byte
        check_encode(&s(nihongo), &[0],
                     b"S\"\\xe6\\x97\\xa5\\xe6\\x9c\\xac\\xe8\\xaa\\x9e\"\n.");
        // raw-unicode-escape line, and the same string with raw UTF-8 inside
        // the STRING literal
        check_decode(b"V\\u65e5\\u672c\\u8a9e\np0\n.", &s(nihongo));
        check_decode(b"S\"\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e\"\n.", &s(nihongo));
        check_decode(b"X\x09\x00\x00\x00\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e.", &s(nihongo));
        check_decode(b"\x8d\x09\x00\x00\x00\x00\x00\x00\x00\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e.",
                     &s(nihongo));
    }

    #[test]
    fn unicode_escapes_only_u_and_big_u() {
        // only \u and \U are raw-unicode-escapes, \n \r \x00 stay literal
        check_decode(b"V\\u043c\\u0438\\u0440\\n\\r\\x00\r\n.",
                     &s("\u{43c}\u{438}\u{440}\\n\\r\\x00\r"));
    }

    #[test]
    fn strict_mode_strings() {
        let strict_ser = || SerOptions::new().strict_unicode();
        let strict_de = || DeOptions::new().strict_unicode();

        // py2 strs keep their bytes
        check_encode_with(&bs(b"abc"), &[0], b"S\"abc\"\n.", strict_ser, strict_de);
        check_encode_with(&bs(b"abc"), &[1, 2, 3, 4, 5], b"U\x03abc.", strict_ser, strict_de);
        check_decode_with(b"T\x03\x00\x00\x00abc.", &bs(b"abc"), strict_de);
        check_decode_with(b"S'abc'\n.", &bs(b"abc"), strict_de);
        check_encode_with(&bs(b"\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e"), &[1, 2, 3, 4, 5],
                          b"U\x09\xe6\x97\xa5\xe6\x9c\xac\xe8\xaa\x9e.",
                          strict_ser, strict_de);

        // unicode strings stay unicode even at low protocols
        check_encode_with(&s("abc"), &[0], b"Vabc\n.", strict_ser, strict_de);
        check_encode_with(&s("abc"), &[1, 2, 3], b"X\x03\x00\x00\x00abc.",
                          strict_ser, strict_de);
        check_encode_with(&s("abc"), &[4, 5], b"\x8c\x03abc.", strict_ser, strict_de);
        check_encode_with(&s("\u{65e5}\u{672c}\u{8a9e}"), &[0],
                          b"V\\u65e5\\u672c\\u8a9e\n.", strict_ser, strict_de);
    }

    #[test]
    fn string_escape_heavy() {
        // "\x80ми\nр\r<U+2028>\u1234\U00004321" as a py2 str; \u escapes in
        // STRING literals are not interpreted
        let value = bs(b"\x80\xd0\xbc\xd0\xb8\n\xd1\x80\r\xe2\x80\xa8\\u1234\\U00004321");
        check_decode_with(
            b"S\"\\x80\xd0\xbc\xd0\xb8\\n\xd1\x80\\r\\xe2\\x80\\xa8\\u1234\\U00004321\"\n.",
            &value, || DeOptions::new().strict_unicode());
        check_encode_with(
            &value, &[0],
            b"S\"\\x80\\xd0\\xbc\\xd0\\xb8\\n\\xd1\\x80\\r\\xe2\\x80\\xa8\\\\u1234\\\\U00004321\"\n.",
            || SerOptions::new().strict_unicode(), || DeOptions::new().strict_unicode());
    }

    #[test]
    fn bytes_via_codecs_reduce() {
        // b"hello\nмир\x01": below protocol 3 this is
        // _codecs.encode(latin1_text, 'latin1')
        let value = by(b"hello\n\xd0\xbc\xd0\xb8\xd1\x80\x01");
        check_encode(&value, &[0],
            b"c_codecs\nencode\n(Vhello\\u000a\xd0\xbc\xd0\xb8\xd1\x80\x01\nS\"latin1\"\ntR.");
        check_encode(&value, &[1],
            b"c_codecs\nencode\n(X\x13\x00\x00\x00hello\n\xc3\x90\xc2\xbc\xc3\x90\xc2\xb8\xc3\x91\xc2\x80\x01U\x06latin1tR.");
        check_encode(&value, &[2],
            b"c_codecs\nencode\nX\x13\x00\x00\x00hello\n\xc3\x90\xc2\xbc\xc3\x90\xc2\xb8\xc3\x91\xc2\x80\x01U\x06latin1\x86R.");
        check_encode(&value, &[3, 4, 5], b"C\x0dhello\n\xd0\xbc\xd0\xb8\xd1\x80\x01.");
        check_decode(b"B\x0d\x00\x00\x00hello\n\xd0\xbc\xd0\xb8\xd1\x80\x01.", &value);
        check_decode(b"\x8e\x0d\x00\x00\x00\x00\x00\x00\x00hello\n\xd0\xbc\xd0\xb8\xd1\x80\x01.",
                     &value);
        // the same pickles must work in strict-unicode mode
        check_decode_with(
            b"c_codecs\nencode\nX\x13\x00\x00\x00hello\n\xc3\x90\xc2\xbc\xc3\x90\xc2\xb8\xc3\x91\xc2\x80\x01U\x06latin1\x86R.",
            &value, || DeOptions::new().strict_unicode());
    }

    #[test]
    fn bytearray() {
        let value = ba(b"hello\n\xd0\xbc\xd0\xb8\xd1\x80\x01");
        check_encode(&value, &[0],
            b"c__builtin__\nbytearray\n(c_codecs\nencode\n(Vhello\\u000a\xd0\xbc\xd0\xb8\xd1\x80\x01\nS\"latin1\"\ntRtR.");
        check_encode(&value, &[1],
            b"c__builtin__\nbytearray\n(c_codecs\nencode\n(X\x13\x00\x00\x00hello\n\xc3\x90\xc2\xbc\xc3\x90\xc2\xb8\xc3\x91\xc2\x80\x01U\x06latin1tRtR.");
        check_encode(&value, &[2],
            b"c__builtin__\nbytearray\nc_codecs\nencode\nX\x13\x00\x00\x00hello\n\xc3\x90\xc2\xbc\xc3\x90\xc2\xb8\xc3\x91\xc2\x80\x01U\x06latin1\x86R\x85R.");
        check_encode(&value, &[3],
            b"cbuiltins\nbytearray\nC\rhello\n\xd0\xbc\xd0\xb8\xd1\x80\x01\x85R.");
        check_encode(&value, &[4],
            b"\x8c\x08builtins\x8c\tbytearray\x93C\rhello\n\xd0\xbc\xd0\xb8\xd1\x80\x01\x85R.");
        check_encode(&value, &[5],
            b"\x96\x0d\x00\x00\x00\x00\x00\x00\x00hello\n\xd0\xbc\xd0\xb8\xd1\x80\x01.");
        // bytearray(text, encoding) form
        check_decode(
            b"c__builtin__\nbytearray\nq\x00(X\x13\x00\x00\x00hello\n\xc3\x90\xc2\xbc\xc3\x90\xc2\xb8\xc3\x91\xc2\x80\x01q\x01X\x07\x00\x00\x00latin-1q\x02tq\x03Rq\x04.",
            &value);
        check_decode(b"\x96\x03\x00\x00\x00\x00\x00\x00\x00abc.", &ba(b"abc"));
    }

    #[test]
    fn dicts() {
        check_encode(&dict(vec![]), &[0], b"(d.");
        check_encode(&dict(vec![]), &[1, 2, 3, 4, 5], b"}.");
        check_decode(b"(dp0\n.", &dict(vec![]));

        let d1 = dict(vec![(s("a"), s("1"))]);
        check_encode(&d1, &[0], b"(S\"a\"\nS\"1\"\nd.");
        check_encode(&d1, &[1, 2], b"(U\x01aU\x011d.");
        check_encode(&d1, &[3], b"(X\x01\x00\x00\x00aX\x01\x00\x00\x001d.");
        check_encode(&d1, &[4, 5], b"(\x8c\x01a\x8c\x011d.");

        // host-map keys order deterministically, so two entries still have
        // a byte-exact encoding
        let d2 = dict(vec![(s("a"), s("1")), (s("b"), s("2"))]);
        check_encode(&d2, &[0], b"(S\"a\"\nS\"1\"\nS\"b\"\nS\"2\"\nd.");
        check_decode(b"(U\x01aU\x011U\x01bU\x012d.", &d2);
        check_decode(b"(dS'a'\nS'1'\nsS'b'\nS'2'\ns.", &d2);
        check_decode(b"}(U\x01aU\x011U\x01bU\x012u.", &d2);
        check_decode(b"(dp0\nS'a'\np1\nS'1'\np2\nsS'b'\np3\nS'2'\np4\ns.", &d2);

        // distinct key types stay distinct in host maps
        let d3 = dict(vec![(i(1), s("int")), (f(1.0), s("float")),
                           (Value::Bool(true), s("bool"))]);
        check_roundtrip(&d3);
    }

    #[test]
    fn pydicts() {
        let de = || DeOptions::new().py_dict();

        check_decode_with(b"(d.", &pydict(vec![]), de);
        check_decode_with(b"}.", &pydict(vec![]), de);

        let d2 = pydict(vec![(s("a"), s("1")), (s("b"), s("2"))]);
        check_decode_with(b"(S\"a\"\nS\"1\"\nS\"b\"\nS\"2\"\nd.", &d2, de);
        check_decode_with(b"(dS'a'\nS'1'\nsS'b'\nS'2'\ns.", &d2, de);
        check_decode_with(b"}(U\x01aU\x011U\x01bU\x012u.", &d2, de);

        // long and tuple keys
        let dlong = pydict(vec![(big("123"), i(0))]);
        check_encode_with(&dlong, &[0], b"(L123L\nI0\nd.", SerOptions::new, de);
        check_encode_with(&dlong, &[1], b"(L123L\nK\x00d.", SerOptions::new, de);
        check_decode_with(b"(\x8a\x01{K\x00d.", &dlong, de);

        let dtup = pydict(vec![(tup(vec![]), i(0))]);
        check_encode_with(&dtup, &[0], b"((tI0\nd.", SerOptions::new, de);
        check_encode_with(&dtup, &[1], b"()K\x00d.", SerOptions::new, de);

        let dtup2 = pydict(vec![(tup(vec![i(1), i(2)]), i(0))]);
        check_encode_with(&dtup2, &[0], b"((I1\nI2\ntI0\nd.", SerOptions::new, de);
        check_encode_with(&dtup2, &[1], b"((K\x01K\x02tK\x00d.", SerOptions::new, de);
        check_encode_with(&dtup2, &[2, 3, 4, 5], b"(K\x01K\x02\x86K\x00d.",
                          SerOptions::new, de);
    }

    #[test]
    fn globals() {
        let cls = class("foo", "bar");
        check_encode(&cls, &[0, 1, 2, 3], b"cfoo\nbar\n.");
        check_encode(&cls, &[4, 5], b"\x8c\x03foo\x8c\x03bar\x93.");
        check_decode(b"S'foo'\nS'bar'\n\x93.", &cls);

        // newline in the module name only works with STACK_GLOBAL
        let odd = class("foo\n2", "bar");
        for proto in 0..=3 {
            assert_eq!(encode_err(&odd, proto, SerOptions::new), ErrorCode::GlobalNewline);
        }
        check_encode(&odd, &[4, 5], b"\x8c\x05foo\n2\x8c\x03bar\x93.");
    }

    #[test]
    fn reduce_to_symbolic_call() {
        let c = call("foo", "bar", vec![s("bing")]);
        check_encode(&c, &[0], b"cfoo\nbar\n(S\"bing\"\ntR.");
        check_encode(&c, &[1], b"cfoo\nbar\n(U\x04bingtR.");
        check_encode(&c, &[2], b"cfoo\nbar\nU\x04bing\x85R.");
        check_encode(&c, &[3], b"cfoo\nbar\nX\x04\x00\x00\x00bing\x85R.");
        check_encode(&c, &[4, 5], b"\x8c\x03foo\x8c\x03bar\x93\x8c\x04bing\x85R.");
    }

    #[test]
    fn persistent_refs() {
        let r = pref(s("abc"));
        check_encode(&r, &[0], b"Pabc\n.");
        check_encode(&r, &[1, 2], b"U\x03abcQ.");
        check_encode(&r, &[3], b"X\x03\x00\x00\x00abcQ.");
        check_encode(&r, &[4, 5], b"\x8c\x03abcQ.");

        // pid with a newline has no line-based form
        let rnl = pref(s("abc\nd"));
        assert_eq!(encode_err(&rnl, 0, SerOptions::new), ErrorCode::Proto0PersIdLineOnly);
        check_encode(&rnl, &[1, 2], b"U\x05abc\ndQ.");
        check_encode(&rnl, &[3], b"X\x05\x00\x00\x00abc\ndQ.");
        check_encode(&rnl, &[4, 5], b"\x8c\x05abc\ndQ.");

        // non-text pid
        let rt = pref(tup(vec![i(1), i(2)]));
        assert_eq!(encode_err(&rt, 0, SerOptions::new), ErrorCode::Proto0PersIdLineOnly);
        check_encode(&rt, &[1], b"(K\x01K\x02tQ.");
        check_encode(&rt, &[2, 3, 4, 5], b"K\x01K\x02\x86Q.");
        check_decode(b"(I1\nI2\ntQ.", &rt);
    }

    #[test]
    fn persistent_load_hook() {
        // pretend we resolve ("zodb", "BTree") references to a host object
        fn loader() -> DeOptions {
            DeOptions::new().persistent_load(|pid| match pid {
                Value::Tuple(items) => match &items[..] {
                    [Value::Class(c), Value::String(oid)] => {
                        if c.module == "zodb" && c.name == "BTree" {
                            Ok(Some(Value::Call {
                                callable: Class::new("host", "BTree"),
                                args: Box::new([Value::String(oid.clone())]),
                            }))
                        } else {
                            Ok(None)
                        }
                    }
                    _ => Err(Error::Syntax(ErrorCode::Structure("invalid reference".into()))),
                },
                _ => Err(Error::Syntax(ErrorCode::Structure("invalid reference".into()))),
            })
        }

        // recognized: substituted
        let loaded = value_from_slice(b"\x80\x01czodb\nBTree\nS'123'\n\x86Q.", loader()).unwrap();
        assert_eq!(loaded, call("host", "BTree", vec![s("123")]));

        // not recognized: the Ref passes through
        let kept = value_from_slice(b"\x80\x01cfoo\nbar\nS'123'\n\x86Q.", loader()).unwrap();
        assert_eq!(kept, pref(tup(vec![class("foo", "bar"), s("123")])));

        // hook errors abort decoding
        assert!(value_from_slice(b"Pabc\n.", loader()).is_err());
        assert!(value_from_slice(b"\x80\x01S'abc'\nQ.", loader()).is_err());

        // and the encoder hook turns the host object back into a reference
        let host = call("host", "BTree", vec![s("123")]);
        let sopts = SerOptions::new().protocol(1).persistent_ref(|value| match value {
            Value::Call { callable, args } if callable.module == "host" => {
                Some(tup(vec![class("zodb", callable.name.as_str()), args[0].clone()]))
            }
            _ => None,
        });
        let data = value_to_vec(&host, sopts).unwrap();
        assert_eq!(data, b"(czodb\nBTree\nU\x03123tQ.");
        assert_eq!(value_from_slice(&data, loader()).unwrap(), host);
    }

    #[test]
    fn memo_opcodes() {
        check_decode(b"(lr0000I17\na.", &list(vec![i(17)]));
        check_decode(b"I5\np0\n0g0\n.", &i(5));
        check_decode(b"I5\nq\x000h\x00.", &i(5));
        check_decode(b"I5\nr\x00\x00\x00\x000j\x00\x00\x00\x00.", &i(5));
        // PUT and BINPUT address the same memo
        check_decode(b"I5\np0\n0h\x00.", &i(5));
    }

    #[test]
    fn memoize_uses_next_key() {
        let mut de = Deserializer::new(b"I5\n\x94.".iter().map(|&b| Ok(b)), DeOptions::new());
        assert_eq!(de.decode_value().unwrap(), Some(i(5)));
        assert_eq!(de.memo().get(&0), Some(&i(5)));
    }

    #[test]
    fn stack_opcodes() {
        check_decode(b"I1\nI2\n0.", &i(1));            // POP
        check_decode(b"I5\n2\x86.", &tup(vec![i(5), i(5)])); // DUP
        check_decode(b"I1\n(I2\nI3\n1.", &i(1));       // POP_MARK
    }

    #[test]
    fn frame_is_skipped() {
        check_decode(b"\x95\x00\x00\x00\x00\x00\x00\x00\x00I5\n.", &i(5));
    }

    #[test]
    fn proto_opcode_tolerates_all_versions() {
        for version in 0..=5u8 {
            let data = [b"\x80".as_ref(), &[version], b"I1\n."].concat();
            assert_eq!(value_from_slice(&data, DeOptions::new()).unwrap(), i(1));
        }
        for version in [6u8, 0x7f, 0xff] {
            let data = [b"\x80".as_ref(), &[version], b"I1\n."].concat();
            match value_from_slice(&data, DeOptions::new()) {
                Err(Error::Eval(ErrorCode::InvalidProtocol(v), _)) => assert_eq!(v, version),
                other => panic!("no invalid-protocol error for {}: {:?}", version, other),
            }
        }
    }

    #[test]
    fn invalid_encoder_protocol() {
        for proto in [6u8, 255] {
            match value_to_vec(&Value::None, SerOptions::new().protocol(proto)) {
                Err(Error::Syntax(ErrorCode::InvalidProtocol(v))) => assert_eq!(v, proto),
                other => panic!("no invalid-protocol error: {:?}", other),
            }
        }
    }

    #[test]
    fn multiple_pickles_in_one_stream() {
        let input = b"I5\n.I7\n.N.";
        let mut de = Deserializer::new(input.iter().map(|&b| Ok(b)), DeOptions::new());
        assert_eq!(de.decode_value().unwrap(), Some(i(5)));
        assert_eq!(de.decode_value().unwrap(), Some(i(7)));
        assert_eq!(de.decode_value().unwrap(), Some(Value::None));
        assert_eq!(de.decode_value().unwrap(), None);
    }

    #[test]
    fn trailing_bytes() {
        match value_from_slice(b"N.N", DeOptions::new()) {
            Err(Error::Eval(ErrorCode::TrailingBytes, _)) => {}
            other => panic!("expected trailing bytes error: {:?}", other),
        }
    }

    #[test]
    fn non_latin1_codecs_payload_is_an_error() {
        // _codecs.encode(u'\u4e16', 'latin1') cannot be a bytes object
        let input = b"c_codecs\nencode\nX\x03\x00\x00\x00\xe4\xb8\x96U\x06latin1\x86R.";
        assert!(value_from_slice(input, DeOptions::new()).is_err());
    }

    #[test]
    fn unknown_reduce_stays_symbolic() {
        // _codecs.encode with a different codec is preserved, not executed
        let input = b"c_codecs\nencode\nU\x03abcU\x04hex4\x86R.";
        let expected = call("_codecs", "encode", vec![s("abc"), s("hex4")]);
        assert_eq!(value_from_slice(input, DeOptions::new()).unwrap(), expected);
    }

    #[test]
    fn mixed_object_roundtrip() {
        let longish = big("100000000000000000000");
        let value = dict(vec![
            (Value::None, Value::None),
            (Value::Bool(false), tup(vec![Value::Bool(false), Value::Bool(true)])),
            (i(10), i(100000)),
            (longish.clone(), longish),
            (f(1.0), f(1.0)),
            (by(b"bytes"), by(b"bytes")),
            (s("string"), s("string")),
            (tup(vec![i(1), i(2)]), tup(vec![i(1), i(2), i(3)])),
            (tup(vec![]), list(vec![
                list(vec![i(1), i(2), i(3)]),
                dict(vec![]),
            ])),
        ]);
        check_roundtrip(&value);
        // decoding in py-dict mode gives python-semantics dicts, equal to
        // the host ones under python equality
        for proto in 0..=5 {
            let data = value_to_vec(&value, SerOptions::new().protocol(proto)).unwrap();
            let back = value_from_slice(&data, DeOptions::new().py_dict()).unwrap();
            assert!(py_equal(&back, &value), "py-dict round trip at protocol {}", proto);
        }
    }
}

mod error_tests {
    use super::*;

    fn assert_errs(input: &[u8]) {
        let result = value_from_slice(input, DeOptions::new());
        assert!(result.is_err(), "no error for {:?}: {:?}", input, result);
        // same outcome wanted with python dict semantics
        assert!(value_from_slice(input, DeOptions::new().py_dict()).is_err());
    }

    #[test]
    fn decode_errors() {
        // memo keys that are not there
        assert_errs(b"}g1\n.");
        assert_errs(b"}h\x01.");
        assert_errs(b"}j\x01\x02\x03\x04.");
        // invalid long format
        assert_errs(b"L123\n.");
        assert_errs(b"L12qL\n.");
        assert_errs(b"L\n.");
        assert_errs(b"Lq\n.");
        // invalid protocol version
        assert_errs(b"\x80\xffI1\n.");
        // \r\n is not a line terminator, only \n is
        assert_errs(b"L123L\r\n.");
        assert_errs(b"S'abc'\r\n.");
        // out-of-band buffer opcodes are unsupported
        assert_errs(b"\x97.");
        assert_errs(b"\x98.");
        // so are the object-building ones
        assert_errs(b"(b.");
        assert_errs(b"(i.");
        assert_errs(b"(o.");
        assert_errs(b"N\x81.");
        assert_errs(b"N\x92.");
        assert_errs(b"\x82\x01.");
        // and sets
        assert_errs(b"\x8f.");
        assert_errs(b"(\x91.");
        assert_errs(b"\x8f(I1\n\x90.");
    }

    #[test]
    fn blind_preallocation() {
        // BINSTRING and BINUNICODE with big lengths and no data; the
        // negative one errors on the prefix, the other on the missing data
        match value_from_slice(b"T\xff\xff\xff\xff.", DeOptions::new()) {
            Err(Error::Eval(ErrorCode::NegativeLength, _)) => {}
            other => panic!("expected negative length error: {:?}", other),
        }
        match value_from_slice(b"X\xff\xff\xff\xff.", DeOptions::new()) {
            Err(Error::Eval(ErrorCode::EofWhileParsing, _)) => {}
            other => panic!("expected eof error: {:?}", other),
        }
        assert_errs(b"\x960000000\xef");
    }

    #[test]
    fn mark_cannot_escape() {
        assert_errs(b"(.");
        assert_errs(b"(\x85.");
        assert_errs(b"((\x86.");
        assert_errs(b"(((\x87.");
        assert_errs(b"](a.");
        assert_errs(b"(p0\n0g0\nt.");
        assert_errs(b"(q\x000g0\nt.");
        assert_errs(b"(r\x00\x00\x00\x000g0\nt.");
        assert_errs(b"(\x940g0\nt.");
        assert_errs(b"}I1\n(s.");
        assert_errs(b"}(I1\ns.");
        assert_errs(b"(Q.");
    }

    #[test]
    fn adversarial_corpus() {
        // none of these may panic or succeed on a fresh decoder
        let corpus: &[&[u8]] = &[
            b"\x94", b"R", b"l", b"q0", b"NNd", b"S'", b"r0000", b"a",
            b"(]R", b"]NR", b"s", b"Nu", b"L\n", b"Lq\n", b"\x85",
            b"N\x86", b"NN\x87", b"S\n", b"p0\n", b"(.", b"(\x85.",
            b"(dS''\n(lc\n\na2a2a22aasS''\na", b"\x960000000\xef",
        ];
        for input in corpus {
            assert_errs(input);
        }
    }

    #[test]
    fn fuzzer_finds_do_not_panic() {
        // historic crashers; any outcome is fine as long as nothing panics
        let corpus: &[&[u8]] = &[
            b"(dS''\n(lp4\nsg4\n(s",
            b"}((tu",
            b"}((du",
            b"(c\n\nc\n\n\x85Rd",
            b"}(U\x040000u",
            b"(\x88d",
            b"(]QNd.",
            b"}]QNs.",
            b"}(]QNI1\nNu.",
            b"((dd",
            b"}}}s",
            b"(((ld",
        ];
        for input in corpus {
            let _ = value_from_slice(input, DeOptions::new());
            let _ = value_from_slice(input, DeOptions::new().py_dict());
            let _ = value_from_slice(input, DeOptions::new().strict_unicode());
        }
    }

    #[test]
    fn unhashable_host_keys() {
        // lists and dicts cannot key a host map
        match value_from_slice(b"(]I1\nd.", DeOptions::new()) {
            Err(Error::Eval(ErrorCode::NotHashable, _)) => {}
            other => panic!("expected not-hashable error: {:?}", other),
        }
        match value_from_slice(b"}](ds.", DeOptions::new()) {
            Err(Error::Eval(ErrorCode::NotHashable, _)) => {}
            other => panic!("expected not-hashable error: {:?}", other),
        }
    }

    #[test]
    fn random_streams_do_not_panic() {
        use rand::RngCore;

        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let mut stream = [0u8; 1000];
            rng.fill_bytes(&mut stream);
            if *stream.last().unwrap() == b'.' {
                continue;
            }
            // these must all fail, since the last byte is not a STOP opcode
            assert!(value_from_slice(&stream, DeOptions::new()).is_err());
        }
    }
}

mod pydict_tests {
    use super::*;

    fn hash_of(value: &Value) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;

        let mut hasher = DefaultHasher::new();
        py_hash(value, &mut hasher);
        hasher.finish()
    }

    #[test]
    fn numeric_keys_collide() {
        let mut d = PyDict::new();
        d.set(i(1), s("int")).unwrap();
        assert_eq!(d.get(&f(1.0)), Some(&s("int")));
        assert_eq!(d.get(&Value::Bool(true)), Some(&s("int")));
        assert_eq!(d.get(&big("1")), Some(&s("int")));
        assert_eq!(d.get(&i(2)), None);

        d.set(f(1.0), s("float")).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(&i(1)), Some(&s("float")));
    }

    #[test]
    fn bytestr_bridges_text_and_bytes() {
        let mut d = PyDict::new();
        d.set(bs(b"a"), i(1)).unwrap();
        assert_eq!(d.get(&s("a")), Some(&i(1)));
        assert_eq!(d.get(&by(b"a")), Some(&i(1)));
        assert_eq!(d.get(&bs(b"a")), Some(&i(1)));

        // text and bytes are distinct keys...
        let mut d = PyDict::new();
        d.set(s("a"), i(1)).unwrap();
        d.set(by(b"a"), i(2)).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d.get(&s("a")), Some(&i(1)));
        assert_eq!(d.get(&by(b"a")), Some(&i(2)));

        // ...but setting the bridge key purges both
        d.set(bs(b"a"), i(3)).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(&s("a")), Some(&i(3)));
        assert_eq!(d.get(&by(b"a")), Some(&i(3)));

        // and deleting through the bridge loops until nothing is left
        let mut d = PyDict::new();
        d.set(s("a"), i(1)).unwrap();
        d.set(by(b"a"), i(2)).unwrap();
        d.del(&bs(b"a"));
        assert_eq!(d.len(), 0);
    }

    #[test]
    fn tuple_keys() {
        let mut d = PyDict::new();
        d.set(tup(vec![i(1), i(2)]), s("t")).unwrap();
        assert_eq!(d.get(&tup(vec![f(1.0), f(2.0)])), Some(&s("t")));
        assert_eq!(d.get(&tup(vec![i(1)])), None);
    }

    #[test]
    fn unhashable_keys_error() {
        let mut d = PyDict::new();
        assert_eq!(d.set(list(vec![]), i(1)), Err(ErrorCode::NotHashable));
        assert_eq!(d.set(tup(vec![list(vec![])]), i(1)), Err(ErrorCode::NotHashable));
        assert_eq!(d.set(ba(b"x"), i(1)), Err(ErrorCode::NotHashable));
        assert_eq!(d.set(pydict(vec![]), i(1)), Err(ErrorCode::NotHashable));
        assert!(!is_hashable(&list(vec![])));
        assert!(is_hashable(&tup(vec![i(1)])));
    }

    // groups of pairwise-equal values; values from different groups are
    // never equal (ByteStr is kept out, its bridge is tested separately)
    fn equality_groups() -> Vec<Vec<Value>> {
        vec![
            vec![i(0), big("0"), Value::Bool(false), f(0.0)],
            vec![i(1), big("1"), Value::Bool(true), f(1.0)],
            vec![i(-1), big("-1"), f(-1.0)],
            vec![i(255), big("255"), f(255.0)],
            vec![i(-0x8000_0000), big("-2147483648"), f(-2147483648.0)],
            vec![big("18446744073709551615")],
            vec![big("10000000000000000000000"), f(1e22)],
            vec![f(1.25)],
            vec![s("")],
            vec![s("a")],
            vec![by(b"a")],
            vec![s("\u{43c}\u{438}\u{440}")],
            vec![Value::None],
            vec![tup(vec![]), list(vec![])],
            vec![tup(vec![i(1), i(2)]), list(vec![f(1.0), f(2.0)]),
                 tup(vec![Value::Bool(true), big("2")])],
            vec![class("mod", "cls")],
            vec![call("mod", "cls", vec![s("a"), i(3)]),
                 call("mod", "cls", vec![s("a"), big("3")])],
            vec![pref(i(1)), pref(big("1")), pref(f(1.0))],
            vec![pydict(vec![(s("a"), i(1))]), pydict(vec![(s("a"), f(1.0))])],
        ]
    }

    #[test]
    fn equality_laws() {
        let groups = equality_groups();
        for (gi, group) in groups.iter().enumerate() {
            for a in group {
                // reflexive
                assert!(py_equal(a, a), "not self-equal: {:?}", a);
                for b in group {
                    // within a group: equal, symmetric, and same hash
                    assert!(py_equal(a, b), "not equal: {:?} vs {:?}", a, b);
                    assert!(py_equal(b, a), "not symmetric: {:?} vs {:?}", a, b);
                    if is_hashable(a) && is_hashable(b) {
                        assert_eq!(hash_of(a), hash_of(b),
                                   "hash differs for equal {:?} vs {:?}", a, b);
                    }
                }
                for (gj, other) in groups.iter().enumerate() {
                    if gi == gj {
                        continue;
                    }
                    for c in other {
                        assert!(!py_equal(a, c), "unexpected equal: {:?} vs {:?}", a, c);
                    }
                }
            }
        }
    }

    #[test]
    fn bridge_equality_and_hash() {
        assert!(py_equal(&s("a"), &bs(b"a")));
        assert!(py_equal(&bs(b"a"), &by(b"a")));
        assert!(!py_equal(&s("a"), &by(b"a")));
        assert_eq!(hash_of(&s("a")), hash_of(&bs(b"a")));
        assert_eq!(hash_of(&bs(b"a")), hash_of(&by(b"a")));
    }

    #[test]
    fn dict_equality_is_bidirectional() {
        let a = pydict(vec![(s("a"), i(1))]);
        let b = pydict(vec![(bs(b"a"), i(1))]);
        let c = pydict(vec![(by(b"a"), i(1))]);
        assert!(py_equal(&a, &b));
        assert!(py_equal(&b, &c));
        assert!(!py_equal(&a, &c));

        // host map vs python dict
        let host = dict(vec![(s("a"), i(1))]);
        assert!(py_equal(&host, &a));
        assert!(!py_equal(&host, &pydict(vec![(s("a"), i(2))])));
        assert!(!py_equal(&host, &pydict(vec![])));
    }

    #[test]
    fn integral_float_hashing() {
        assert_eq!(hash_of(&f(5.0)), hash_of(&i(5)));
        assert_eq!(hash_of(&f(-3.0)), hash_of(&i(-3)));
        assert_eq!(hash_of(&big("18446744073709551615")),
                   hash_of(&big("18446744073709551615")));
        // non-integral floats hash by bits, and stay self-consistent
        assert_eq!(hash_of(&f(1.25)), hash_of(&f(1.25)));
        assert_ne!(hash_of(&f(1.25)), hash_of(&i(1)));
    }
}

mod codec_tests {
    use super::*;
    use crate::codecs::{
        decode_raw_unicode_escape, decode_string_escape, encode_raw_unicode_escape,
        latin1_decode, latin1_encode, pyquote,
    };

    #[test]
    fn string_escape_decode() {
        let cases: &[(&[u8], &[u8])] = &[
            (b"hello", b"hello"),
            (b"hello\\\nworld", b"helloworld"),
            (b"\\\\", b"\\"),
            (b"\\'\\\"", b"'\""),
            (b"\\b\\f\\t\\n\\r\\v\\a", b"\x08\x0c\x09\x0a\x0d\x0b\x07"),
            (b"\\000\\001\\376\\377", b"\x00\x01\xfe\xff"),
            (b"\\x00\\x01\\x7f\\x80\\xfe\\xff", b"\x00\x01\x7f\x80\xfe\xff"),
            // stays as is: not escapes of this codec
            (b"\\u1234\\U00001234\\c", b"\\u1234\\U00001234\\c"),
            // octal escapes take one to three digits
            (b"\\0", b"\x00"),
            (b"\\08", b"\x008"),
            (b"\\40x", b"\x20x"),
        ];
        for (input, expected) in cases {
            assert_eq!(decode_string_escape(input).unwrap(), expected.to_vec(),
                       "decoding {:?}", input);
        }

        assert!(decode_string_escape(b"\\").is_err());
        assert!(decode_string_escape(b"\\x0z").is_err());
        assert!(decode_string_escape(b"\\x").is_err());
        assert!(decode_string_escape(b"\\400").is_err());
    }

    #[test]
    fn pyquote_escapes() {
        assert_eq!(pyquote(b"abc"), b"\"abc\"".to_vec());
        assert_eq!(pyquote(b"a\"b\\c"), b"\"a\\\"b\\\\c\"".to_vec());
        assert_eq!(pyquote(b"\n\r\t"), b"\"\\n\\r\\t\"".to_vec());
        assert_eq!(pyquote(b"\x00\x7f\x80\xff"), b"\"\\x00\\x7f\\x80\\xff\"".to_vec());
        // single quotes need no escape in a double-quoted literal
        assert_eq!(pyquote(b"it's"), b"\"it's\"".to_vec());
        // pyquote output always decodes back to the input octets
        for input in [&b"mixed \\ \"quotes\" \x01\xfe"[..], &b""[..], &b"\xc3\xa9"[..]] {
            let quoted = pyquote(input);
            assert_eq!(decode_string_escape(&quoted[1..quoted.len() - 1]).unwrap(),
                       input.to_vec());
        }
    }

    #[test]
    fn raw_unicode_escape_decode() {
        assert_eq!(decode_raw_unicode_escape(b"abc").unwrap(), "abc");
        assert_eq!(decode_raw_unicode_escape(b"\\u65e5\\u672c\\u8a9e").unwrap(),
                   "\u{65e5}\u{672c}\u{8a9e}");
        assert_eq!(decode_raw_unicode_escape(b"\\U0001d11e").unwrap(), "\u{1d11e}");
        // plain bytes expand as latin-1
        assert_eq!(decode_raw_unicode_escape(b"\xe9\xff").unwrap(), "\u{e9}\u{ff}");
        // a backslash escapes only when preceded by an even number of
        // backslashes
        assert_eq!(decode_raw_unicode_escape(b"\\\\u0041").unwrap(), "\\\\u0041");
        assert_eq!(decode_raw_unicode_escape(b"\\\\\\u0041").unwrap(), "\\\\A");
        // non-escape backslashes stay literal
        assert_eq!(decode_raw_unicode_escape(b"\\n\\r\\x00").unwrap(), "\\n\\r\\x00");
        assert_eq!(decode_raw_unicode_escape(b"\\").unwrap(), "\\");

        assert!(decode_raw_unicode_escape(b"\\u00zz").is_err());
        assert!(decode_raw_unicode_escape(b"\\u12").is_err());
        assert!(decode_raw_unicode_escape(b"\\ud800").is_err()); // lone surrogate
    }

    #[test]
    fn raw_unicode_escape_encode() {
        assert_eq!(encode_raw_unicode_escape(b"abc", true).unwrap(), b"abc".to_vec());
        assert_eq!(encode_raw_unicode_escape("é".as_bytes(), true).unwrap(),
                   b"\xe9".to_vec());
        assert_eq!(encode_raw_unicode_escape("\u{65e5}".as_bytes(), true).unwrap(),
                   b"\\u65e5".to_vec());
        assert_eq!(encode_raw_unicode_escape("\u{1d11e}".as_bytes(), true).unwrap(),
                   b"\\U0001d11e".to_vec());
        // backslash and newline must survive the line-based opcode
        assert_eq!(encode_raw_unicode_escape(b"\\", true).unwrap(), b"\\u005c".to_vec());
        assert_eq!(encode_raw_unicode_escape(b"a\nb", true).unwrap(), b"a\\u000ab".to_vec());
        // invalid UTF-8: error in strict mode, passthrough otherwise
        assert_eq!(encode_raw_unicode_escape(b"ab\xffc", true),
                   Err(ErrorCode::Proto0UnicodeUtf8Only));
        assert_eq!(encode_raw_unicode_escape(b"ab\xffc", false).unwrap(),
                   b"ab\xffc".to_vec());
    }

    #[test]
    fn raw_unicode_escape_roundtrip() {
        for text in ["", "plain", "мир\\n", "日本語", "\u{1d11e}x\u{e9}", "\\u1234"] {
            let encoded = encode_raw_unicode_escape(text.as_bytes(), true).unwrap();
            assert_eq!(decode_raw_unicode_escape(&encoded).unwrap(), text);
        }
    }

    #[test]
    fn latin1() {
        assert_eq!(latin1_decode(b"a\xe9\xff"), "a\u{e9}\u{ff}");
        assert_eq!(latin1_encode("a\u{e9}\u{ff}"), Some(b"a\xe9\xff".to_vec()));
        assert_eq!(latin1_encode("\u{100}"), None);
    }
}

mod serde_tests {
    use super::*;
    use crate::{from_slice, from_value, to_value, to_vec};
    use serde_derive::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct Record {
        #[serde(rename = "Foo")]
        foo: String,
        #[serde(rename = "Bar")]
        bar: i32,
    }

    fn record() -> Record {
        Record { foo: "Qux".into(), bar: 4 }
    }

    #[test]
    fn struct_encodes_as_dict() {
        // a vec of one struct, with exact bytes at protocols 0 and 1
        let records = vec![record()];
        let p0 = to_vec(&records, SerOptions::new().protocol(0)).unwrap();
        assert_eq!(p0, b"((S\"Foo\"\nS\"Qux\"\nS\"Bar\"\nI4\ndl.");
        let p1 = to_vec(&records, SerOptions::new().protocol(1)).unwrap();
        assert_eq!(p1, b"((U\x03FooU\x03QuxU\x03BarK\x04dl.");

        // the known-lossy projection: decoding gives the dict view
        let value = value_from_slice(&p0, DeOptions::new()).unwrap();
        assert_eq!(value, list(vec![dict(vec![(s("Foo"), s("Qux")), (s("Bar"), i(4))])]));

        // but deserializing restores the struct
        let back: Vec<Record> = from_slice(&p0, DeOptions::new()).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn struct_roundtrip_all_protocols() {
        for proto in 0..=5 {
            let data = to_vec(&record(), SerOptions::new().protocol(proto)).unwrap();
            let back: Record = from_slice(&data, DeOptions::new()).unwrap();
            assert_eq!(back, record());
        }
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    enum Animal {
        Dog,
        Fish(String),
        Frog(String, u32),
        Cat { age: i64 },
    }

    #[test]
    fn enum_variants_roundtrip() {
        let animals = [
            Animal::Dog,
            Animal::Fish("carp".into()),
            Animal::Frog("basil".into(), 3),
            Animal::Cat { age: 5 },
        ];
        for animal in &animals {
            for proto in [0, 2, 4] {
                let data = to_vec(animal, SerOptions::new().protocol(proto)).unwrap();
                let back: Animal = from_slice(&data, DeOptions::new()).unwrap();
                assert_eq!(&back, animal, "protocol {}", proto);
            }
        }
        // the tuple form is what lands in the stream
        let data = to_vec(&Animal::Dog, SerOptions::new().protocol(2)).unwrap();
        assert_eq!(value_from_slice(&data, DeOptions::new()).unwrap(),
                   tup(vec![s("Dog")]));
    }

    #[test]
    fn enum_from_string_form() {
        // plain strings also deserialize into unit variants
        let data = value_to_vec(&s("Dog"), SerOptions::new()).unwrap();
        let animal: Animal = from_slice(&data, DeOptions::new()).unwrap();
        assert_eq!(animal, Animal::Dog);
    }

    #[test]
    fn options_and_maps() {
        for proto in [0, 2, 5] {
            let sopts = || SerOptions::new().protocol(proto);
            let some = to_vec(&Some(5i64), sopts()).unwrap();
            assert_eq!(from_slice::<Option<i64>>(&some, DeOptions::new()).unwrap(), Some(5));
            let none = to_vec(&None::<i64>, sopts()).unwrap();
            assert_eq!(from_slice::<Option<i64>>(&none, DeOptions::new()).unwrap(), None);

            let mut map = std::collections::HashMap::new();
            map.insert("a".to_string(), 1i64);
            map.insert("b".to_string(), 2i64);
            let data = to_vec(&map, sopts()).unwrap();
            let back: std::collections::HashMap<String, i64> =
                from_slice(&data, DeOptions::new()).unwrap();
            assert_eq!(back, map);
        }
    }

    #[test]
    fn wide_integers_become_longs() {
        let data = to_vec(&u64::MAX, SerOptions::new()).unwrap();
        assert_eq!(value_from_slice(&data, DeOptions::new()).unwrap(),
                   big("18446744073709551615"));
        assert_eq!(from_slice::<u64>(&data, DeOptions::new()).unwrap(), u64::MAX);

        assert_eq!(to_value(&(i128::from(i64::MAX) + 1)).unwrap(),
                   big("9223372036854775808"));
    }

    #[test]
    fn value_conversions() {
        assert_eq!(to_value(&record()).unwrap(),
                   dict(vec![(s("Foo"), s("Qux")), (s("Bar"), i(4))]));
        let back: Record = from_value(dict(vec![(s("Foo"), s("Qux")), (s("Bar"), i(4))]))
            .unwrap();
        assert_eq!(back, record());

        // python-only values do not cross into the serde data model
        match from_value::<i64>(class("foo", "bar")) {
            Err(Error::Syntax(ErrorCode::UnsupportedType(_))) => {}
            other => panic!("expected unsupported type error: {:?}", other),
        }
    }
}

mod props {
    use super::*;
    use quickcheck::quickcheck;

    quickcheck! {
        fn roundtrip_all_protocols(value: Value) -> bool {
            (0..=5).all(|proto| {
                let data = value_to_vec(&value, SerOptions::new().protocol(proto)).unwrap();
                value_from_slice(&data, DeOptions::new()).unwrap() == value
            })
        }

        fn truncations_report_eof(value: Value) -> bool {
            let data = value_to_vec(&value, SerOptions::new().protocol(2)).unwrap();
            (1..data.len()).all(|cut| {
                matches!(value_from_slice(&data[..cut], DeOptions::new()),
                         Err(Error::Eval(ErrorCode::EofWhileParsing, _)))
            })
        }

        fn suffixes_never_panic(value: Value) -> bool {
            let data = value_to_vec(&value, SerOptions::new().protocol(3)).unwrap();
            for start in 0..data.len() {
                let _ = value_from_slice(&data[start..], DeOptions::new());
            }
            true
        }

        fn pydict_mode_accepts_everything_host_mode_does(value: Value) -> bool {
            let data = value_to_vec(&value, SerOptions::new().protocol(2)).unwrap();
            value_from_slice(&data, DeOptions::new().py_dict()).is_ok()
        }
    }
}
