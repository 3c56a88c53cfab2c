//! Integration test: formatted I/O conformance
//!
//! Drives the printf and scanf engines end to end through real streams:
//! growable memory sinks for output, fixed-memory sources for input.
//!
//! Run: cargo test -p ferrio-core --test format_conformance_test

use ferrio_core::{format_to_vec, fprintf, fscanf, snprintf, Dest, Error, Stream, Value};

fn fmt(template: &[u8], args: &[Value]) -> Vec<u8> {
    format_to_vec(template, args).expect("format failed")
}

// ---------------------------------------------------------------------------
// 1. Integer conversions
// ---------------------------------------------------------------------------

#[test]
fn integer_matrix() {
    assert_eq!(fmt(b"%d", &[42.into()]), b"42");
    assert_eq!(fmt(b"%+d", &[42.into()]), b"+42");
    assert_eq!(fmt(b"% d", &[42.into()]), b" 42");
    assert_eq!(fmt(b"%d", &[(-42).into()]), b"-42");
    assert_eq!(fmt(b"%08d", &[(-42).into()]), b"-0000042");
    assert_eq!(fmt(b"%-8d|", &[42.into()]), b"42      |");
    assert_eq!(fmt(b"%.5d", &[42.into()]), b"00042");
    assert_eq!(fmt(b"%#x %#X %#o %#b", &[
        Value::Uint(48879),
        Value::Uint(48879),
        Value::Uint(9),
        Value::Uint(5),
    ]), b"0xbeef 0XBEEF 011 0b101");
    assert_eq!(fmt(b"%hhd", &[300.into()]), b"44");
    assert_eq!(fmt(b"%hu", &[Value::Uint(70000)]), b"4464");
}

#[test]
fn zero_with_zero_precision_is_empty() {
    assert_eq!(fmt(b"[%.0d]", &[0.into()]), b"[]");
    assert_eq!(fmt(b"[%.d]", &[0.into()]), b"[]");
    assert_eq!(fmt(b"[%.0d]", &[7.into()]), b"[7]");
}

// ---------------------------------------------------------------------------
// 2. Float conversions
// ---------------------------------------------------------------------------

#[test]
fn float_matrix() {
    assert_eq!(fmt(b"%f", &[1.5f64.into()]), b"1.500000");
    assert_eq!(fmt(b"%.2f", &[3.14159f64.into()]), b"3.14");
    assert_eq!(fmt(b"%e", &[12345.678f64.into()]), b"1.234568e+04");
    assert_eq!(fmt(b"%g", &[0.0001f64.into()]), b"0.0001");
    assert_eq!(fmt(b"%g", &[0.00001f64.into()]), b"1e-05");
    assert_eq!(fmt(b"%G", &[12345678.0f64.into()]), b"1.23457E+07");
    assert_eq!(fmt(b"%a", &[1.0f64.into()]), b"0x1p+0");
}

#[test]
fn float_specials_ignore_zero_padding() {
    assert_eq!(fmt(b"%08f", &[f64::NAN.into()]), b"     nan");
    assert_eq!(fmt(b"%08F", &[f64::INFINITY.into()]), b"     INF");
    assert_eq!(fmt(b"%+f", &[f64::NEG_INFINITY.into()]), b"-inf");
}

#[test]
fn roundtrip_flag_produces_shortest_digits() {
    assert_eq!(fmt(b"%rg", &[0.3f64.into()]), b"0.3");
    assert_eq!(fmt(b"%rg", &[1e300f64.into()]), b"1e+300");
    assert_eq!(fmt(b"%rf", &[0.1f64.into()]), b"0.1");
}

// ---------------------------------------------------------------------------
// 3. Strings, chars, pointers, counts
// ---------------------------------------------------------------------------

#[test]
fn text_and_pointer_conversions() {
    assert_eq!(fmt(b"%s", &["hi".into()]), b"hi");
    assert_eq!(fmt(b"%.3s", &["abcdef".into()]), b"abc");
    assert_eq!(fmt(b"%8s|", &["hi".into()]), b"      hi|");
    assert_eq!(fmt(b"%c", &[Value::Char(b'Z')]), b"Z");
    assert_eq!(fmt(b"%p", &[Value::Ptr(0)]), b"(nil)");
    assert_eq!(fmt(b"%p", &[Value::Ptr(0x1f)]), b"0x1f");
}

#[test]
fn count_records_bytes_so_far() {
    use std::cell::Cell;
    let seen = Cell::new(0i64);
    let out = fmt(b"ab%dcd%n!", &[7.into(), Value::Count(&seen)]);
    assert_eq!(out, b"ab7cd!");
    assert_eq!(seen.get(), 5);
}

// ---------------------------------------------------------------------------
// 4. Bounded output
// ---------------------------------------------------------------------------

#[test]
fn snprintf_truncates_and_reports_full_length() {
    let mut dst = [0u8; 8];
    let total = snprintf(&mut dst, b"%s, %s!", &["Mello".into(), "Nerds".into()])
        .expect("snprintf failed");
    assert_eq!(total, 13);
    assert_eq!(&dst, b"Mello, \0");
}

#[test]
fn fprintf_counts_bytes_on_stream() {
    let (f, handle) = Stream::open_memstream().expect("memstream");
    let n = fprintf(&f, b"<%05.2f>", &[3.14159f64.into()]).expect("fprintf");
    f.flush().expect("flush");
    assert_eq!(n, 7);
    assert_eq!(handle.contents(), b"<03.14>");
}

// ---------------------------------------------------------------------------
// 5. Scanning
// ---------------------------------------------------------------------------

fn scan(input: &[u8], template: &[u8], dests: &mut [Dest]) -> usize {
    ferrio_core::sscanf(input, template, dests).expect("sscanf failed")
}

#[test]
fn scan_mixed_record() {
    let mut host = Vec::new();
    let mut port = 0u16;
    let mut load = 0f64;
    let got = scan(
        b"db-03:5432 load=0.75",
        b"%[^:]:%hu load=%lf",
        &mut [
            Dest::Bytes(&mut host),
            Dest::U16(&mut port),
            Dest::F64(&mut load),
        ],
    );
    assert_eq!(got, 3);
    assert_eq!(host, b"db-03");
    assert_eq!(port, 5432);
    assert_eq!(load, 0.75);
}

#[test]
fn scan_stops_at_first_mismatch() {
    let mut a = 0i32;
    let mut b = 0i32;
    let got = scan(b"5 apples", b"%d %d", &mut [Dest::I32(&mut a), Dest::I32(&mut b)]);
    assert_eq!(got, 1);
    assert_eq!(a, 5);
}

#[test]
fn scan_of_exhausted_input_is_an_error() {
    let mut a = 0i32;
    assert!(matches!(
        ferrio_core::sscanf(b"", b"%d", &mut [Dest::I32(&mut a)]),
        Err(Error::ScanFailure)
    ));
}

#[test]
fn scan_from_stream_continues_where_it_left_off() {
    let (f, handle) = Stream::open_memstream().expect("memstream");
    fprintf(&f, b"10 20 rest", &[]).expect("fprintf");
    f.flush().expect("flush");
    let region: ferrio_core::MemBuffer =
        std::sync::Arc::new(parking_lot::Mutex::new(handle.contents()));
    let f = Stream::open_memfile_shared(region, "r").expect("reopen input");

    let mut a = 0i32;
    assert_eq!(fscanf(&f, b"%d", &mut [Dest::I32(&mut a)]).expect("scan"), 1);
    let mut b = 0i32;
    assert_eq!(fscanf(&f, b"%d", &mut [Dest::I32(&mut b)]).expect("scan"), 1);
    assert_eq!((a, b), (10, 20));
    let mut tail = Vec::new();
    assert_eq!(
        fscanf(&f, b"%s", &mut [Dest::Bytes(&mut tail)]).expect("scan"),
        1
    );
    assert_eq!(tail, b"rest");
}

// ---------------------------------------------------------------------------
// 6. Format then parse round trips
// ---------------------------------------------------------------------------

#[test]
fn float_survives_text_round_trip() {
    for &v in &[0.1f64, 2.0 / 3.0, 1e-300, 6.02214076e23] {
        let text = fmt(b"%rg", &[v.into()]);
        let mut back = 0f64;
        assert_eq!(scan(&text, b"%lg", &mut [Dest::F64(&mut back)]), 1);
        assert_eq!(v.to_bits(), back.to_bits());
    }
}
