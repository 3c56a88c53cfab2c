//! Formatted output engine.
//!
//! Arguments arrive as a typed [`Value`] slice instead of C variadics;
//! a specifier that does not match its argument is a reported error, not
//! undefined behavior. The engine holds the stream lock for the whole
//! template and emits through the ordinary write path, so buffering and
//! store semantics apply unchanged.

use std::cell::Cell;

use crate::error::{Error, Result};
use crate::fmt::{decimal, parse_spec, Length, Precision, Spec, Width};
use crate::stream::{stdout, Stream};

/// One formatted argument.
#[derive(Clone, Copy)]
pub enum Value<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    Str(&'a [u8]),
    Ptr(usize),
    /// Sink for `%n`: receives the count of bytes emitted so far.
    Count(&'a Cell<i64>),
}

impl From<i8> for Value<'_> {
    fn from(v: i8) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i16> for Value<'_> {
    fn from(v: i16) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<isize> for Value<'_> {
    fn from(v: isize) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u32> for Value<'_> {
    fn from(v: u32) -> Self {
        Value::Uint(v as u64)
    }
}
impl From<u64> for Value<'_> {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}
impl From<usize> for Value<'_> {
    fn from(v: usize) -> Self {
        Value::Uint(v as u64)
    }
}
impl From<f32> for Value<'_> {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}
impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Str(v.as_bytes())
    }
}
impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(v: &'a [u8]) -> Self {
        Value::Str(v)
    }
}

struct Args<'l, 'v> {
    list: &'l [Value<'v>],
    next: usize,
}

impl<'l, 'v> Args<'l, 'v> {
    fn take(&mut self) -> Result<(usize, Value<'v>)> {
        let idx = self.next;
        match self.list.get(idx) {
            Some(&v) => {
                self.next += 1;
                Ok((idx, v))
            }
            None => Err(Error::ArgumentMismatch { index: idx }),
        }
    }
}

fn int_value(v: Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(i),
        Value::Uint(u) => Some(u as i64),
        Value::Char(c) => Some(c as i64),
        _ => None,
    }
}

fn uint_value(v: Value) -> Option<u64> {
    match v {
        Value::Int(i) => Some(i as u64),
        Value::Uint(u) => Some(u),
        Value::Char(c) => Some(c as u64),
        _ => None,
    }
}

fn mask_signed(v: i64, len: Length) -> i64 {
    match len {
        Length::None => v as i32 as i64,
        Length::Hh | Length::Exact(8) | Length::Fast(8) => v as i8 as i64,
        Length::H | Length::Exact(16) => v as i16 as i64,
        Length::Exact(32) => v as i32 as i64,
        _ => v,
    }
}

fn mask_unsigned(v: u64, len: Length) -> u64 {
    match len {
        Length::None => v as u32 as u64,
        Length::Hh | Length::Exact(8) | Length::Fast(8) => v as u8 as u64,
        Length::H | Length::Exact(16) => v as u16 as u64,
        Length::Exact(32) => v as u32 as u64,
        _ => v,
    }
}

fn to_digits(mut v: u64, base: u64, upper: bool) -> Vec<u8> {
    let table: &[u8; 16] = if upper {
        b"0123456789ABCDEF"
    } else {
        b"0123456789abcdef"
    };
    if v == 0 {
        return vec![b'0'];
    }
    let mut out = Vec::new();
    while v > 0 {
        out.push(table[(v % base) as usize]);
        v /= base;
    }
    out.reverse();
    out
}

fn pad(mut body: Vec<u8>, width: usize, left: bool) -> Vec<u8> {
    if body.len() >= width {
        return body;
    }
    let fill = width - body.len();
    if left {
        body.resize(body.len() + fill, b' ');
        body
    } else {
        let mut out = vec![b' '; fill];
        out.append(&mut body);
        out
    }
}

/// Assemble sign + prefix + digits with zero-extension between the
/// prefix and the digit stream, then space-pad to width.
fn assemble_numeric(
    sign: &[u8],
    prefix: &[u8],
    mut digits: Vec<u8>,
    precision: Option<usize>,
    zero: bool,
    width: usize,
    left: bool,
) -> Vec<u8> {
    if let Some(p) = precision {
        if digits == b"0" && p == 0 {
            digits.clear();
        }
        while digits.len() < p {
            digits.insert(0, b'0');
        }
    }
    let mut body = Vec::with_capacity(width.max(sign.len() + prefix.len() + digits.len()));
    body.extend_from_slice(sign);
    body.extend_from_slice(prefix);
    // '-' and an explicit precision both disable zero-extension.
    if zero && !left && precision.is_none() {
        let content = sign.len() + prefix.len() + digits.len();
        if width > content {
            body.resize(body.len() + width - content, b'0');
        }
    }
    body.extend_from_slice(&digits);
    pad(body, width, left)
}

fn render_float(
    spec: &Spec,
    v: f64,
    width: usize,
    left: bool,
    precision: Option<usize>,
) -> Vec<u8> {
    let upper = spec.conv.is_ascii_uppercase();
    let kind = spec.conv.to_ascii_lowercase();
    let alt = spec.flags.alt;
    let sign: &[u8] = if v.is_sign_negative() {
        b"-"
    } else if spec.flags.plus {
        b"+"
    } else if spec.flags.space {
        b" "
    } else {
        b""
    };

    if v.is_nan() || v.is_infinite() {
        let token: &[u8] = match (v.is_nan(), upper) {
            (true, false) => b"nan",
            (true, true) => b"NAN",
            (false, false) => b"inf",
            (false, true) => b"INF",
        };
        let mut body = sign.to_vec();
        body.extend_from_slice(token);
        return pad(body, width, left);
    }

    let a = v.abs();
    let body = match kind {
        b'f' => {
            let d = decimal::decompose(a);
            if spec.flags.roundtrip {
                decimal::fixed_shortest(&d, precision.unwrap_or(0), alt)
            } else {
                decimal::fixed(&d, precision.unwrap_or(6), alt)
            }
        }
        b'e' => {
            let d = decimal::decompose(a);
            if spec.flags.roundtrip {
                decimal::exponential_shortest(&d, precision.unwrap_or(0), upper, alt)
            } else {
                decimal::exponential(&d, precision.unwrap_or(6), upper, alt)
            }
        }
        b'g' => {
            let d = decimal::decompose(a);
            if spec.flags.roundtrip {
                decimal::general_shortest(&d, upper, alt)
            } else {
                decimal::general(&d, precision.unwrap_or(6), upper, alt)
            }
        }
        _ => decimal::hex_float(a, precision, upper, alt),
    };

    let content = sign.len() + body.len();
    let mut out = sign.to_vec();
    if spec.flags.zero && !left && width > content {
        out.resize(out.len() + width - content, b'0');
    }
    out.extend_from_slice(&body);
    pad(out, width, left)
}

fn render_spec(spec: &Spec, args: &mut Args) -> Result<Vec<u8>> {
    let mut left = spec.flags.left;
    let width = match spec.width {
        Width::None => 0,
        Width::Fixed(w) => w,
        Width::FromArg => {
            let (idx, v) = args.take()?;
            let w = int_value(v).ok_or(Error::ArgumentMismatch { index: idx })?;
            if w < 0 {
                left = true;
                w.unsigned_abs() as usize
            } else {
                w as usize
            }
        }
    };
    let precision = match spec.precision {
        Precision::None => None,
        Precision::Fixed(p) => Some(p),
        Precision::FromArg => {
            let (idx, v) = args.take()?;
            let p = int_value(v).ok_or(Error::ArgumentMismatch { index: idx })?;
            if p < 0 {
                None
            } else {
                Some(p as usize)
            }
        }
    };

    match spec.conv {
        b'%' => Ok(pad(b"%".to_vec(), width, left)),
        b'c' => {
            let (idx, v) = args.take()?;
            let byte = match v {
                Value::Char(c) => c,
                other => int_value(other)
                    .map(|i| i as u8)
                    .ok_or(Error::ArgumentMismatch { index: idx })?,
            };
            Ok(pad(vec![byte], width, left))
        }
        b's' => {
            let (idx, v) = args.take()?;
            let text = match v {
                Value::Str(s) => s,
                _ => return Err(Error::ArgumentMismatch { index: idx }),
            };
            let text = match precision {
                Some(p) if p < text.len() => &text[..p],
                _ => text,
            };
            Ok(pad(text.to_vec(), width, left))
        }
        b'm' => {
            let text = crate::sys::errno_message(crate::sys::last_errno()).into_bytes();
            let text = match precision {
                Some(p) if p < text.len() => text[..p].to_vec(),
                _ => text,
            };
            Ok(pad(text, width, left))
        }
        b'd' | b'i' => {
            let (idx, v) = args.take()?;
            let raw = int_value(v).ok_or(Error::ArgumentMismatch { index: idx })?;
            let v = mask_signed(raw, spec.length);
            let sign: &[u8] = if v < 0 {
                b"-"
            } else if spec.flags.plus {
                b"+"
            } else if spec.flags.space {
                b" "
            } else {
                b""
            };
            let digits = to_digits(v.unsigned_abs(), 10, false);
            Ok(assemble_numeric(
                sign,
                b"",
                digits,
                precision,
                spec.flags.zero,
                width,
                left,
            ))
        }
        b'u' | b'o' | b'x' | b'X' | b'b' | b'B' => {
            let (idx, v) = args.take()?;
            let raw = uint_value(v).ok_or(Error::ArgumentMismatch { index: idx })?;
            let v = mask_unsigned(raw, spec.length);
            let (base, upper) = match spec.conv {
                b'o' => (8, false),
                b'x' => (16, false),
                b'X' => (16, true),
                b'b' => (2, false),
                b'B' => (2, true),
                _ => (10, false),
            };
            let digits = to_digits(v, base, upper);
            let prefix: &[u8] = if spec.flags.alt {
                match spec.conv {
                    b'o' if digits.first() != Some(&b'0') => b"0",
                    b'x' if v != 0 => b"0x",
                    b'X' if v != 0 => b"0X",
                    b'b' if v != 0 => b"0b",
                    b'B' if v != 0 => b"0B",
                    _ => b"",
                }
            } else {
                b""
            };
            Ok(assemble_numeric(
                b"",
                prefix,
                digits,
                precision,
                spec.flags.zero,
                width,
                left,
            ))
        }
        b'p' => {
            let (idx, v) = args.take()?;
            let addr = match v {
                Value::Ptr(p) => p as u64,
                other => uint_value(other).ok_or(Error::ArgumentMismatch { index: idx })?,
            };
            if addr == 0 {
                return Ok(pad(b"(nil)".to_vec(), width, left));
            }
            let digits = to_digits(addr, 16, false);
            Ok(assemble_numeric(
                b"",
                b"0x",
                digits,
                precision,
                spec.flags.zero,
                width,
                left,
            ))
        }
        b'f' | b'F' | b'e' | b'E' | b'g' | b'G' | b'a' | b'A' => {
            let (idx, v) = args.take()?;
            let v = match v {
                Value::Float(x) => x,
                _ => return Err(Error::ArgumentMismatch { index: idx }),
            };
            Ok(render_float(spec, v, width, left, precision))
        }
        other => Err(Error::BadConversion(other as char)),
    }
}

/// Expand `fmt` against `args`, writing through `stream`. Returns the
/// number of bytes the expansion produced (even where a bounded store
/// discarded some of them).
pub fn fprintf(stream: &Stream, fmt: &[u8], args: &[Value]) -> Result<usize> {
    let _held = stream.lock();
    let mut args = Args { list: args, next: 0 };
    let mut printed = 0usize;
    let mut i = 0;
    while i < fmt.len() {
        if fmt[i] != b'%' {
            let run = fmt[i..]
                .iter()
                .position(|&b| b == b'%')
                .unwrap_or(fmt.len() - i);
            stream.write(&fmt[i..i + run])?;
            printed += run;
            i += run;
            continue;
        }
        i += 1;
        let (spec, used) = parse_spec(&fmt[i..], false)?;
        i += used;
        if spec.conv == b'n' {
            let (idx, v) = args.take()?;
            match v {
                Value::Count(cell) => cell.set(printed as i64),
                _ => return Err(Error::ArgumentMismatch { index: idx }),
            }
            continue;
        }
        let body = render_spec(&spec, &mut args)?;
        stream.write(&body)?;
        printed += body.len();
    }
    Ok(printed)
}

/// Expand to the process standard output.
pub fn printf(fmt: &[u8], args: &[Value]) -> Result<usize> {
    fprintf(&stdout(), fmt, args)
}

/// Expand into a fresh vector (the asprintf shape).
pub fn format_to_vec(fmt: &[u8], args: &[Value]) -> Result<Vec<u8>> {
    let (stream, handle) = Stream::open_memstream()?;
    fprintf(&stream, fmt, args)?;
    stream.close()?;
    Ok(handle.contents())
}

/// Expand into a caller buffer, truncating but always NUL-terminating.
/// Returns the full would-be length, so `ret >= dst.len()` detects
/// truncation.
pub fn snprintf(dst: &mut [u8], fmt: &[u8], args: &[Value]) -> Result<usize> {
    // A robust fixed-memory stream absorbs the overflow while the
    // engine keeps counting, which is exactly the would-be length.
    let (stream, region) = Stream::open_memfile(dst.len(), "w0")?;
    let total = fprintf(&stream, fmt, args)?;
    stream.close()?;
    if !dst.is_empty() {
        let region = region.lock();
        let n = (dst.len() - 1).min(total);
        dst[..n].copy_from_slice(&region[..n]);
        dst[n] = 0;
    }
    Ok(total)
}
