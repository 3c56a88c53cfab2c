//! Formatted input engine.
//!
//! Destinations arrive as a typed [`Dest`] slice; the family of each
//! destination (signed, unsigned, float, bytes, pointer, count) must
//! match its conversion or the call reports `ArgumentMismatch`. Matching
//! consumes from the stream a byte at a time; the first byte that cannot
//! extend the current field goes back through the pushback queue, so a
//! later conversion (or caller) sees it again.
//!
//! Decimal float text goes through `fast-float2`; hexadecimal float text
//! is parsed here.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::fmt::{parse_spec, Length, Spec, Width};
use crate::store::MemBuffer;
use crate::stream::{stdin, Stream};

/// One scan destination.
pub enum Dest<'a> {
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Isize(&'a mut isize),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    Usize(&'a mut usize),
    F32(&'a mut f32),
    F64(&'a mut f64),
    /// `%c`, `%s` and `%[...]` text; replaced, not appended to.
    Bytes(&'a mut Vec<u8>),
    Ptr(&'a mut usize),
    /// `%n`: bytes consumed so far; never counts as a matched field.
    Count(&'a mut i64),
}

enum Outcome {
    Matched,
    NoMatch,
    Eof,
}

enum FloatScan {
    Matched(f64),
    NoMatch,
    Eof,
}

struct IntScan {
    matched: bool,
    eof: bool,
    neg: bool,
    value: u64,
}

// ----------------------------------------------------------------------
// Character source
// ----------------------------------------------------------------------

struct Scanner<'s> {
    f: &'s Stream,
    consumed: i64,
}

impl Scanner<'_> {
    fn next(&mut self) -> Result<Option<u8>> {
        let c = self.f.getc()?;
        if c.is_some() {
            self.consumed += 1;
        }
        Ok(c)
    }

    /// Return a byte to the stream. Pushback depth is two; past that the
    /// byte is lost, same as the original engine.
    fn back(&mut self, byte: u8) {
        if self.f.unget(byte).is_ok() {
            self.consumed -= 1;
        }
    }

    fn next_bounded(&mut self, taken: &mut usize, limit: usize) -> Result<Option<u8>> {
        if *taken >= limit {
            return Ok(None);
        }
        let c = self.next()?;
        if c.is_some() {
            *taken += 1;
        }
        Ok(c)
    }

    /// Skip whitespace; true when the input ended instead.
    fn skip_whitespace(&mut self) -> Result<bool> {
        loop {
            match self.next()? {
                None => return Ok(true),
                Some(b) if b.is_ascii_whitespace() => {}
                Some(b) => {
                    self.back(b);
                    return Ok(false);
                }
            }
        }
    }

    /// Consume one byte equal to `lit`; a different byte goes back and
    /// reports a clean mismatch, end of input reports `Eof` so the caller
    /// can distinguish the two.
    fn match_literal(&mut self, lit: u8) -> Result<Outcome> {
        match self.next()? {
            Some(b) if b == lit => Ok(Outcome::Matched),
            Some(b) => {
                self.back(b);
                Ok(Outcome::NoMatch)
            }
            None => Ok(Outcome::Eof),
        }
    }

    /// Greedy case-insensitive word match; stops (pushing back the
    /// offender) at the first mismatch.
    fn match_ci(&mut self, word: &[u8], taken: &mut usize, limit: usize) -> Result<bool> {
        for &w in word {
            match self.next_bounded(taken, limit)? {
                Some(c) if c.to_ascii_lowercase() == w => {}
                Some(c) => {
                    self.back(c);
                    return Ok(false);
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }
}

// ----------------------------------------------------------------------
// Field scanners
// ----------------------------------------------------------------------

fn width_limit(spec: &Spec) -> usize {
    match spec.width {
        Width::Fixed(w) if w > 0 => w,
        _ => usize::MAX,
    }
}

fn digit_val(c: u8, base: u64) -> Option<u64> {
    let v = match c {
        b'0'..=b'9' => (c - b'0') as u64,
        b'a'..=b'f' => (c - b'a' + 10) as u64,
        b'A'..=b'F' => (c - b'A' + 10) as u64,
        _ => return None,
    };
    if v < base {
        Some(v)
    } else {
        None
    }
}

fn scan_int(ctx: &mut Scanner, base: u64, limit: usize) -> Result<IntScan> {
    let mut taken = 0usize;
    let mut neg = false;
    let mut sign_char: Option<u8> = None;
    let mut value: u64 = 0;
    let mut ndigits = 0usize;

    let mut cur = match ctx.next_bounded(&mut taken, limit)? {
        Some(c) => Some(c),
        None => {
            return Ok(IntScan {
                matched: false,
                eof: true,
                neg,
                value,
            })
        }
    };
    if let Some(c) = cur {
        if c == b'+' || c == b'-' {
            neg = c == b'-';
            sign_char = Some(c);
            cur = ctx.next_bounded(&mut taken, limit)?;
        }
    }

    // Radix prefix: a lone "0x" (or "0b") without digits degrades to the
    // plain zero, with the marker pushed back.
    if (base == 16 || base == 2) && cur == Some(b'0') {
        ndigits = 1;
        cur = ctx.next_bounded(&mut taken, limit)?;
        let marker = if base == 16 { b'x' } else { b'b' };
        if let Some(x) = cur {
            if x.to_ascii_lowercase() == marker {
                cur = ctx.next_bounded(&mut taken, limit)?;
                match cur {
                    Some(d) if digit_val(d, base).is_some() => {
                        ndigits = 0;
                    }
                    _ => {
                        if let Some(d) = cur {
                            ctx.back(d);
                        }
                        ctx.back(x);
                        cur = None;
                    }
                }
            }
        }
    }

    while let Some(c) = cur {
        match digit_val(c, base) {
            Some(d) => {
                value = value.wrapping_mul(base).wrapping_add(d);
                ndigits += 1;
                cur = ctx.next_bounded(&mut taken, limit)?;
            }
            None => {
                ctx.back(c);
                break;
            }
        }
    }

    if ndigits == 0 {
        if let Some(s) = sign_char {
            ctx.back(s);
        }
        return Ok(IntScan {
            matched: false,
            eof: false,
            neg,
            value: 0,
        });
    }
    Ok(IntScan {
        matched: true,
        eof: false,
        neg,
        value,
    })
}

/// Collect the longest prefix that could still be a number in the given
/// radix; the first byte that cannot extend it goes back.
fn collect_number(
    ctx: &mut Scanner,
    taken: &mut usize,
    limit: usize,
    buf: &mut Vec<u8>,
    mut cur: Option<u8>,
    hex: bool,
) -> Result<()> {
    let expmark = if hex { b'p' } else { b'e' };
    let mut seen_dot = false;
    let mut in_exp = false;
    let mut exp_sign_ok = false;
    let is_digit = |c: u8| {
        if hex {
            c.is_ascii_hexdigit()
        } else {
            c.is_ascii_digit()
        }
    };
    while let Some(c) = cur {
        let accept = if exp_sign_ok && (c == b'+' || c == b'-') {
            true
        } else if in_exp {
            c.is_ascii_digit()
        } else if is_digit(c) {
            true
        } else if c == b'.' && !seen_dot {
            true
        } else {
            c.to_ascii_lowercase() == expmark
                && buf.last().is_some_and(|&b| is_digit(b) || b == b'.')
        };
        if !accept {
            ctx.back(c);
            break;
        }
        exp_sign_ok = false;
        if !in_exp {
            if c == b'.' {
                seen_dot = true;
            } else if c.to_ascii_lowercase() == expmark {
                in_exp = true;
                exp_sign_ok = true;
            }
        }
        buf.push(c);
        cur = ctx.next_bounded(taken, limit)?;
    }
    Ok(())
}

fn hex_digit_value(c: u8) -> Option<u64> {
    match c {
        b'0'..=b'9' => Some((c - b'0') as u64),
        b'a'..=b'f' => Some((c - b'a' + 10) as u64),
        b'A'..=b'F' => Some((c - b'A' + 10) as u64),
        _ => None,
    }
}

/// Parse "[+-]0x h.hhh [p[+-]ddd]" text assembled by the scanner.
fn parse_hex_float(buf: &[u8]) -> Option<f64> {
    let mut i = 0;
    let mut neg = false;
    if let Some(&c) = buf.first() {
        if c == b'+' || c == b'-' {
            neg = c == b'-';
            i += 1;
        }
    }
    if buf.get(i) != Some(&b'0') {
        return None;
    }
    i += 1;
    match buf.get(i) {
        Some(&c) if c.to_ascii_lowercase() == b'x' => i += 1,
        _ => return None,
    }
    let mut mantissa = 0f64;
    let mut any = false;
    while let Some(&c) = buf.get(i) {
        match hex_digit_value(c) {
            Some(d) => {
                mantissa = mantissa * 16.0 + d as f64;
                any = true;
                i += 1;
            }
            None => break,
        }
    }
    if buf.get(i) == Some(&b'.') {
        i += 1;
        let mut scale = 1.0 / 16.0;
        while let Some(&c) = buf.get(i) {
            match hex_digit_value(c) {
                Some(d) => {
                    mantissa += d as f64 * scale;
                    scale /= 16.0;
                    any = true;
                    i += 1;
                }
                None => break,
            }
        }
    }
    if !any {
        return None;
    }
    let mut exp = 0i32;
    let mut exp_neg = false;
    if matches!(buf.get(i), Some(c) if c.to_ascii_lowercase() == b'p') {
        i += 1;
        if let Some(&c) = buf.get(i) {
            if c == b'+' || c == b'-' {
                exp_neg = c == b'-';
                i += 1;
            }
        }
        while let Some(&c) = buf.get(i) {
            if !c.is_ascii_digit() {
                break;
            }
            exp = exp.saturating_mul(10).saturating_add((c - b'0') as i32);
            i += 1;
        }
    }
    if exp_neg {
        exp = -exp;
    }
    let v = mantissa * 2f64.powi(exp);
    Some(if neg { -v } else { v })
}

fn scan_float(ctx: &mut Scanner, limit: usize) -> Result<FloatScan> {
    let mut taken = 0usize;
    let mut buf: Vec<u8> = Vec::new();

    let mut cur = match ctx.next_bounded(&mut taken, limit)? {
        Some(c) => Some(c),
        None => return Ok(FloatScan::Eof),
    };
    let mut neg = false;
    if let Some(c) = cur {
        if c == b'+' || c == b'-' {
            neg = c == b'-';
            buf.push(c);
            cur = ctx.next_bounded(&mut taken, limit)?;
        }
    }

    match cur {
        None => {
            if let Some(&s) = buf.first() {
                ctx.back(s);
            }
            Ok(FloatScan::NoMatch)
        }
        Some(c) if c.to_ascii_lowercase() == b'n' => {
            if ctx.match_ci(b"an", &mut taken, limit)? {
                let v = if neg { -f64::NAN } else { f64::NAN };
                Ok(FloatScan::Matched(v))
            } else {
                ctx.back(c);
                Ok(FloatScan::NoMatch)
            }
        }
        Some(c) if c.to_ascii_lowercase() == b'i' => {
            if ctx.match_ci(b"nf", &mut taken, limit)? {
                // Greedy: take the rest of "infinity" when present.
                let _ = ctx.match_ci(b"inity", &mut taken, limit)?;
                let v = if neg { f64::NEG_INFINITY } else { f64::INFINITY };
                Ok(FloatScan::Matched(v))
            } else {
                ctx.back(c);
                Ok(FloatScan::NoMatch)
            }
        }
        Some(c) => {
            let mut hex = false;
            let mut cur = Some(c);
            if c == b'0' {
                buf.push(c);
                cur = ctx.next_bounded(&mut taken, limit)?;
                if let Some(x) = cur {
                    if x.to_ascii_lowercase() == b'x' {
                        hex = true;
                        buf.push(x);
                        cur = ctx.next_bounded(&mut taken, limit)?;
                    }
                }
            }
            collect_number(ctx, &mut taken, limit, &mut buf, cur, hex)?;
            let parsed = if hex {
                parse_hex_float(&buf)
            } else {
                fast_float2::parse_partial::<f64, _>(&buf)
                    .ok()
                    .and_then(|(v, n)| if n > 0 { Some(v) } else { None })
            };
            match parsed {
                Some(v) => Ok(FloatScan::Matched(v)),
                None => Ok(FloatScan::NoMatch),
            }
        }
    }
}

// ----------------------------------------------------------------------
// Destination writers
// ----------------------------------------------------------------------

fn store_signed(dest: &mut Dest, v: i64, idx: usize) -> Result<()> {
    match dest {
        Dest::I8(p) => **p = v as i8,
        Dest::I16(p) => **p = v as i16,
        Dest::I32(p) => **p = v as i32,
        Dest::I64(p) => **p = v,
        Dest::Isize(p) => **p = v as isize,
        _ => return Err(Error::ArgumentMismatch { index: idx }),
    }
    Ok(())
}

fn store_unsigned(dest: &mut Dest, v: u64, idx: usize) -> Result<()> {
    match dest {
        Dest::U8(p) => **p = v as u8,
        Dest::U16(p) => **p = v as u16,
        Dest::U32(p) => **p = v as u32,
        Dest::U64(p) => **p = v,
        Dest::Usize(p) => **p = v as usize,
        _ => return Err(Error::ArgumentMismatch { index: idx }),
    }
    Ok(())
}

fn store_float(dest: &mut Dest, v: f64, wide: bool, idx: usize) -> Result<()> {
    match (dest, wide) {
        (Dest::F32(p), false) => **p = v as f32,
        (Dest::F64(p), true) => **p = v,
        _ => return Err(Error::ArgumentMismatch { index: idx }),
    }
    Ok(())
}

fn store_bytes(dest: &mut Dest, bytes: Vec<u8>, idx: usize) -> Result<()> {
    match dest {
        Dest::Bytes(p) => **p = bytes,
        _ => return Err(Error::ArgumentMismatch { index: idx }),
    }
    Ok(())
}

fn store_ptr(dest: &mut Dest, v: usize, idx: usize) -> Result<()> {
    match dest {
        Dest::Ptr(p) => **p = v,
        _ => return Err(Error::ArgumentMismatch { index: idx }),
    }
    Ok(())
}

fn store_count(dest: &mut Dest, v: i64, idx: usize) -> Result<()> {
    match dest {
        Dest::Count(p) => **p = v,
        _ => return Err(Error::ArgumentMismatch { index: idx }),
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Engine
// ----------------------------------------------------------------------

/// Match `fmt` against the stream, assigning into `dests` in order.
/// Returns the number of fields assigned; `ScanFailure` only when the
/// input was exhausted before the first field.
pub fn fscanf(stream: &Stream, fmt: &[u8], dests: &mut [Dest]) -> Result<usize> {
    let _held = stream.lock();
    let mut ctx = Scanner {
        f: stream,
        consumed: 0,
    };
    let mut fields = 0usize;
    let mut di = 0usize;
    let mut exhausted = false;
    let mut i = 0;

    while i < fmt.len() {
        let c = fmt[i];
        if c.is_ascii_whitespace() {
            if ctx.skip_whitespace()? {
                exhausted = true;
                break;
            }
            i += 1;
            continue;
        }
        if c != b'%' {
            match ctx.match_literal(c)? {
                Outcome::Matched => {}
                Outcome::NoMatch => break,
                Outcome::Eof => {
                    exhausted = true;
                    break;
                }
            }
            i += 1;
            continue;
        }
        i += 1;
        let (spec, used) = parse_spec(&fmt[i..], true)?;
        i += used;
        if spec.conv == b'%' {
            match ctx.match_literal(b'%')? {
                Outcome::Matched => {}
                Outcome::NoMatch => break,
                Outcome::Eof => {
                    exhausted = true;
                    break;
                }
            }
            continue;
        }

        let take_dest = !spec.flags.suppress;
        let dest_idx = di;
        if take_dest {
            if di >= dests.len() {
                return Err(Error::ArgumentMismatch { index: di });
            }
            di += 1;
        }

        if spec.conv == b'n' {
            if take_dest {
                store_count(&mut dests[dest_idx], ctx.consumed, dest_idx)?;
            }
            continue;
        }

        if !matches!(spec.conv, b'c' | b'[') && ctx.skip_whitespace()? {
            exhausted = true;
            break;
        }

        let outcome = match spec.conv {
            b'c' => {
                let want = match spec.width {
                    Width::Fixed(w) if w > 0 => w,
                    _ => 1,
                };
                let mut out = Vec::with_capacity(want);
                for _ in 0..want {
                    match ctx.next()? {
                        Some(b) => out.push(b),
                        None => break,
                    }
                }
                if out.is_empty() {
                    Outcome::Eof
                } else {
                    if take_dest {
                        store_bytes(&mut dests[dest_idx], out, dest_idx)?;
                    }
                    Outcome::Matched
                }
            }
            b's' => {
                let limit = width_limit(&spec);
                let mut taken = 0usize;
                let mut out = Vec::new();
                loop {
                    match ctx.next_bounded(&mut taken, limit)? {
                        Some(b) if !b.is_ascii_whitespace() => out.push(b),
                        Some(b) => {
                            ctx.back(b);
                            break;
                        }
                        None => break,
                    }
                }
                if out.is_empty() {
                    Outcome::Eof
                } else {
                    if take_dest {
                        store_bytes(&mut dests[dest_idx], out, dest_idx)?;
                    }
                    Outcome::Matched
                }
            }
            b'[' => {
                let set = match spec.scan_set.as_ref() {
                    Some(s) => s,
                    None => return Err(Error::BadConversion('[')),
                };
                let limit = width_limit(&spec);
                let mut taken = 0usize;
                let mut out = Vec::new();
                let mut hit_eof = false;
                loop {
                    match ctx.next_bounded(&mut taken, limit)? {
                        Some(b) if set.accepts(b) => out.push(b),
                        Some(b) => {
                            ctx.back(b);
                            break;
                        }
                        None => {
                            hit_eof = true;
                            break;
                        }
                    }
                }
                if out.is_empty() {
                    if hit_eof {
                        Outcome::Eof
                    } else {
                        Outcome::NoMatch
                    }
                } else {
                    if take_dest {
                        store_bytes(&mut dests[dest_idx], out, dest_idx)?;
                    }
                    Outcome::Matched
                }
            }
            b'd' | b'i' => {
                let scan = scan_int(&mut ctx, 10, width_limit(&spec))?;
                if scan.matched {
                    let v = scan.value as i64;
                    let v = if scan.neg { v.wrapping_neg() } else { v };
                    if take_dest {
                        store_signed(&mut dests[dest_idx], v, dest_idx)?;
                    }
                    Outcome::Matched
                } else if scan.eof {
                    Outcome::Eof
                } else {
                    Outcome::NoMatch
                }
            }
            b'u' | b'o' | b'x' | b'X' | b'b' | b'B' => {
                let base = match spec.conv {
                    b'o' => 8,
                    b'x' | b'X' => 16,
                    b'b' | b'B' => 2,
                    _ => 10,
                };
                let scan = scan_int(&mut ctx, base, width_limit(&spec))?;
                if scan.matched {
                    let v = if scan.neg {
                        scan.value.wrapping_neg()
                    } else {
                        scan.value
                    };
                    if take_dest {
                        store_unsigned(&mut dests[dest_idx], v, dest_idx)?;
                    }
                    Outcome::Matched
                } else if scan.eof {
                    Outcome::Eof
                } else {
                    Outcome::NoMatch
                }
            }
            b'p' => {
                let limit = width_limit(&spec);
                let mut taken = 0usize;
                match ctx.next_bounded(&mut taken, limit)? {
                    None => Outcome::Eof,
                    Some(b'(') => {
                        if ctx.match_ci(b"nil)", &mut taken, limit)? {
                            if take_dest {
                                store_ptr(&mut dests[dest_idx], 0, dest_idx)?;
                            }
                            Outcome::Matched
                        } else {
                            Outcome::NoMatch
                        }
                    }
                    Some(c) => {
                        ctx.back(c);
                        let scan = scan_int(&mut ctx, 16, limit)?;
                        if scan.matched {
                            if take_dest {
                                store_ptr(&mut dests[dest_idx], scan.value as usize, dest_idx)?;
                            }
                            Outcome::Matched
                        } else if scan.eof {
                            Outcome::Eof
                        } else {
                            Outcome::NoMatch
                        }
                    }
                }
            }
            // f F e E g G a A
            _ => {
                let wide = !matches!(spec.length, Length::None);
                match scan_float(&mut ctx, width_limit(&spec))? {
                    FloatScan::Matched(v) => {
                        if take_dest {
                            store_float(&mut dests[dest_idx], v, wide, dest_idx)?;
                        }
                        Outcome::Matched
                    }
                    FloatScan::NoMatch => Outcome::NoMatch,
                    FloatScan::Eof => Outcome::Eof,
                }
            }
        };

        match outcome {
            Outcome::Matched => {
                if take_dest {
                    fields += 1;
                }
            }
            Outcome::NoMatch => break,
            Outcome::Eof => {
                exhausted = true;
                break;
            }
        }
    }

    if exhausted && fields == 0 {
        return Err(Error::ScanFailure);
    }
    Ok(fields)
}

/// Scan the process standard input.
pub fn scanf(fmt: &[u8], dests: &mut [Dest]) -> Result<usize> {
    fscanf(&stdin(), fmt, dests)
}

/// Scan a byte slice through a read-only fixed-memory stream.
pub fn sscanf(input: &[u8], fmt: &[u8], dests: &mut [Dest]) -> Result<usize> {
    let region: MemBuffer = Arc::new(Mutex::new(input.to_vec()));
    let stream = Stream::open_memfile_shared(region, "r")?;
    fscanf(&stream, fmt, dests)
}
