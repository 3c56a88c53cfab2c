//! Formatted I/O: template parsing shared by the output and input engines.
//!
//! Specifier grammar:
//! `% flags width .precision length conversion`
//! with `r` (round-trip floats) as an extra flag on output, `*` meaning
//! width-from-argument on output but assignment suppression on input, and
//! `[...]` bracket sets on input only.

pub mod decimal;
pub mod printf;
pub mod scanf;

use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flags {
    pub left: bool,
    pub plus: bool,
    pub space: bool,
    pub alt: bool,
    pub zero: bool,
    /// `r`: render floats with shortest round-trip digits.
    pub roundtrip: bool,
    /// Scan only: `*` consumes input without assigning.
    pub suppress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Width {
    None,
    Fixed(usize),
    FromArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Precision {
    None,
    Fixed(usize),
    FromArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Length {
    None,
    /// `hh`: 8-bit.
    Hh,
    /// `h` (and legacy `H`): 16-bit.
    H,
    /// `l` (and legacy `D`): 64-bit.
    L,
    /// `ll` (and legacy `DD`): 64-bit.
    Ll,
    /// `z`: pointer-sized.
    Z,
    /// `j`: widest integer.
    J,
    /// `t`: pointer-difference width.
    T,
    /// `L`: long double on the C side; floats are f64 here regardless.
    BigL,
    /// `w<bits>`: exact-width integer.
    Exact(u32),
    /// `wf<bits>`: fast-width integer (8 stays 8, the rest are 64).
    Fast(u32),
}

/// Membership table for a `[...]` bracket set.
pub(crate) struct ScanSet {
    negated: bool,
    table: Box<[bool; 256]>,
}

impl ScanSet {
    pub(crate) fn accepts(&self, byte: u8) -> bool {
        self.table[byte as usize] != self.negated
    }
}

pub(crate) struct Spec {
    pub flags: Flags,
    pub width: Width,
    pub precision: Precision,
    pub length: Length,
    pub conv: u8,
    pub scan_set: Option<ScanSet>,
}

fn parse_digits(fmt: &[u8], i: &mut usize) -> Option<usize> {
    let start = *i;
    let mut value: usize = 0;
    while let Some(&c) = fmt.get(*i) {
        if !c.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add((c - b'0') as usize);
        *i += 1;
    }
    if *i == start {
        None
    } else {
        Some(value)
    }
}

fn parse_length(fmt: &[u8], i: &mut usize) -> Length {
    match fmt.get(*i) {
        Some(b'h') => {
            *i += 1;
            if fmt.get(*i) == Some(&b'h') {
                *i += 1;
                Length::Hh
            } else {
                Length::H
            }
        }
        Some(b'l') => {
            *i += 1;
            if fmt.get(*i) == Some(&b'l') {
                *i += 1;
                Length::Ll
            } else {
                Length::L
            }
        }
        Some(b'z') => {
            *i += 1;
            Length::Z
        }
        Some(b'j') => {
            *i += 1;
            Length::J
        }
        Some(b't') => {
            *i += 1;
            Length::T
        }
        Some(b'L') => {
            *i += 1;
            Length::BigL
        }
        Some(b'H') => {
            *i += 1;
            Length::H
        }
        Some(b'D') => {
            *i += 1;
            if fmt.get(*i) == Some(&b'D') {
                *i += 1;
                Length::Ll
            } else {
                Length::L
            }
        }
        Some(b'w') => {
            *i += 1;
            let fast = fmt.get(*i) == Some(&b'f');
            if fast {
                *i += 1;
            }
            let bits = parse_digits(fmt, i).unwrap_or(0) as u32;
            if fast {
                Length::Fast(bits)
            } else {
                Length::Exact(bits)
            }
        }
        _ => Length::None,
    }
}

fn parse_scan_set(fmt: &[u8]) -> Result<(ScanSet, usize)> {
    let mut i = 0;
    let negated = fmt.first() == Some(&b'^');
    if negated {
        i += 1;
    }
    let mut table = Box::new([false; 256]);
    let mut first = true;
    loop {
        let c = match fmt.get(i) {
            Some(&c) => c,
            None => return Err(Error::BadConversion('[')),
        };
        if c == b']' && !first {
            i += 1;
            break;
        }
        first = false;
        // Range form a-z; a trailing '-' is a literal member.
        if fmt.get(i + 1) == Some(&b'-') {
            if let Some(&hi) = fmt.get(i + 2) {
                if hi != b']' {
                    let (lo, hi) = if c <= hi { (c, hi) } else { (hi, c) };
                    for b in lo..=hi {
                        table[b as usize] = true;
                    }
                    i += 3;
                    continue;
                }
            }
        }
        table[c as usize] = true;
        i += 1;
    }
    Ok((ScanSet { negated, table }, i))
}

const OUTPUT_CONVERSIONS: &[u8] = b"%csdiuobBxXpnmfFeEgGaA";
const INPUT_CONVERSIONS: &[u8] = b"%csdiuobBxXpnfFeEgGaA[";

/// Parse one specifier starting just past `%`. Returns the spec and how
/// many bytes of `fmt` it covered.
pub(crate) fn parse_spec(fmt: &[u8], scan: bool) -> Result<(Spec, usize)> {
    let mut i = 0;
    let mut flags = Flags::default();
    if scan {
        if fmt.first() == Some(&b'*') {
            flags.suppress = true;
            i += 1;
        }
    } else {
        loop {
            match fmt.get(i) {
                Some(b'-') => flags.left = true,
                Some(b'+') => flags.plus = true,
                Some(b' ') => flags.space = true,
                Some(b'#') => flags.alt = true,
                Some(b'0') => flags.zero = true,
                Some(b'r') => flags.roundtrip = true,
                _ => break,
            }
            i += 1;
        }
    }

    let width = if !scan && fmt.get(i) == Some(&b'*') {
        i += 1;
        Width::FromArg
    } else {
        match parse_digits(fmt, &mut i) {
            Some(w) => Width::Fixed(w),
            None => Width::None,
        }
    };

    let precision = if !scan && fmt.get(i) == Some(&b'.') {
        i += 1;
        if fmt.get(i) == Some(&b'*') {
            i += 1;
            Precision::FromArg
        } else {
            Precision::Fixed(parse_digits(fmt, &mut i).unwrap_or(0))
        }
    } else {
        Precision::None
    };

    let length = parse_length(fmt, &mut i);

    let conv = match fmt.get(i) {
        Some(&c) => c,
        None => return Err(Error::BadConversion('\0')),
    };
    i += 1;

    let allowed = if scan {
        INPUT_CONVERSIONS
    } else {
        OUTPUT_CONVERSIONS
    };
    if !allowed.contains(&conv) {
        return Err(Error::BadConversion(conv as char));
    }

    let scan_set = if scan && conv == b'[' {
        let (set, used) = parse_scan_set(&fmt[i..])?;
        i += used;
        Some(set)
    } else {
        None
    };

    Ok((
        Spec {
            flags,
            width,
            precision,
            length,
            conv,
            scan_set,
        },
        i,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_conversion() {
        let (spec, used) = parse_spec(b"d", false).unwrap();
        assert_eq!(spec.conv, b'd');
        assert_eq!(used, 1);
        assert_eq!(spec.width, Width::None);
        assert_eq!(spec.precision, Precision::None);
    }

    #[test]
    fn test_parse_full_output_spec() {
        let (spec, used) = parse_spec(b"-+0#r12.4llx tail", false).unwrap();
        assert!(spec.flags.left && spec.flags.plus && spec.flags.zero);
        assert!(spec.flags.alt && spec.flags.roundtrip);
        assert_eq!(spec.width, Width::Fixed(12));
        assert_eq!(spec.precision, Precision::Fixed(4));
        assert_eq!(spec.length, Length::Ll);
        assert_eq!(spec.conv, b'x');
        assert_eq!(used, 12);
    }

    #[test]
    fn test_bare_dot_means_zero_precision() {
        let (spec, _) = parse_spec(b".f", false).unwrap();
        assert_eq!(spec.precision, Precision::Fixed(0));
    }

    #[test]
    fn test_star_width_and_precision() {
        let (spec, _) = parse_spec(b"*.*d", false).unwrap();
        assert_eq!(spec.width, Width::FromArg);
        assert_eq!(spec.precision, Precision::FromArg);
    }

    #[test]
    fn test_exact_and_fast_width_modifiers() {
        let (spec, _) = parse_spec(b"w16d", false).unwrap();
        assert_eq!(spec.length, Length::Exact(16));
        let (spec, _) = parse_spec(b"wf32u", false).unwrap();
        assert_eq!(spec.length, Length::Fast(32));
    }

    #[test]
    fn test_scan_suppress_flag() {
        let (spec, _) = parse_spec(b"*d", true).unwrap();
        assert!(spec.flags.suppress);
        assert_eq!(spec.conv, b'd');
    }

    #[test]
    fn test_scan_set_with_range_and_negation() {
        let (spec, used) = parse_spec(b"[^a-c:]", true).unwrap();
        let set = spec.scan_set.unwrap();
        assert!(!set.accepts(b'a') && !set.accepts(b'b') && !set.accepts(b':'));
        assert!(set.accepts(b'z'));
        assert_eq!(used, 7);
    }

    #[test]
    fn test_scan_set_leading_bracket_is_literal() {
        let (spec, _) = parse_spec(b"[]x]", true).unwrap();
        let set = spec.scan_set.unwrap();
        assert!(set.accepts(b']') && set.accepts(b'x'));
        assert!(!set.accepts(b'y'));
    }

    #[test]
    fn test_unknown_conversion_rejected() {
        assert!(matches!(
            parse_spec(b"q", false),
            Err(Error::BadConversion('q'))
        ));
        assert!(matches!(parse_spec(b"", false), Err(Error::BadConversion(_))));
    }

    #[test]
    fn test_legacy_decimal_aliases() {
        let (spec, _) = parse_spec(b"Dd", false).unwrap();
        assert_eq!(spec.length, Length::L);
        let (spec, _) = parse_spec(b"DDd", false).unwrap();
        assert_eq!(spec.length, Length::Ll);
        let (spec, _) = parse_spec(b"Hd", false).unwrap();
        assert_eq!(spec.length, Length::H);
    }
}
