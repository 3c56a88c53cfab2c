//! Decimal and hexadecimal float rendering.
//!
//! A finite non-negative double is decomposed into its shortest
//! round-trip digit string and a decimal exponent (via `ryu`), and every
//! notation is derived from that pair. Truncation below the available
//! digits rounds half-to-even on the digit stream; digits past the
//! shortest representation are zeros by construction.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Decimal {
    /// ASCII significand digits, no leading or trailing zeros (just "0"
    /// for zero).
    pub digits: Vec<u8>,
    /// Value = digits * 10^exp10.
    pub exp10: i32,
}

impl Decimal {
    /// Exponent of the leading digit: value = d.ddd * 10^k.
    pub(crate) fn leading_exponent(&self) -> i32 {
        self.digits.len() as i32 + self.exp10 - 1
    }

    pub(crate) fn is_zero(&self) -> bool {
        self.digits == b"0"
    }
}

/// Shortest round-trip decomposition of a finite non-negative double.
pub(crate) fn decompose(v: f64) -> Decimal {
    let mut buf = ryu::Buffer::new();
    let text = buf.format_finite(v).as_bytes().to_vec();
    let (mantissa, exp) = match text.iter().position(|&b| b == b'e' || b == b'E') {
        Some(i) => {
            let e = std::str::from_utf8(&text[i + 1..])
                .ok()
                .and_then(|s| s.parse::<i32>().ok())
                .unwrap_or(0);
            (&text[..i], e)
        }
        None => (&text[..], 0),
    };
    let (int_part, frac_part) = match mantissa.iter().position(|&b| b == b'.') {
        Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
        None => (mantissa, &b""[..]),
    };
    let mut digits: Vec<u8> = int_part.iter().chain(frac_part.iter()).copied().collect();
    let mut exp10 = exp - frac_part.len() as i32;
    while digits.len() > 1 && digits[0] == b'0' {
        digits.remove(0);
    }
    while digits.len() > 1 && digits.last() == Some(&b'0') {
        digits.pop();
        exp10 += 1;
    }
    if digits == b"0" {
        exp10 = 0;
    }
    Decimal { digits, exp10 }
}

/// Keep the first `keep` digits, rounding half-to-even against the rest.
/// Returns the kept digits and whether a carry grew the number by one
/// decimal place ("999" -> "1000").
fn round_at(digits: &[u8], keep: i32) -> (Vec<u8>, bool) {
    let n = digits.len() as i32;
    if keep >= n {
        return (digits.to_vec(), false);
    }
    if keep < 0 {
        return (Vec::new(), false);
    }
    let k = keep as usize;
    let first_dropped = digits[k];
    let rest_nonzero = digits[k + 1..].iter().any(|&b| b != b'0');
    let round_up = first_dropped > b'5'
        || (first_dropped == b'5'
            && (rest_nonzero || (k > 0 && (digits[k - 1] - b'0') % 2 == 1)));
    let mut kept = digits[..k].to_vec();
    if !round_up {
        return (kept, false);
    }
    for i in (0..kept.len()).rev() {
        if kept[i] == b'9' {
            kept[i] = b'0';
        } else {
            kept[i] += 1;
            return (kept, false);
        }
    }
    kept.insert(0, b'1');
    (kept, true)
}

/// Fixed notation with exactly `frac` fraction digits.
pub(crate) fn fixed(d: &Decimal, frac: usize, alt: bool) -> Vec<u8> {
    let n = d.digits.len() as i32;
    let int_digits = n + d.exp10;
    let keep = int_digits + frac as i32;
    let (mut kept, grew) = round_at(&d.digits, keep);
    let int_digits = int_digits + grew as i32;
    if keep >= 0 {
        let want = keep as usize + grew as usize;
        while kept.len() < want {
            kept.push(b'0');
        }
    }

    let mut out = Vec::new();
    if int_digits <= 0 {
        out.push(b'0');
    } else {
        out.extend_from_slice(&kept[..int_digits as usize]);
    }
    if frac > 0 || alt {
        out.push(b'.');
    }
    if frac > 0 {
        if int_digits <= 0 {
            let lead = ((-int_digits) as usize).min(frac);
            out.resize(out.len() + lead, b'0');
            let remaining = frac - lead;
            let take = remaining.min(kept.len());
            out.extend_from_slice(&kept[..take]);
            out.resize(out.len() + (remaining - take), b'0');
        } else {
            out.extend_from_slice(&kept[int_digits as usize..]);
        }
    }
    out
}

/// Fixed notation with the shortest digits (round-trip mode); the
/// fraction is zero-padded to at least `min_frac`.
pub(crate) fn fixed_shortest(d: &Decimal, min_frac: usize, alt: bool) -> Vec<u8> {
    let n = d.digits.len();
    let mut int_part = Vec::new();
    let mut frac_part = Vec::new();
    if d.exp10 >= 0 {
        int_part.extend_from_slice(&d.digits);
        int_part.resize(n + d.exp10 as usize, b'0');
    } else {
        let fd = (-d.exp10) as usize;
        if fd >= n {
            int_part.push(b'0');
            frac_part.resize(fd - n, b'0');
            frac_part.extend_from_slice(&d.digits);
        } else {
            int_part.extend_from_slice(&d.digits[..n - fd]);
            frac_part.extend_from_slice(&d.digits[n - fd..]);
        }
    }
    if d.is_zero() {
        frac_part.clear();
    }
    while frac_part.len() < min_frac {
        frac_part.push(b'0');
    }
    let mut out = int_part;
    if !frac_part.is_empty() || alt {
        out.push(b'.');
    }
    out.extend_from_slice(&frac_part);
    out
}

fn push_exponent(out: &mut Vec<u8>, e: i32, upper: bool) {
    out.push(if upper { b'E' } else { b'e' });
    out.push(if e < 0 { b'-' } else { b'+' });
    let digits = e.unsigned_abs().to_string();
    if digits.len() < 2 {
        out.push(b'0');
    }
    out.extend_from_slice(digits.as_bytes());
}

/// Exponential notation with exactly `prec` fraction digits.
pub(crate) fn exponential(d: &Decimal, prec: usize, upper: bool, alt: bool) -> Vec<u8> {
    let mut k = d.leading_exponent();
    if d.is_zero() {
        k = 0;
    }
    let keep = prec as i32 + 1;
    let (mut kept, grew) = round_at(&d.digits, keep);
    if grew {
        k += 1;
        kept.truncate(keep as usize);
    }
    while kept.len() < keep as usize {
        kept.push(b'0');
    }
    let mut out = vec![kept[0]];
    if prec > 0 || alt {
        out.push(b'.');
    }
    out.extend_from_slice(&kept[1..]);
    push_exponent(&mut out, k, upper);
    out
}

/// Exponential notation with the shortest digits (round-trip mode).
pub(crate) fn exponential_shortest(d: &Decimal, min_frac: usize, upper: bool, alt: bool) -> Vec<u8> {
    let k = if d.is_zero() { 0 } else { d.leading_exponent() };
    let mut frac: Vec<u8> = d.digits[1..].to_vec();
    while frac.len() < min_frac {
        frac.push(b'0');
    }
    let mut out = vec![d.digits[0]];
    if !frac.is_empty() || alt {
        out.push(b'.');
    }
    out.extend_from_slice(&frac);
    push_exponent(&mut out, k, upper);
    out
}

/// Trim trailing fraction zeros (and a dangling point) from the mantissa
/// of a fixed or exponential rendering.
fn trim_frac_zeros(body: &mut Vec<u8>) {
    let epos = body
        .iter()
        .position(|&b| b == b'e' || b == b'E')
        .unwrap_or(body.len());
    if !body[..epos].contains(&b'.') {
        return;
    }
    let mut end = epos;
    while end > 0 && body[end - 1] == b'0' {
        end -= 1;
    }
    if end > 0 && body[end - 1] == b'.' {
        end -= 1;
    }
    if end != epos {
        body.drain(end..epos);
    }
}

/// The `%g` rule: fixed when the leading exponent fits the precision,
/// exponential otherwise; trailing zeros trimmed unless `alt`.
pub(crate) fn general(d: &Decimal, prec: usize, upper: bool, alt: bool) -> Vec<u8> {
    let p = prec.max(1);
    let mut k = if d.is_zero() { 0 } else { d.leading_exponent() };
    let (_, grew) = round_at(&d.digits, p as i32);
    if grew {
        k += 1;
    }
    let mut body = if (p as i32) > k && k >= -4 {
        fixed(d, (p as i32 - 1 - k) as usize, alt)
    } else {
        exponential(d, p - 1, upper, alt)
    };
    if !alt {
        trim_frac_zeros(&mut body);
    }
    body
}

/// Round-trip `%g`: shortest digits, notation chosen by the exponent.
pub(crate) fn general_shortest(d: &Decimal, upper: bool, alt: bool) -> Vec<u8> {
    let k = if d.is_zero() { 0 } else { d.leading_exponent() };
    let n = d.digits.len() as i32;
    if k >= -4 && k < n.max(1) + 4 {
        // Keep fixed form while it stays compact.
        fixed_shortest(d, 0, alt)
    } else {
        exponential_shortest(d, 0, upper, alt)
    }
}

// ----------------------------------------------------------------------
// Hexadecimal floats
// ----------------------------------------------------------------------

fn hex_digit(v: u8, upper: bool) -> u8 {
    match v {
        0..=9 => b'0' + v,
        _ if upper => b'A' + (v - 10),
        _ => b'a' + (v - 10),
    }
}

/// `%a` rendering of a finite non-negative double, straight from the
/// bits. `prec` of `None` trims trailing zero nibbles.
pub(crate) fn hex_float(v: f64, prec: Option<usize>, upper: bool, alt: bool) -> Vec<u8> {
    let bits = v.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);

    let (mut lead, e2) = if exp_bits == 0 {
        if frac == 0 {
            // Signed zero keeps exponent zero.
            (0u8, 0)
        } else {
            (0u8, -1022)
        }
    } else {
        (1u8, exp_bits - 1023)
    };

    let mut nibbles: Vec<u8> = (0..13).map(|i| ((frac >> (48 - 4 * i)) & 0xf) as u8).collect();
    match prec {
        None => {
            while nibbles.last() == Some(&0) {
                nibbles.pop();
            }
        }
        Some(p) => {
            if p < nibbles.len() {
                let first_dropped = nibbles[p];
                let rest_nonzero = nibbles[p + 1..].iter().any(|&x| x != 0);
                let prev = if p > 0 { nibbles[p - 1] } else { lead };
                let round_up = first_dropped > 8
                    || (first_dropped == 8 && (rest_nonzero || prev % 2 == 1));
                nibbles.truncate(p);
                if round_up {
                    let mut carry = true;
                    for slot in nibbles.iter_mut().rev() {
                        if *slot == 0xf {
                            *slot = 0;
                        } else {
                            *slot += 1;
                            carry = false;
                            break;
                        }
                    }
                    if carry {
                        lead += 1;
                    }
                }
            } else {
                nibbles.resize(p, 0);
            }
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(if upper { b"0X" } else { b"0x" });
    out.push(hex_digit(lead, upper));
    if !nibbles.is_empty() || alt {
        out.push(b'.');
    }
    for &n in &nibbles {
        out.push(hex_digit(n, upper));
    }
    out.push(if upper { b'P' } else { b'p' });
    out.push(if e2 < 0 { b'-' } else { b'+' });
    out.extend_from_slice(e2.unsigned_abs().to_string().as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[u8]) -> &str {
        std::str::from_utf8(v).unwrap()
    }

    #[test]
    fn test_decompose_simple_values() {
        let d = decompose(0.3);
        assert_eq!(d.digits, b"3");
        assert_eq!(d.exp10, -1);
        let d = decompose(123.0);
        assert_eq!(d.digits, b"123");
        assert_eq!(d.exp10, 0);
        let d = decompose(0.0);
        assert!(d.is_zero());
        let d = decompose(1e40);
        assert_eq!(d.digits, b"1");
        assert_eq!(d.exp10, 40);
    }

    #[test]
    fn test_fixed_default_precision() {
        assert_eq!(s(&fixed(&decompose(3.5), 6, false)), "3.500000");
        assert_eq!(s(&fixed(&decompose(0.0), 6, false)), "0.000000");
        assert_eq!(s(&fixed(&decompose(0.0123), 3, false)), "0.012");
    }

    #[test]
    fn test_fixed_rounding_half_even() {
        // Digit stream "25" cut at one fraction digit: exact half, kept
        // digit even, rounds down.
        assert_eq!(s(&fixed(&decompose(0.25), 1, false)), "0.2");
        assert_eq!(s(&fixed(&decompose(0.35), 1, false)), "0.4");
        assert_eq!(s(&fixed(&decompose(0.06), 1, false)), "0.1");
        assert_eq!(s(&fixed(&decompose(9.99), 1, false)), "10.0");
        assert_eq!(s(&fixed(&decompose(0.96), 0, false)), "1");
    }

    #[test]
    fn test_fixed_zero_precision_and_alt() {
        assert_eq!(s(&fixed(&decompose(3.7), 0, false)), "4");
        assert_eq!(s(&fixed(&decompose(3.7), 0, true)), "4.");
    }

    #[test]
    fn test_fixed_shortest_is_roundtrip_text() {
        assert_eq!(s(&fixed_shortest(&decompose(0.3), 0, false)), "0.3");
        assert_eq!(s(&fixed_shortest(&decompose(12340.0), 0, false)), "12340");
        assert_eq!(s(&fixed_shortest(&decompose(12340.0), 2, false)), "12340.00");
        assert_eq!(s(&fixed_shortest(&decompose(0.0), 0, false)), "0");
    }

    #[test]
    fn test_exponential_forms() {
        assert_eq!(s(&exponential(&decompose(100.0), 0, false, false)), "1e+02");
        assert_eq!(s(&exponential(&decompose(100.0), 0, false, true)), "1.e+02");
        assert_eq!(
            s(&exponential(&decompose(1234.5), 2, false, false)),
            "1.23e+03"
        );
        assert_eq!(s(&exponential(&decompose(9.99), 1, false, false)), "1.0e+01");
        assert_eq!(
            s(&exponential(&decompose(0.0), 6, false, false)),
            "0.000000e+00"
        );
        assert_eq!(s(&exponential(&decompose(0.0042), 1, true, false)), "4.2E-03");
    }

    #[test]
    fn test_general_picks_notation() {
        assert_eq!(s(&general(&decompose(10000000.0), 6, false, false)), "1e+07");
        assert_eq!(s(&general(&decompose(123.456), 6, false, false)), "123.456");
        assert_eq!(s(&general(&decompose(0.0001), 6, false, false)), "0.0001");
        assert_eq!(s(&general(&decompose(0.00001), 6, false, false)), "1e-05");
        assert_eq!(s(&general(&decompose(100.0), 6, false, false)), "100");
    }

    #[test]
    fn test_general_alt_keeps_zeros() {
        assert_eq!(s(&general(&decompose(100.0), 6, false, true)), "100.000");
    }

    #[test]
    fn test_hex_float_basics() {
        assert_eq!(s(&hex_float(1.0, None, false, false)), "0x1p+0");
        assert_eq!(s(&hex_float(1.75, None, false, false)), "0x1.cp+0");
        assert_eq!(s(&hex_float(0.0, None, false, false)), "0x0p+0");
        assert_eq!(s(&hex_float(2.0, None, false, false)), "0x1p+1");
        assert_eq!(
            s(&hex_float(0.1 + 0.2, None, false, false)),
            "0x1.3333333333334p-2"
        );
    }

    #[test]
    fn test_hex_float_precision_rounds() {
        // 1.9375 = 0x1.f; one nibble of precision keeps it, zero rounds
        // the lead up.
        assert_eq!(s(&hex_float(1.9375, Some(1), false, false)), "0x1.fp+0");
        assert_eq!(s(&hex_float(1.9375, Some(0), false, false)), "0x2p+0");
        assert_eq!(s(&hex_float(1.0, Some(3), false, false)), "0x1.000p+0");
    }

    #[test]
    fn test_hex_float_uppercase() {
        assert_eq!(s(&hex_float(1.75, None, true, false)), "0X1.CP+0");
    }
}
