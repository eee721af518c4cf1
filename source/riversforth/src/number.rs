//! Text to integer conversion (and back) in any radix from 2 to 36.
//!
//! Arithmetic wraps on overflow, both here and in the arithmetic words:
//! `value * base + digit` is accumulated with `wrapping_mul`/`wrapping_add`
//! and no overflow is ever reported.

use core::fmt;

use crate::Cell;

pub const MIN_BASE: u32 = 2;
pub const MAX_BASE: u32 = 36;

/// Parses `token` in `base`, returning `(value, unparsed)`.
///
/// `unparsed` is the number of characters that were not consumed, counting
/// the first offending one. A value is only a complete number when
/// `unparsed == 0`. When parsing stops early the returned value is the
/// magnitude accumulated so far, without the sign applied.
///
/// An empty token, or a lone `-`, is reported as `(0, 1)`.
pub fn parse(token: &[u8], base: u32) -> (Cell, usize) {
    debug_assert!((MIN_BASE..=MAX_BASE).contains(&base));

    let (negative, digits) = match token {
        [] | [b'-'] => return (0, 1),
        [b'-', rest @ ..] => (true, rest),
        _ => (false, token),
    };

    let base = Cell::from(base);
    let mut value: Cell = 0;
    for (i, ch) in digits.iter().enumerate() {
        match digit_value(*ch) {
            Some(d) if d < base => {
                value = value.wrapping_mul(base).wrapping_add(d);
            }
            _ => return (value, digits.len() - i),
        }
    }

    if negative {
        (value.wrapping_neg(), 0)
    } else {
        (value, 0)
    }
}

fn digit_value(ch: u8) -> Option<Cell> {
    let d = match ch {
        b'0'..=b'9' => ch - b'0',
        b'a'..=b'z' => ch - b'a' + 10,
        b'A'..=b'Z' => ch - b'A' + 10,
        _ => return None,
    };
    Some(Cell::from(d))
}

/// Writes `value` in `base`, upper case digits, with a leading `-` when
/// negative.
pub fn write_radix(out: &mut impl fmt::Write, value: Cell, base: u32) -> fmt::Result {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    debug_assert!((MIN_BASE..=MAX_BASE).contains(&base));

    // 64 binary digits is the longest a magnitude can get.
    let mut buf = [0u8; 64];
    let mut pos = buf.len();
    let base = u64::from(base);
    let mut mag = value.unsigned_abs();
    loop {
        pos -= 1;
        buf[pos] = DIGITS[(mag % base) as usize];
        mag /= base;
        if mag == 0 {
            break;
        }
    }

    if value < 0 {
        out.write_char('-')?;
    }
    // Only ASCII digits were written.
    for &b in &buf[pos..] {
        out.write_char(char::from(b))?;
    }
    Ok(())
}

#[cfg(test)]
pub mod test {
    use super::{parse, write_radix};
    use proptest::{prop_assert_eq, proptest};

    #[test]
    fn parse_cases() {
        let cases: &[(&str, u32, (i64, usize))] = &[
            ("-123", 10, (-123, 0)),
            ("", 10, (0, 1)),
            ("-", 10, (0, 1)),
            ("0", 10, (0, 0)),
            ("ff", 16, (255, 0)),
            ("FF", 16, (255, 0)),
            ("zz", 36, (35 * 36 + 35, 0)),
            ("1010", 2, (10, 0)),
            ("12G", 16, (0x12, 1)),
            ("-12G", 16, (0x12, 1)),
            ("129", 8, (0o12, 1)),
            ("1+", 10, (1, 1)),
            ("abc", 10, (0, 3)),
            ("--1", 10, (0, 2)),
        ];
        for (token, base, expected) in cases {
            assert_eq!(
                parse(token.as_bytes(), *base),
                *expected,
                "parse({token:?}, {base})"
            );
        }
    }

    #[test]
    fn parse_wraps() {
        // 2^64 wraps around to zero.
        assert_eq!(parse(b"18446744073709551616", 10), (0, 0));
        assert_eq!(parse(b"9223372036854775807", 10), (i64::MAX, 0));
        assert_eq!(parse(b"-9223372036854775808", 10), (i64::MIN, 0));
    }

    #[test]
    fn radix_cases() {
        let cases: &[(i64, u32, &str)] = &[
            (0, 10, "0"),
            (-42, 10, "-42"),
            (255, 16, "FF"),
            (-255, 16, "-FF"),
            (5, 2, "101"),
            (i64::MIN, 10, "-9223372036854775808"),
            (35, 36, "Z"),
        ];
        for (value, base, expected) in cases {
            let mut s = String::new();
            write_radix(&mut s, *value, *base).unwrap();
            assert_eq!(&s, expected);
        }
    }

    proptest! {
        #[test]
        fn written_numbers_parse_back(value: i64, base in 2u32..=36) {
            let mut s = String::new();
            write_radix(&mut s, value, base).unwrap();
            prop_assert_eq!(parse(s.as_bytes(), base), (value, 0));
        }
    }
}
