//! Literal parsing and integer/float arithmetic on token payloads.
//!
//! All integer arithmetic is performed on `i64` with wrapping semantics so
//! that folding a hostile expression can never abort the analyzer. Division
//! by zero is reported to the caller, which drops the offending value
//! combination.

/// Width of the analyzer's integer payload in bits.
pub const BIGINT_BITS: u32 = 64;

/// Arithmetic failure when folding two operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalcError {
    /// Division or remainder by zero.
    DivisionByZero,
    /// Operator not applicable to the operand types.
    UnknownOperator,
}

/// Is the literal text an integer (as opposed to a floating literal)?
pub fn is_int(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s.starts_with("0x") || s.starts_with("0X") || s.starts_with("0b") || s.starts_with("0B") {
        return true;
    }
    !s.contains('.') && !s.contains('e') && !s.contains('E')
}

/// Is the literal text a floating literal?
pub fn is_float(s: &str) -> bool {
    let first = match s.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_digit() && first != '.' {
        return false;
    }
    !is_int(s)
}

fn strip_int_suffix(s: &str) -> &str {
    s.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L' | 'z' | 'Z'))
}

/// Parse an integer literal: decimal, hex (`0x`), octal (leading `0`),
/// binary (`0b`), with any `u`/`l` suffixes. Out-of-range literals wrap.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = strip_int_suffix(s);
    if s.is_empty() {
        return None;
    }
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (bin, 2)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    if digits.is_empty() {
        // A lone "0" was consumed as an octal prefix.
        return if s == "0" { Some(0) } else { None };
    }
    let mut value: u64 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(radix)?;
        value = value.wrapping_mul(u64::from(radix)).wrapping_add(u64::from(digit));
    }
    Some(value as i64)
}

/// Parse a floating literal (suffixes `f`/`F`/`l`/`L` allowed).
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim_end_matches(|c| matches!(c, 'f' | 'F' | 'l' | 'L'));
    s.parse::<f64>().ok()
}

/// Numeric value of a character literal token text such as `'a'`, `'\n'`,
/// `'\x41'`, `L'ü'` or the multi-char `'ab'`.
pub fn char_literal_value(s: &str) -> Option<i64> {
    let inner = s
        .trim_start_matches(|c| matches!(c, 'u' | 'U' | 'L' | '8'))
        .strip_prefix('\'')?
        .strip_suffix('\'')?;
    let mut value: i64 = 0;
    let mut chars = inner.chars().peekable();
    let mut any = false;
    while let Some(c) = chars.next() {
        let unit = if c == '\\' {
            match chars.next()? {
                'n' => 10,
                't' => 9,
                'r' => 13,
                d @ '0'..='7' => {
                    // Up to three octal digits; the first was just consumed.
                    let mut oct = i64::from(d as u8 - b'0');
                    for _ in 0..2 {
                        match chars.peek() {
                            Some(d @ '0'..='7') => {
                                oct = oct * 8 + i64::from(*d as u8 - b'0');
                                chars.next();
                            }
                            _ => break,
                        }
                    }
                    oct
                }
                'x' => {
                    let mut hex = 0i64;
                    while let Some(d) = chars.peek().and_then(|c| c.to_digit(16)) {
                        hex = hex.wrapping_mul(16).wrapping_add(i64::from(d));
                        chars.next();
                    }
                    hex
                }
                '\\' => 92,
                '\'' => 39,
                '"' => 34,
                'a' => 7,
                'b' => 8,
                'f' => 12,
                'v' => 11,
                '?' => 63,
                _ => return None,
            }
        } else {
            c as i64
        };
        if any {
            // Multi-char literal: bytes are packed big-endian.
            value = value.wrapping_shl(8).wrapping_add(unit & 0xff);
        } else {
            // Single-character literals keep their exact code point.
            value = unit;
        }
        any = true;
    }
    if any {
        Some(value)
    } else {
        None
    }
}

/// Evaluate `a <op> b` with integer semantics.
pub fn calculate_int(op: &str, a: i64, b: i64) -> Result<i64, CalcError> {
    Ok(match op {
        "+" => a.wrapping_add(b),
        "-" => a.wrapping_sub(b),
        "*" => a.wrapping_mul(b),
        "/" => {
            if b == 0 {
                return Err(CalcError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
        "%" => {
            if b == 0 {
                return Err(CalcError::DivisionByZero);
            }
            a.wrapping_rem(b)
        }
        "&" => a & b,
        "|" => a | b,
        "^" => a ^ b,
        "<<" => {
            if !(0..64).contains(&b) {
                return Err(CalcError::UnknownOperator);
            }
            a.wrapping_shl(b as u32)
        }
        ">>" => {
            if !(0..64).contains(&b) {
                return Err(CalcError::UnknownOperator);
            }
            a.wrapping_shr(b as u32)
        }
        "==" => i64::from(a == b),
        "!=" => i64::from(a != b),
        "<" => i64::from(a < b),
        ">" => i64::from(a > b),
        "<=" => i64::from(a <= b),
        ">=" => i64::from(a >= b),
        "&&" => i64::from(a != 0 && b != 0),
        "||" => i64::from(a != 0 || b != 0),
        _ => return Err(CalcError::UnknownOperator),
    })
}

/// Evaluate `a <op> b` with floating semantics. Comparisons yield 0.0/1.0.
pub fn calculate_float(op: &str, a: f64, b: f64) -> Result<f64, CalcError> {
    Ok(match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => {
            if b == 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            a / b
        }
        "==" => f64::from(u8::from(a == b)),
        "!=" => f64::from(u8::from(a != b)),
        "<" => f64::from(u8::from(a < b)),
        ">" => f64::from(u8::from(a > b)),
        "<=" => f64::from(u8::from(a <= b)),
        ">=" => f64::from(u8::from(a >= b)),
        "&&" => f64::from(u8::from(a != 0.0 && b != 0.0)),
        "||" => f64::from(u8::from(a != 0.0 || b != 0.0)),
        _ => return Err(CalcError::UnknownOperator),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_literals() {
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("0x10"), Some(16));
        assert_eq!(parse_int("0X10u"), Some(16));
        assert_eq!(parse_int("010"), Some(8));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("123456789012345ULL"), Some(123456789012345));
        assert_eq!(parse_int("1.5"), None);
    }

    #[test]
    fn int_literal_wraps_instead_of_failing() {
        // 2^64 - 1 as unsigned wraps to -1 in the signed payload.
        assert_eq!(parse_int("0xffffffffffffffff"), Some(-1));
    }

    #[test]
    fn float_literals() {
        assert!(is_float("1.5"));
        assert!(is_float("1e10"));
        assert!(!is_float("0x1f"));
        assert_eq!(parse_float("2.5f"), Some(2.5));
    }

    #[test]
    fn char_literals() {
        assert_eq!(char_literal_value("'a'"), Some(97));
        assert_eq!(char_literal_value("'\\n'"), Some(10));
        assert_eq!(char_literal_value("'\\x41'"), Some(65));
        assert_eq!(char_literal_value("'\\0'"), Some(0));
        assert_eq!(char_literal_value("L'a'"), Some(97));
    }

    #[test]
    fn calculate_int_basics() {
        assert_eq!(calculate_int("+", 40, 2), Ok(42));
        assert_eq!(calculate_int("*", 4, 10), Ok(40));
        assert_eq!(calculate_int("/", 1, 0), Err(CalcError::DivisionByZero));
        assert_eq!(calculate_int("%", 1, 0), Err(CalcError::DivisionByZero));
        assert_eq!(calculate_int("<", 1, 2), Ok(1));
        assert_eq!(calculate_int("<<", 1, 70), Err(CalcError::UnknownOperator));
    }

    #[test]
    fn calculate_int_never_overflows() {
        assert_eq!(calculate_int("*", i64::MAX, 2), Ok(i64::MAX.wrapping_mul(2)));
        assert_eq!(calculate_int("-", i64::MIN, 1), Ok(i64::MIN.wrapping_sub(1)));
    }

    #[test]
    fn calculate_float_basics() {
        assert_eq!(calculate_float("+", 1.5, 1.0), Ok(2.5));
        assert_eq!(
            calculate_float("/", 1.0, 0.0),
            Err(CalcError::DivisionByZero)
        );
        assert_eq!(calculate_float("<", 1.0, 2.0), Ok(1.0));
    }
}
