//! Exact resource quantities ("100m", "1.5Gi", "2e3").
//!
//! Values are kept as `mantissa * 10^scale` with binary suffixes folded into the
//! mantissa, so ordering and equality never go through floating point.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MAX_EXPONENT: i32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity {0:?}: expected a decimal number")]
    Number(String),
    #[error("invalid quantity {0:?}: unknown suffix")]
    Suffix(String),
    #[error("quantity {0:?} is out of range")]
    Overflow(String),
}

#[derive(Debug, Clone)]
pub struct Quantity {
    mantissa: i128,
    scale: i32,
    text: String,
}

impl Quantity {
    pub fn parse(raw: &str) -> Result<Self, QuantityError> {
        let text = raw.trim();
        if text.is_empty() { return Err(QuantityError::Empty); }
        let overflow = || QuantityError::Overflow(text.to_string());

        let (negative, rest) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let num_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(num_len);
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(QuantityError::Number(text.to_string()));
        }

        let mut mantissa: i128 = 0;
        let mut scale: i32 = 0;
        let mut fraction = false;
        for c in number.chars() {
            if c == '.' { fraction = true; continue; }
            let digit = i128::from(c as u8 - b'0');
            mantissa = mantissa.checked_mul(10).and_then(|m| m.checked_add(digit)).ok_or_else(overflow)?;
            if fraction { scale -= 1; }
        }

        match suffix {
            "" => {}
            "n" => scale -= 9,
            "u" => scale -= 6,
            "m" => scale -= 3,
            "k" => scale += 3,
            "M" => scale += 6,
            "G" => scale += 9,
            "T" => scale += 12,
            "P" => scale += 15,
            "E" => scale += 18,
            "Ki" | "Mi" | "Gi" | "Ti" | "Pi" | "Ei" => {
                let power = match suffix { "Ki" => 10, "Mi" => 20, "Gi" => 30, "Ti" => 40, "Pi" => 50, _ => 60 };
                mantissa = mantissa.checked_mul(1i128 << power).ok_or_else(overflow)?;
            }
            s if s.len() > 1 && (s.starts_with('e') || s.starts_with('E')) => {
                let exp: i32 = s[1..].parse().map_err(|_| QuantityError::Suffix(text.to_string()))?;
                if exp.abs() > MAX_EXPONENT { return Err(overflow()); }
                scale += exp;
            }
            _ => return Err(QuantityError::Suffix(text.to_string())),
        }

        if negative { mantissa = -mantissa; }
        if mantissa == 0 {
            scale = 0;
        } else {
            while mantissa % 10 == 0 { mantissa /= 10; scale += 1; }
        }
        Ok(Self { mantissa, scale, text: text.to_string() })
    }

    pub fn from_i64(v: i64) -> Self {
        let mut mantissa = i128::from(v);
        let mut scale = 0;
        if mantissa != 0 {
            while mantissa % 10 == 0 { mantissa /= 10; scale += 1; }
        }
        Self { mantissa, scale, text: v.to_string() }
    }

    pub fn is_zero(&self) -> bool { self.mantissa == 0 }

    /// Whole units, rounded up. `None` when the value does not fit an `i64`.
    pub fn to_units(&self) -> Option<i64> { self.scaled_ceil(0) }

    /// Thousandths of a unit (e.g. CPU millicores), rounded up.
    pub fn to_milli_units(&self) -> Option<i64> { self.scaled_ceil(3) }

    fn scaled_ceil(&self, exp: i32) -> Option<i64> {
        let s = self.scale.checked_add(exp)?;
        let v = if s >= 0 {
            self.mantissa.checked_mul(10i128.checked_pow(s.unsigned_abs())?)?
        } else {
            match 10i128.checked_pow(s.unsigned_abs()) {
                Some(div) => {
                    let q = self.mantissa / div;
                    if self.mantissa % div > 0 { q + 1 } else { q }
                }
                // divisor wider than any mantissa: the magnitude is below one unit
                None => if self.mantissa > 0 { 1 } else { 0 },
            }
        };
        i64::try_from(v).ok()
    }
}

fn decimal_digits(mut v: u128) -> i64 {
    let mut n = 1;
    while v >= 10 { v /= 10; n += 1; }
    n
}

fn cmp_magnitude(am: u128, ascale: i32, bm: u128, bscale: i32) -> Ordering {
    let a_order = decimal_digits(am) + i64::from(ascale);
    let b_order = decimal_digits(bm) + i64::from(bscale);
    if a_order != b_order { return a_order.cmp(&b_order); }
    // same order of magnitude, so the scale gap is bounded by the digit count
    let shift = ascale.abs_diff(bscale);
    let widen = |m: u128| 10u128.checked_pow(shift).and_then(|p| m.checked_mul(p));
    if ascale >= bscale {
        widen(am).map_or(Ordering::Greater, |a| a.cmp(&bm))
    } else {
        widen(bm).map_or(Ordering::Less, |b| am.cmp(&b))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.mantissa.signum().cmp(&other.mantissa.signum()) {
            Ordering::Equal => {}
            o => return o,
        }
        if self.mantissa == 0 { return Ordering::Equal; }
        let mag = cmp_magnitude(self.mantissa.unsigned_abs(), self.scale, other.mantissa.unsigned_abs(), other.scale);
        if self.mantissa < 0 { mag.reverse() } else { mag }
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

// Normalized form makes (mantissa, scale) unique per value.
impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool { self.mantissa == other.mantissa && self.scale == other.scale }
}

impl Eq for Quantity {}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mantissa.hash(state);
        self.scale.hash(state);
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.text) }
}

impl FromStr for Quantity {
    type Err = QuantityError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Quantity::parse(s) }
}

impl From<i64> for Quantity {
    fn from(v: i64) -> Self { Quantity::from_i64(v) }
}

impl From<i32> for Quantity {
    fn from(v: i32) -> Self { Quantity::from_i64(i64::from(v)) }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { serializer.serialize_str(&self.text) }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Quantity::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity { Quantity::parse(s).unwrap() }

    #[test]
    fn differently_formatted_equal_values_compare_equal() {
        assert_eq!(q("1000m"), q("1"));
        assert_eq!(q("1Ki"), q("1024"));
        assert_eq!(q("0.5"), q("500m"));
        assert_eq!(q("1e3"), q("1k"));
        assert_eq!(q("0"), q("0Gi"));
        assert_eq!(q("1000m").cmp(&q("1")), Ordering::Equal);
    }

    #[test]
    fn ordering_across_suffixes() {
        assert!(q("1.5Gi") > q("1G"));
        assert!(q("999m") < q("1"));
        assert!(q("100Mi") > q("100M"));
        assert!(q("-1") < q("1m"));
        assert!(q("-2") < q("-1"));
        assert!(q("250m") < q("0.3"));
    }

    #[test]
    fn display_keeps_input_text() {
        assert_eq!(q(" 1500m ").to_string(), "1500m");
        assert_eq!(Quantity::from(42i32).to_string(), "42");
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(Quantity::parse(""), Err(QuantityError::Empty));
        assert!(matches!(Quantity::parse("abc"), Err(QuantityError::Number(_))));
        assert!(matches!(Quantity::parse("1.2.3"), Err(QuantityError::Number(_))));
        assert!(matches!(Quantity::parse("5X"), Err(QuantityError::Suffix(_))));
        assert!(matches!(Quantity::parse("1e99999"), Err(QuantityError::Overflow(_))));
    }

    #[test]
    fn unit_conversions_round_up() {
        assert_eq!(q("250m").to_milli_units(), Some(250));
        assert_eq!(q("1.5").to_milli_units(), Some(1500));
        assert_eq!(q("1n").to_milli_units(), Some(1));
        assert_eq!(q("128Mi").to_units(), Some(134_217_728));
        assert_eq!(q("1500m").to_units(), Some(2));
        assert_eq!(q("1e40").to_units(), None);
    }

    #[test]
    fn serde_uses_text_form() {
        let json = serde_json::to_string(&q("2Gi")).unwrap();
        assert_eq!(json, "\"2Gi\"");
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q("2147483648"));
    }
}
