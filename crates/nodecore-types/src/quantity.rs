//! Exact resource quantities.
//!
//! [`Quantity`] follows the Kubernetes quantity grammar (`<number><suffix>`
//! with binary SI, decimal SI or decimal exponent suffixes) but stores the
//! value as an integer count of nano-units, so addition and subtraction never
//! lose precision.

use core::error::Error;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use error_stack::Report;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Largest power of ten representable in an `i128`.
const MAX_POW10: u32 = 38;

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: [(&str, i32); 10] = [
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// The notation a quantity was written in. Preserved so that formatting
/// stays in the family the author chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuantityFormat {
    #[default]
    DecimalSi,
    BinarySi,
    DecimalExponent,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum QuantityError {
    #[display("quantity is empty")]
    Empty,
    #[display("invalid number in quantity `{input}`")]
    InvalidNumber { input: String },
    #[display("unknown suffix `{suffix}` in quantity `{input}`")]
    UnknownSuffix { input: String, suffix: String },
    #[display("quantity `{input}` is out of range")]
    OutOfRange { input: String },
    #[display("quantity arithmetic overflowed")]
    Overflow,
}

impl Error for QuantityError {}

/// An exact, arbitrary-notation resource measurement (cores, bytes, pods).
#[derive(Clone, Copy, Default)]
pub struct Quantity {
    nanos: i128,
    format: QuantityFormat,
}

impl Quantity {
    pub const fn zero() -> Self {
        Self {
            nanos: 0,
            format: QuantityFormat::DecimalSi,
        }
    }

    /// A whole number of units in the given notation.
    pub const fn from_units(units: i64, format: QuantityFormat) -> Self {
        Self {
            nanos: units as i128 * NANOS_PER_UNIT,
            format,
        }
    }

    /// Parse a quantity string such as `500m`, `8Gi`, `1.5` or `12e3`.
    ///
    /// Precision finer than one nano-unit is rounded up in magnitude.
    ///
    /// # Errors
    ///
    /// - [`QuantityError::Empty`] for blank input
    /// - [`QuantityError::InvalidNumber`] if the numeric part is malformed
    /// - [`QuantityError::UnknownSuffix`] if the suffix is not recognised
    /// - [`QuantityError::OutOfRange`] if the value cannot be represented
    pub fn parse(input: &str) -> Result<Self, Report<QuantityError>> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Report::new(QuantityError::Empty));
        }

        let (negative, unsigned) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);

        let invalid_number = || {
            Report::new(QuantityError::InvalidNumber {
                input: input.to_string(),
            })
        };
        let out_of_range = || {
            Report::new(QuantityError::OutOfRange {
                input: input.to_string(),
            })
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(invalid_number());
        }
        let fraction = fraction.trim_end_matches('0');

        let mut digits: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            let digit = i128::from(c.to_digit(10).ok_or_else(invalid_number)?);
            digits = digits
                .checked_mul(10)
                .and_then(|d| d.checked_add(digit))
                .ok_or_else(out_of_range)?;
        }

        let (format, binary_shift, exponent) =
            parse_suffix(suffix).ok_or_else(|| {
                Report::new(QuantityError::UnknownSuffix {
                    input: input.to_string(),
                    suffix: suffix.to_string(),
                })
            })?;

        let numerator = digits
            .checked_mul(1_i128 << binary_shift)
            .ok_or_else(out_of_range)?;

        let fraction_len = i32::try_from(fraction.len()).map_err(|_| out_of_range())?;
        let scale = exponent
            .checked_add(9)
            .and_then(|s| s.checked_sub(fraction_len))
            .ok_or_else(out_of_range)?;

        let magnitude = if scale >= 0 {
            pow10(scale.unsigned_abs())
                .and_then(|p| numerator.checked_mul(p))
                .ok_or_else(out_of_range)?
        } else {
            match pow10(scale.unsigned_abs()) {
                Some(divisor) => ceil_div(numerator, divisor),
                // Anything divided by more than 10^38 rounds up to one nano.
                None => i128::from(numerator != 0),
            }
        };

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
            format,
        })
    }

    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    pub const fn format(&self) -> QuantityFormat {
        self.format
    }

    /// The value expressed in nano-units.
    pub const fn as_nanos(&self) -> i128 {
        self.nanos
    }

    /// Add two quantities. The result keeps this quantity's notation unless
    /// this quantity is zero, in which case it adopts the other's.
    ///
    /// # Errors
    ///
    /// - [`QuantityError::Overflow`] if the sum is not representable
    pub fn checked_add(&self, other: &Self) -> Result<Self, Report<QuantityError>> {
        let nanos = self
            .nanos
            .checked_add(other.nanos)
            .ok_or_else(|| Report::new(QuantityError::Overflow))?;
        Ok(Self {
            nanos,
            format: self.combined_format(other),
        })
    }

    /// Subtract `other` from this quantity. Negative results are allowed.
    ///
    /// # Errors
    ///
    /// - [`QuantityError::Overflow`] if the difference is not representable
    pub fn checked_sub(&self, other: &Self) -> Result<Self, Report<QuantityError>> {
        let nanos = self
            .nanos
            .checked_sub(other.nanos)
            .ok_or_else(|| Report::new(QuantityError::Overflow))?;
        Ok(Self {
            nanos,
            format: self.combined_format(other),
        })
    }

    /// Multiply by a whole factor, e.g. a per-unit amount by a device count.
    ///
    /// # Errors
    ///
    /// - [`QuantityError::Overflow`] if the product is not representable
    pub fn checked_mul(&self, factor: i64) -> Result<Self, Report<QuantityError>> {
        let nanos = self
            .nanos
            .checked_mul(i128::from(factor))
            .ok_or_else(|| Report::new(QuantityError::Overflow))?;
        Ok(Self {
            nanos,
            format: self.format,
        })
    }

    fn combined_format(&self, other: &Self) -> QuantityFormat {
        if self.nanos == 0 {
            other.format
        } else {
            self.format
        }
    }
}

fn parse_suffix(suffix: &str) -> Option<(QuantityFormat, u32, i32)> {
    if let Some((_, shift)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((QuantityFormat::BinarySi, *shift, 0));
    }
    if let Some((_, exponent)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some((QuantityFormat::DecimalSi, 0, *exponent));
    }
    let exponent = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))?;
    exponent
        .parse::<i32>()
        .ok()
        .map(|e| (QuantityFormat::DecimalExponent, 0, e))
}

fn pow10(exponent: u32) -> Option<i128> {
    if exponent > MAX_POW10 {
        return None;
    }
    10_i128.checked_pow(exponent)
}

const fn ceil_div(numerator: i128, divisor: i128) -> i128 {
    let quotient = numerator / divisor;
    if numerator % divisor == 0 {
        quotient
    } else {
        quotient + 1
    }
}

impl fmt::Display for Quantity {
    /// Canonical form. Formatting the parse of a formatted quantity always
    /// yields the same string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0");
        }

        if self.format == QuantityFormat::BinarySi && self.nanos % NANOS_PER_UNIT == 0 {
            let units = self.nanos / NANOS_PER_UNIT;
            for (suffix, shift) in BINARY_SUFFIXES.iter().rev() {
                let divisor = 1_i128 << shift;
                if units % divisor == 0 {
                    return write!(f, "{}{suffix}", units / divisor);
                }
            }
        }

        let mut mantissa = self.nanos;
        let mut exponent = -9;
        while exponent < 18 && mantissa % 1000 == 0 {
            mantissa /= 1000;
            exponent += 3;
        }

        match self.format {
            QuantityFormat::DecimalExponent if exponent != 0 => {
                write!(f, "{mantissa}e{exponent}")
            }
            QuantityFormat::DecimalExponent => write!(f, "{mantissa}"),
            QuantityFormat::DecimalSi | QuantityFormat::BinarySi => {
                let suffix = DECIMAL_SUFFIXES
                    .iter()
                    .find(|(_, e)| *e == exponent)
                    .map(|(s, _)| *s)
                    .unwrap_or_default();
                write!(f, "{mantissa}{suffix}")
            }
        }
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quantity({self})")
    }
}

impl FromStr for Quantity {
    type Err = Report<QuantityError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = Report<QuantityError>;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Self::parse(&value.0)
    }
}

impl From<&Quantity> for K8sQuantity {
    fn from(value: &Quantity) -> Self {
        K8sQuantity(value.to_string())
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuantityVisitor;

        impl de::Visitor<'_> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a resource quantity string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
                Quantity::parse(v).map_err(|report| E::custom(report.current_context()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
                Ok(Quantity::from_units(v, QuantityFormat::DecimalSi))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Quantity, E> {
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

impl schemars::JsonSchema for Quantity {
    fn schema_name() -> String {
        "Quantity".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    #[test]
    fn parses_decimal_suffixes() {
        assert_eq!(q("500m").as_nanos(), 500_000_000);
        assert_eq!(q("2").as_nanos(), 2 * NANOS_PER_UNIT);
        assert_eq!(q("1.5k").as_nanos(), 1500 * NANOS_PER_UNIT);
        assert_eq!(q("3n").as_nanos(), 3);
        assert_eq!(q("-250m").as_nanos(), -250_000_000);
    }

    #[test]
    fn parses_binary_suffixes() {
        assert_eq!(q("1Ki").as_nanos(), 1024 * NANOS_PER_UNIT);
        assert_eq!(q("8Gi").as_nanos(), 8 * (1 << 30) * NANOS_PER_UNIT);
        assert_eq!(q("8Gi").format(), QuantityFormat::BinarySi);
        assert_eq!(q("0.5Ki").as_nanos(), 512 * NANOS_PER_UNIT);
    }

    #[test]
    fn parses_exponents() {
        assert_eq!(q("12e3").as_nanos(), 12_000 * NANOS_PER_UNIT);
        assert_eq!(q("5E-3").as_nanos(), 5_000_000);
        assert_eq!(q("12e3").format(), QuantityFormat::DecimalExponent);
    }

    #[test]
    fn rounds_sub_nano_precision_up() {
        assert_eq!(q("0.1n").as_nanos(), 1);
        assert_eq!(q("1.0000000001").as_nanos(), NANOS_PER_UNIT + 1);
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "  ", "abc", "1.2.3", "12Qi", "1e", ".", "--1", "1 Gi"] {
            assert!(Quantity::parse(input).is_err(), "{input:?} should not parse");
        }
        assert!(matches!(
            Quantity::parse("1Zi").unwrap_err().current_context(),
            QuantityError::UnknownSuffix { .. }
        ));
        assert!(matches!(
            Quantity::parse("1e60").unwrap_err().current_context(),
            QuantityError::OutOfRange { .. }
        ));
    }

    #[test]
    fn formats_canonically() {
        assert_eq!(q("0").to_string(), "0");
        assert_eq!(q("1000").to_string(), "1k");
        assert_eq!(q("1.5").to_string(), "1500m");
        assert_eq!(q("32Gi").to_string(), "32Gi");
        assert_eq!(q("1024Mi").to_string(), "1Gi");
        assert_eq!(q("1536Ki").to_string(), "1536Ki");
        assert_eq!(q("1e3").to_string(), "1e3");
        assert_eq!(q("100Mi").to_string(), "100Mi");
        assert_eq!(q("0.5Ki").to_string(), "512");
    }

    #[test]
    fn formatting_is_a_fixed_point() {
        for input in [
            "0", "1", "250m", "3.2", "7Gi", "1536", "3000", "2000Ki", "12e3", "5e-3", "-4",
            "100Mi", "0.1n", "1.5Gi", "64", "110",
        ] {
            let once = q(input).to_string();
            let twice = q(&once).to_string();
            assert_eq!(once, twice, "formatting {input:?} is not stable");
        }
    }

    #[test]
    fn subtraction_is_exact() {
        let diff = |a: &str, b: &str| q(a).checked_sub(&q(b)).unwrap().to_string();
        assert_eq!(diff("4", "1500m"), "2500m");
        assert_eq!(diff("16Gi", "1Gi"), "15Gi");
        assert_eq!(diff("110", "0"), "110");
        assert_eq!(diff("1", "3"), "-2");
    }

    #[test]
    fn zero_adopts_other_format() {
        let sum = Quantity::zero().checked_add(&q("8Gi")).unwrap();
        assert_eq!(sum.format(), QuantityFormat::BinarySi);
        assert_eq!(sum.to_string(), "8Gi");
    }

    #[test]
    fn scales_by_count() {
        assert_eq!(q("8Gi").checked_mul(4).unwrap().to_string(), "32Gi");
        assert!(q("8Gi").checked_mul(0).unwrap().is_zero());
        assert!(q("1Ei").checked_mul(i64::MAX).is_err());
    }

    #[test]
    fn equality_ignores_notation() {
        assert_eq!(q("1Ki"), q("1024"));
        assert!(q("1Gi") > q("1G"));
    }

    #[test]
    fn serde_accepts_strings_and_numbers() {
        let from_str: Quantity = serde_json::from_str("\"2Gi\"").unwrap();
        let from_int: Quantity = serde_json::from_str("110").unwrap();
        let from_float: Quantity = serde_json::from_str("0.5").unwrap();
        assert_eq!(from_str.to_string(), "2Gi");
        assert_eq!(from_int.to_string(), "110");
        assert_eq!(from_float.to_string(), "500m");
        assert_eq!(serde_json::to_string(&from_str).unwrap(), "\"2Gi\"");
        assert!(serde_json::from_str::<Quantity>("\"bogus\"").is_err());
    }

    #[test]
    fn converts_from_k8s_quantity() {
        let k8s = K8sQuantity("250m".to_string());
        let parsed = Quantity::try_from(&k8s).unwrap();
        assert_eq!(K8sQuantity::from(&parsed).0, "250m");
    }
}
