use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

/// Mapping of resource name to quantity, as reported by nodes and pods.
pub type ResourceList = BTreeMap<String, Quantity>;

pub type QuantityResult<T> = std::result::Result<T, QuantityError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuantityError {
    #[error("Empty quantity")]
    Empty,

    #[error("Invalid quantity number `{0}`")]
    InvalidNumber(String),

    #[error("Unknown quantity suffix `{0}`")]
    UnknownSuffix(String),

    #[error("Quantity `{0}` is out of range")]
    Overflow(String),
}

/// Suffix family a quantity was written in. Sums and canonical rendering keep it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    DecimalSI,
    BinarySI,
    DecimalExponent,
}

/// A quantity held as an exact count of thousandths of its base unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedQuantity {
    milli: i128,
    format: Format,
}

const DECIMAL_SUFFIXES: [(&str, i32); 9] = [
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
];

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

impl ParsedQuantity {
    pub fn from_milli(milli: i128, format: Format) -> Self {
        Self { milli, format }
    }

    pub fn from_value(value: i128, format: Format) -> Self {
        Self {
            milli: value * 1000,
            format,
        }
    }

    pub fn milli_value(&self) -> i128 {
        self.milli
    }

    /// Whole units, rounded up like the apiserver does for fractional values.
    pub fn value(&self) -> i128 {
        let whole = self.milli.div_euclid(1000);
        match self.milli.rem_euclid(1000) {
            0 => whole,
            _ => whole + 1,
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Sum of both quantities, rendered in the format of `self`.
    pub fn add(self, other: ParsedQuantity) -> Self {
        Self {
            milli: self.milli.saturating_add(other.milli),
            format: self.format,
        }
    }

    pub fn to_quantity(&self) -> Quantity {
        Quantity(self.to_string())
    }
}

impl fmt::Display for ParsedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.milli < 0 { "-" } else { "" };
        let milli = self.milli.unsigned_abs();

        if milli % 1000 != 0 {
            return match self.format {
                Format::DecimalExponent => write!(f, "{sign}{milli}e-3"),
                Format::DecimalSI | Format::BinarySI => write!(f, "{sign}{milli}m"),
            };
        }

        let value = milli / 1000;
        if value == 0 {
            return f.write_str("0");
        }

        match self.format {
            Format::BinarySI => {
                let (scaled, suffix) = BINARY_SUFFIXES
                    .iter()
                    .rev()
                    .map(|(suffix, power)| (1024u128.pow(*power), *suffix))
                    .find(|(base, _)| value % base == 0)
                    .map(|(base, suffix)| (value / base, suffix))
                    .unwrap_or((value, ""));
                write!(f, "{sign}{scaled}{suffix}")
            }
            Format::DecimalSI => {
                let (scaled, suffix) = largest_decimal_exponent(value);
                let suffix = match suffix {
                    18 => "E",
                    exp => DECIMAL_SUFFIXES
                        .iter()
                        .find(|(_, e)| *e == exp)
                        .map(|(s, _)| *s)
                        .unwrap_or_default(),
                };
                write!(f, "{sign}{scaled}{suffix}")
            }
            Format::DecimalExponent => match largest_decimal_exponent(value) {
                (scaled, 0) => write!(f, "{sign}{scaled}"),
                (scaled, exp) => write!(f, "{sign}{scaled}e{exp}"),
            },
        }
    }
}

fn largest_decimal_exponent(value: u128) -> (u128, i32) {
    let mut scaled = value;
    let mut exp = 0;
    while exp < 18 && scaled % 1000 == 0 {
        scaled /= 1000;
        exp += 3;
    }
    (scaled, exp)
}

/// Parses a kubernetes quantity string such as `500m`, `1.5Gi` or `1e3`.
pub fn parse(quantity: &Quantity) -> QuantityResult<ParsedQuantity> {
    let raw = quantity.0.trim();
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }

    let split = raw
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);

    let (negative, digits) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.strip_prefix('+').unwrap_or(number)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(QuantityError::InvalidNumber(raw.to_string()));
    }

    let overflow = || QuantityError::Overflow(raw.to_string());
    let mantissa: i128 = format!("{whole}{fraction}")
        .parse()
        .map_err(|_| QuantityError::InvalidNumber(raw.to_string()))?;
    let scale = i32::try_from(fraction.len()).map_err(|_| overflow())?;

    let (milli, format) = if let Some((_, power)) =
        BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix)
    {
        let numerator = mantissa
            .checked_mul(1024i128.pow(*power))
            .and_then(|v| v.checked_mul(1000))
            .ok_or_else(overflow)?;
        (shift_decimal(numerator, -scale).ok_or_else(overflow)?, Format::BinarySI)
    } else {
        let (exponent, format) = decimal_exponent(suffix)?;
        let shift = exponent
            .checked_add(3)
            .and_then(|v| v.checked_sub(scale))
            .ok_or_else(overflow)?;
        (shift_decimal(mantissa, shift).ok_or_else(overflow)?, format)
    };

    Ok(ParsedQuantity {
        milli: if negative { -milli } else { milli },
        format,
    })
}

fn decimal_exponent(suffix: &str) -> QuantityResult<(i32, Format)> {
    if suffix == "E" {
        return Ok((18, Format::DecimalSI));
    }
    if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Ok((*exp, Format::DecimalSI));
    }
    match suffix.strip_prefix(['e', 'E']).map(str::parse::<i32>) {
        Some(Ok(exp)) => Ok((exp, Format::DecimalExponent)),
        _ => Err(QuantityError::UnknownSuffix(suffix.to_string())),
    }
}

/// Multiplies by `10^exp`, rounding up when digits are dropped.
fn shift_decimal(value: i128, exp: i32) -> Option<i128> {
    if exp >= 0 {
        return 10i128.checked_pow(exp as u32)?.checked_mul(value);
    }
    let divisor = 10i128.checked_pow(exp.unsigned_abs())?;
    let quotient = value / divisor;
    match value % divisor {
        0 => Some(quotient),
        _ => Some(quotient + 1),
    }
}

/// Compares quantities by value, so `1Gi` equals `1024Mi`.
/// Unparseable quantities fall back to textual comparison.
pub fn semantic_eq(a: &Quantity, b: &Quantity) -> bool {
    match (parse(a), parse(b)) {
        (Ok(a), Ok(b)) => a.milli_value() == b.milli_value(),
        _ => a == b,
    }
}

pub fn resource_lists_semantic_eq(a: &ResourceList, b: &ResourceList) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((ka, va), (kb, vb))| ka == kb && semantic_eq(va, vb))
}
