//! Exact arithmetic on Kubernetes resource quantities.

use core::error::Error;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::ops::AddAssign;
use std::ops::Sub;
use std::str::FromStr;

use error_stack::Report;

/// Errors that can occur while parsing a quantity string.
#[derive(Debug, derive_more::Display)]
pub enum QuantityError {
    #[display("quantity is empty")]
    Empty,
    #[display("invalid number in quantity `{value}`")]
    InvalidNumber { value: String },
    #[display("unsupported suffix `{suffix}` in quantity `{value}`")]
    UnsupportedSuffix { value: String, suffix: String },
}

impl Error for QuantityError {}

/// A resource amount such as `8`, `500m` or `16Gi`, stored as whole
/// milli-units.
///
/// Amounts finer than a milli-unit are rounded up, the same way the API
/// server canonicalises resource requests. Arithmetic saturates at the
/// bounds of the representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    millis: i128,
}

impl Quantity {
    pub const fn zero() -> Self {
        Self { millis: 0 }
    }

    pub const fn from_millis(millis: i128) -> Self {
        Self { millis }
    }

    pub const fn from_units(units: i64) -> Self {
        Self {
            millis: units as i128 * 1000,
        }
    }

    pub const fn millis(&self) -> i128 {
        self.millis
    }

    pub const fn is_positive(&self) -> bool {
        self.millis > 0
    }

    pub fn as_f64(&self) -> f64 {
        self.millis as f64 / 1000.0
    }

    /// Parse a Kubernetes quantity string.
    ///
    /// Accepted forms are a decimal number followed by an optional decimal SI
    /// suffix (`n u m k M G T P E`), binary suffix (`Ki Mi Gi Ti Pi Ei`) or
    /// decimal exponent (`1e3`, `5E-2`).
    ///
    /// # Errors
    ///
    /// - [`QuantityError::Empty`] for blank input
    /// - [`QuantityError::InvalidNumber`] if the numeric part is malformed or
    ///   the value does not fit
    /// - [`QuantityError::UnsupportedSuffix`] for any other suffix
    pub fn parse(raw: &str) -> Result<Self, Report<QuantityError>> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(Report::new(QuantityError::Empty));
        }
        let invalid = || {
            Report::new(QuantityError::InvalidNumber {
                value: value.to_string(),
            })
        };

        let (negative, body) = match value.as_bytes()[0] {
            b'-' => (true, &value[1..]),
            b'+' => (false, &value[1..]),
            _ => (false, value),
        };

        let number_end = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (number, suffix) = body.split_at(number_end);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
            return Err(invalid());
        }
        let digits = format!("{int_part}{frac_part}");
        if digits.len() > 30 {
            return Err(invalid());
        }
        let mantissa: i128 = digits.parse().map_err(|_| invalid())?;

        let (base, exp10) = suffix_factor(value, suffix)?;
        let numerator = mantissa.checked_mul(base).ok_or_else(invalid)?;

        // value = mantissa * base * 10^(exp10 - scale), scaled by 1000 for millis
        let power = exp10 - frac_part.len() as i32 + 3;
        let millis = if power >= 0 {
            10_i128
                .checked_pow(power.unsigned_abs())
                .and_then(|factor| numerator.checked_mul(factor))
                .ok_or_else(invalid)?
        } else {
            match 10_i128.checked_pow(power.unsigned_abs()) {
                Some(divisor) => ceil_div(numerator, divisor),
                None => i128::from(numerator > 0),
            }
        };

        Ok(Self {
            millis: if negative { -millis } else { millis },
        })
    }
}

fn ceil_div(numerator: i128, divisor: i128) -> i128 {
    let quotient = numerator / divisor;
    if numerator % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

/// Returns the binary multiplier and the power of ten a suffix stands for.
fn suffix_factor(value: &str, suffix: &str) -> Result<(i128, i32), Report<QuantityError>> {
    let factor = match suffix {
        "" => (1, 0),
        "n" => (1, -9),
        "u" => (1, -6),
        "m" => (1, -3),
        "k" => (1, 3),
        "M" => (1, 6),
        "G" => (1, 9),
        "T" => (1, 12),
        "P" => (1, 15),
        "E" => (1, 18),
        "Ki" => (1 << 10, 0),
        "Mi" => (1 << 20, 0),
        "Gi" => (1 << 30, 0),
        "Ti" => (1 << 40, 0),
        "Pi" => (1 << 50, 0),
        "Ei" => (1 << 60, 0),
        _ => {
            let exponent = suffix
                .strip_prefix(['e', 'E'])
                .and_then(|exp| exp.parse::<i32>().ok())
                .ok_or_else(|| {
                    Report::new(QuantityError::UnsupportedSuffix {
                        value: value.to_string(),
                        suffix: suffix.to_string(),
                    })
                })?;
            if exponent.abs() > 30 {
                return Err(Report::new(QuantityError::InvalidNumber {
                    value: value.to_string(),
                }));
            }
            (1, exponent)
        }
    };
    Ok(factor)
}

impl FromStr for Quantity {
    type Err = Report<QuantityError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.millis < 0 { "-" } else { "" };
        let abs = self.millis.unsigned_abs();
        let (units, fraction) = (abs / 1000, abs % 1000);
        if fraction == 0 {
            write!(f, "{sign}{units}")
        } else {
            let fraction = format!("{fraction:03}");
            write!(f, "{sign}{units}.{}", fraction.trim_end_matches('0'))
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            millis: self.millis.saturating_add(rhs.millis),
        }
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Quantity {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            millis: self.millis.saturating_sub(rhs.millis),
        }
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}
