//! Fixed-point decimal with 18 fractional digits.
//!
//! Every reward amount and ratio in the ledger is a `Dec`. Values are stored
//! as an arbitrary precision integer scaled by `10^18`, so addition and
//! subtraction are exact and multiplication/division expose explicit rounding:
//! the `*_truncate` variants round toward zero, the plain variants round half
//! to even.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of fractional decimal digits.
pub const PRECISION: u32 = 18;

const SCALE: u64 = 1_000_000_000_000_000_000;

fn scale() -> BigInt {
    BigInt::from(SCALE)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecError {
    #[error("empty decimal string")]
    Empty,
    #[error("invalid decimal string: {0}")]
    Invalid(String),
    #[error("too many fractional digits ({digits} > {max})", max = PRECISION)]
    TooPrecise { digits: usize },
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Dec(BigInt);

impl Dec {
    pub fn zero() -> Self {
        Dec(BigInt::zero())
    }

    pub fn one() -> Self {
        Dec(scale())
    }

    /// The smallest positive value, `10^-18`.
    pub fn smallest() -> Self {
        Dec(BigInt::from(1u8))
    }

    pub fn from_u128(v: u128) -> Self {
        Dec(BigInt::from(v) * scale())
    }

    pub fn from_u64(v: u64) -> Self {
        Dec(BigInt::from(v) * scale())
    }

    pub fn from_i64(v: i64) -> Self {
        Dec(BigInt::from(v) * scale())
    }

    /// `v * 10^-prec`, e.g. `Dec::with_prec(5, 2) == 0.05`.
    ///
    /// # Panics
    /// When `prec` exceeds [`PRECISION`].
    pub fn with_prec(v: i64, prec: u32) -> Self {
        assert!(prec <= PRECISION, "precision {prec} exceeds {PRECISION}");
        Dec(BigInt::from(v) * BigInt::from(10u8).pow(PRECISION - prec))
    }

    /// Percentage helper: `Dec::percent(50) == 0.5`.
    pub fn percent(v: i64) -> Self {
        Self::with_prec(v, 2)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn abs(&self) -> Dec {
        Dec(self.0.abs())
    }

    /// Multiply, rounding half to even.
    pub fn mul(&self, other: &Dec) -> Dec {
        Dec(chop_and_round(&self.0 * &other.0))
    }

    /// Multiply, rounding toward zero.
    pub fn mul_truncate(&self, other: &Dec) -> Dec {
        Dec((&self.0 * &other.0) / scale())
    }

    pub fn mul_int(&self, v: u128) -> Dec {
        Dec(&self.0 * BigInt::from(v))
    }

    /// Divide, rounding half to even.
    ///
    /// # Panics
    /// On division by zero.
    pub fn quo(&self, other: &Dec) -> Dec {
        assert!(!other.is_zero(), "decimal division by zero");
        let numerator = &self.0 * scale() * scale();
        Dec(chop_and_round(numerator / &other.0))
    }

    /// Divide, rounding toward zero.
    ///
    /// # Panics
    /// On division by zero.
    pub fn quo_truncate(&self, other: &Dec) -> Dec {
        assert!(!other.is_zero(), "decimal division by zero");
        Dec((&self.0 * scale()) / &other.0)
    }

    /// Divide by an integer, rounding half to even.
    pub fn quo_int(&self, v: u128) -> Dec {
        self.quo(&Dec::from_u128(v))
    }

    /// Integer part, rounding toward zero.
    pub fn truncate_int(&self) -> BigInt {
        &self.0 / scale()
    }

    /// Drop the fractional digits, keeping the value as a `Dec`.
    pub fn truncate_dec(&self) -> Dec {
        Dec(self.truncate_int() * scale())
    }

    /// Integer part as `u128`; `None` for negative or oversized values.
    pub fn truncate_u128(&self) -> Option<u128> {
        self.truncate_int().to_u128()
    }

    pub fn truncate_u64(&self) -> Option<u64> {
        self.truncate_int().to_u64()
    }
}

/// Remove the extra 18 digits of a raw product, rounding half to even.
fn chop_and_round(value: BigInt) -> BigInt {
    let negative = value.is_negative();
    let value = value.abs();
    let scale = scale();
    let quotient = &value / &scale;
    let remainder = &value % &scale;
    let half = BigInt::from(SCALE / 2);

    let rounded = match remainder.cmp(&half) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + BigInt::from(1u8),
        Ordering::Equal => {
            if (&quotient % BigInt::from(2u8)).is_zero() {
                quotient
            } else {
                quotient + BigInt::from(1u8)
            }
        }
    };

    if negative {
        -rounded
    } else {
        rounded
    }
}

impl Add for Dec {
    type Output = Dec;
    fn add(self, rhs: Dec) -> Dec {
        Dec(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Dec> for &'a Dec {
    type Output = Dec;
    fn add(self, rhs: &'a Dec) -> Dec {
        Dec(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Dec> for Dec {
    fn add_assign(&mut self, rhs: &Dec) {
        self.0 += &rhs.0;
    }
}

impl Sub for Dec {
    type Output = Dec;
    fn sub(self, rhs: Dec) -> Dec {
        Dec(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Dec> for &'a Dec {
    type Output = Dec;
    fn sub(self, rhs: &'a Dec) -> Dec {
        Dec(&self.0 - &rhs.0)
    }
}

impl SubAssign<&Dec> for Dec {
    fn sub_assign(&mut self, rhs: &Dec) {
        self.0 -= &rhs.0;
    }
}

impl Neg for Dec {
    type Output = Dec;
    fn neg(self) -> Dec {
        Dec(-self.0)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.abs();
        let scale = scale();
        let integer = &abs / &scale;
        let fraction = &abs % &scale;
        let sign = if self.0.sign() == Sign::Minus { "-" } else { "" };
        write!(
            f,
            "{sign}{integer}.{fraction:0>width$}",
            fraction = fraction.to_string(),
            width = PRECISION as usize
        )
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({self})")
    }
}

impl FromStr for Dec {
    type Err = DecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecError::Empty);
        }

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (integer, fraction) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        let digits_only = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if integer.is_empty() || !digits_only(integer) || !digits_only(fraction) {
            return Err(DecError::Invalid(s.to_string()));
        }
        if fraction.len() > PRECISION as usize {
            return Err(DecError::TooPrecise {
                digits: fraction.len(),
            });
        }

        let padded = format!("{integer}{fraction:0<width$}", width = PRECISION as usize);
        let raw = BigInt::from_str(&padded).map_err(|_| DecError::Invalid(s.to_string()))?;
        Ok(Dec(if negative { -raw } else { raw }))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
