use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use crate::error::{TesseraError, TesseraResult};

/// An exact rational number used as a time coordinate (seconds).
///
/// Always stored normalized: the denominator is positive and the fraction is
/// fully reduced, so structural equality is numeric equality. Ordering is
/// computed by cross-multiplication in 128-bit integers and never goes
/// through floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Create a normalized rational. Fails if `den` is zero.
    pub fn new(num: i64, den: i64) -> TesseraResult<Self> {
        if den == 0 {
            return Err(TesseraError::InvalidArgument(format!(
                "rational {}/0 has a zero denominator",
                num
            )));
        }
        Self::from_wide(num as i128, den as i128).ok_or_else(|| {
            TesseraError::InvalidArgument(format!("rational {}/{} is out of range", num, den))
        })
    }

    /// Create a whole-number rational.
    pub const fn from_integer(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    pub fn numerator(&self) -> i64 {
        self.num
    }

    pub fn denominator(&self) -> i64 {
        self.den
    }

    /// Approximate value, for display and logging only.
    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Reciprocal. `None` for zero.
    pub fn recip(&self) -> Option<Self> {
        if self.num == 0 {
            return None;
        }
        Self::from_wide(self.den as i128, self.num as i128)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let num = self.num as i128 * rhs.den as i128 + rhs.num as i128 * self.den as i128;
        let den = self.den as i128 * rhs.den as i128;
        Self::from_wide(num, den)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let num = self.num as i128 * rhs.den as i128 - rhs.num as i128 * self.den as i128;
        let den = self.den as i128 * rhs.den as i128;
        Self::from_wide(num, den)
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        Self::from_wide(
            self.num as i128 * rhs.num as i128,
            self.den as i128 * rhs.den as i128,
        )
    }

    /// `n * self`, used to step through frames at a fixed frame duration.
    pub fn checked_mul_int(self, n: i64) -> Option<Self> {
        self.checked_mul(Self::from_integer(n))
    }

    fn from_wide(mut num: i128, mut den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        if den < 0 {
            num = -num;
            den = -den;
        }
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()) as i128;
        if g > 1 {
            num /= g;
            den /= g;
        }
        if num == 0 {
            den = 1;
        }
        Some(Self {
            num: i64::try_from(num).ok()?,
            den: i64::try_from(den).ok()?,
        })
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        // Denominators are positive, so cross-multiplying preserves order.
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for Rational {
    type Output = Rational;

    /// # Panics
    /// Panics if the reduced result does not fit in 64-bit terms.
    fn add(self, rhs: Rational) -> Rational {
        self.checked_add(rhs)
            .unwrap_or_else(|| panic!("rational overflow: {} + {}", self, rhs))
    }
}

impl Sub for Rational {
    type Output = Rational;

    /// # Panics
    /// Panics if the reduced result does not fit in 64-bit terms.
    fn sub(self, rhs: Rational) -> Rational {
        self.checked_sub(rhs)
            .unwrap_or_else(|| panic!("rational overflow: {} - {}", self, rhs))
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Rational::from_integer(n)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl FromStr for Rational {
    type Err = TesseraError;

    /// Parses `"n"` or `"num/den"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TesseraError::InvalidArgument(format!("invalid rational '{}'", s));
        let s = s.trim();
        match s.split_once('/') {
            Some((num, den)) => {
                let num = num.trim().parse::<i64>().map_err(|_| invalid())?;
                let den = den.trim().parse::<i64>().map_err(|_| invalid())?;
                Rational::new(num, den)
            }
            None => s
                .parse::<i64>()
                .map(Rational::from_integer)
                .map_err(|_| invalid()),
        }
    }
}

impl TryFrom<String> for Rational {
    type Error = TesseraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rational> for String {
    fn from(value: Rational) -> Self {
        value.to_string()
    }
}

/// A half-open evaluation window `[in, out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    in_point: Rational,
    out_point: Rational,
}

impl TimeRange {
    /// Create a window. Fails if `in_point > out_point`.
    pub fn new(in_point: Rational, out_point: Rational) -> TesseraResult<Self> {
        if in_point > out_point {
            return Err(TesseraError::InvalidArgument(format!(
                "time range in point {} is after out point {}",
                in_point, out_point
            )));
        }
        Ok(Self {
            in_point,
            out_point,
        })
    }

    /// The window covering a single frame `index` at frame rate `rate`
    /// (frames per second).
    pub fn frame(index: i64, rate: Rational) -> TesseraResult<Self> {
        let frame_duration = rate.recip().ok_or_else(|| {
            TesseraError::InvalidArgument("frame rate must not be zero".to_string())
        })?;
        let overflow = || TesseraError::InvalidArgument(format!("frame {} is out of range", index));
        let in_point = frame_duration.checked_mul_int(index).ok_or_else(overflow)?;
        let out_point = frame_duration
            .checked_mul_int(index + 1)
            .ok_or_else(overflow)?;
        Self::new(in_point, out_point)
    }

    /// A window starting at `in_point` and lasting one frame at `rate`.
    pub fn starting_at(in_point: Rational, rate: Rational) -> TesseraResult<Self> {
        let frame_duration = rate.recip().ok_or_else(|| {
            TesseraError::InvalidArgument("frame rate must not be zero".to_string())
        })?;
        let out_point = in_point.checked_add(frame_duration).ok_or_else(|| {
            TesseraError::InvalidArgument(format!("time {} is out of range", in_point))
        })?;
        Self::new(in_point, out_point)
    }

    pub fn in_point(&self) -> Rational {
        self.in_point
    }

    pub fn out_point(&self) -> Rational {
        self.out_point
    }

    /// Length of the window, `None` when it does not fit in a `Rational`.
    pub fn duration(&self) -> Option<Rational> {
        self.out_point.checked_sub(self.in_point)
    }

    pub fn is_empty(&self) -> bool {
        self.in_point == self.out_point
    }

    /// Half-open containment: `in <= t < out`.
    pub fn contains(&self, t: Rational) -> bool {
        self.in_point <= t && t < self.out_point
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.in_point, self.out_point)
    }
}
