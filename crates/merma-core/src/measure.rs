//! Fact measures: two-decimal fixed-point quantities and the derived unit
//! price.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Decimal2 ────────────────────────────────────────────────────────────────

/// A fixed-point number with exactly two fractional digits, stored as
/// hundredths. Matches the `DECIMAL(_, 2)` columns of the fact table.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
  Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Decimal2(i64);

impl Decimal2 {
  pub const ZERO: Self = Self(0);

  pub const fn from_hundredths(hundredths: i64) -> Self { Self(hundredths) }

  pub const fn hundredths(self) -> i64 { self.0 }

  pub const fn is_zero(self) -> bool { self.0 == 0 }
}

impl FromStr for Decimal2 {
  type Err = Error;

  /// Parses `[+-]digits[.digits]`. Fractional digits beyond the second are
  /// rounded half away from zero.
  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidDecimal(s.to_string());

    let t = s.trim();
    let (negative, digits) = match t.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    if int_part.is_empty() && frac_part.is_empty() {
      return Err(invalid());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }

    let int: i64 = if int_part.is_empty() {
      0
    } else {
      int_part.parse().map_err(|_| invalid())?
    };

    let mut frac = frac_part.bytes().map(|b| i64::from(b - b'0'));
    let tenths = frac.next().unwrap_or(0);
    let cents = frac.next().unwrap_or(0);
    let round_up = frac.next().is_some_and(|d| d >= 5);

    let magnitude = int
      .checked_mul(100)
      .and_then(|v| v.checked_add(tenths * 10 + cents + i64::from(round_up)))
      .ok_or_else(invalid)?;

    Ok(Self(if negative { -magnitude } else { magnitude }))
  }
}

impl fmt::Display for Decimal2 {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
  }
}

impl From<Decimal2> for String {
  fn from(d: Decimal2) -> Self { d.to_string() }
}

impl TryFrom<String> for Decimal2 {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

// ─── UnitPrice ───────────────────────────────────────────────────────────────

/// Amount lost per unit lost, rounded to the nearest whole currency unit.
///
/// `Undefined` marks a row whose quantity is zero or missing (or whose amount
/// is missing); it is persisted as `NULL`, never as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPrice {
  Defined(i64),
  Undefined,
}

impl UnitPrice {
  /// `round(amount / quantity)` with round-half-to-even on the exact
  /// quotient.
  pub fn derive(quantity: Option<Decimal2>, amount: Option<Decimal2>) -> Self {
    let (Some(quantity), Some(amount)) = (quantity, amount) else {
      return Self::Undefined;
    };
    if quantity.is_zero() {
      return Self::Undefined;
    }

    // Both sides are in hundredths, so their ratio is the ratio of the values.
    let rounded =
      round_half_even(i128::from(amount.hundredths()), i128::from(quantity.hundredths()));
    match i64::try_from(rounded) {
      Ok(v) => Self::Defined(v),
      Err(_) => Self::Undefined,
    }
  }

  pub fn is_defined(self) -> bool { matches!(self, Self::Defined(_)) }

  pub fn value(self) -> Option<i64> {
    match self {
      Self::Defined(v) => Some(v),
      Self::Undefined => None,
    }
  }
}

/// Divide `num` by a non-zero `den`, rounding ties to the even neighbour.
fn round_half_even(num: i128, den: i128) -> i128 {
  let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
  let q = num.div_euclid(den);
  let r = num.rem_euclid(den);
  match (2 * r).cmp(&den) {
    std::cmp::Ordering::Less => q,
    std::cmp::Ordering::Greater => q + 1,
    std::cmp::Ordering::Equal if q % 2 == 0 => q,
    std::cmp::Ordering::Equal => q + 1,
  }
}
