use bigdecimal::{num_bigint::Sign, BigDecimal, ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
  fmt::{Display, Formatter},
  str::FromStr,
};

pub const MAX_DECIMAL_WIDTH: u8 = 18;

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct Num(BigDecimal);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NumError {
  #[error("invalid number: {0}")]
  InvalidNum(String),

  #[error("{op} overflow: original: {org}, other: {other}")]
  Overflow { op: String, org: Num, other: Num },

  #[error("invalid integer: {0}")]
  InvalidInteger(Num),

  #[error("negative value: {0}")]
  NegativeValue(String),
}

impl Num {
  pub fn zero() -> Self {
    Self(BigDecimal::from(0u32))
  }

  pub fn checked_add(&self, other: &Num) -> Result<Self, NumError> {
    Ok(Self(&self.0 + &other.0))
  }

  pub fn checked_sub(&self, other: &Num) -> Result<Self, NumError> {
    if self.0 < other.0 {
      return Err(NumError::Overflow {
        op: String::from("checked_sub"),
        org: self.clone(),
        other: other.clone(),
      });
    }

    Ok(Self(&self.0 - &other.0))
  }

  pub fn min(&self, other: &Num) -> Self {
    if self.0 <= other.0 {
      self.clone()
    } else {
      other.clone()
    }
  }

  /// Count of fractional digits as parsed.
  pub fn scale(&self) -> i64 {
    let (_, scale) = self.0.as_bigint_and_exponent();
    scale.max(0)
  }

  pub fn is_positive(&self) -> bool {
    self.0.sign() == Sign::Plus
  }

  pub fn checked_to_u8(&self) -> Result<u8, NumError> {
    if !self.0.is_integer() {
      return Err(NumError::InvalidInteger(self.clone()));
    }
    self.0.to_u8().ok_or(NumError::Overflow {
      op: String::from("to_u8"),
      org: self.clone(),
      other: Self(BigDecimal::from(u8::MAX)),
    })
  }

  pub fn to_decimal(&self) -> BigDecimal {
    self.0.clone()
  }
}

/// Non-negative values are closed under addition, so `+` is total.
impl std::ops::Add for &Num {
  type Output = Num;

  fn add(self, rhs: &Num) -> Num {
    Num(&self.0 + &rhs.0)
  }
}

impl From<u64> for Num {
  fn from(n: u64) -> Self {
    Self(BigDecimal::from(n))
  }
}

/// Ledger sums come back signed; a negative sum means the balance
/// invariant was broken upstream.
impl TryFrom<BigDecimal> for Num {
  type Error = NumError;

  fn try_from(value: BigDecimal) -> Result<Self, Self::Error> {
    if value.sign() == Sign::Minus {
      return Err(NumError::NegativeValue(value.to_string()));
    }
    Ok(Self(value))
  }
}

impl FromStr for Num {
  type Err = NumError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.starts_with('.') || s.ends_with('.') || s.find(['e', 'E', '+', '-']).is_some() {
      return Err(NumError::InvalidNum(s.to_string()));
    }
    let num = BigDecimal::from_str(s).map_err(|_| NumError::InvalidNum(s.to_string()))?;

    let (_, scale) = num.as_bigint_and_exponent();
    if scale > MAX_DECIMAL_WIDTH as i64 {
      return Err(NumError::InvalidNum(s.to_string()));
    }

    Ok(Self(num))
  }
}

impl Display for Num {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    // canonical form: trailing fractional zeros trimmed
    self.0.normalized().fmt(f)
  }
}

impl Serialize for Num {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for Num {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let s = String::deserialize(deserializer)?;
    Self::from_str(&s).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_str_accepts_plain_decimals() {
    assert_eq!(Num::from_str("1.1").unwrap(), Num::from_str("1.1000").unwrap());
    assert_eq!(Num::from_str("001").unwrap(), Num::from_str("1").unwrap());
    assert_eq!(Num::from_str("00.1").unwrap(), Num::from_str("0.100").unwrap());
    assert_eq!(Num::from_str("0.0").unwrap(), Num::zero());
  }

  #[test]
  fn from_str_rejects_malformed() {
    assert!(Num::from_str("").is_err());
    assert!(Num::from_str(" ").is_err());
    assert!(Num::from_str(".").is_err());
    assert!(Num::from_str(".456").is_err());
    assert!(Num::from_str("123456789.").is_err());
    assert!(Num::from_str(" 123.456").is_err());
    assert!(Num::from_str("123. 456").is_err());
    assert!(Num::from_str("123.456.789").is_err());
    assert!(Num::from_str("-1.1").is_err());
    assert!(Num::from_str("+123.456").is_err());
    assert!(Num::from_str("123.-456").is_err());
    assert!(Num::from_str("1e2").is_err());
    assert!(Num::from_str("0E2").is_err());
  }

  #[test]
  fn from_str_caps_fractional_width() {
    assert!(Num::from_str("1.000000000000000001").is_ok());
    assert!(Num::from_str("1.0000000000000000001").is_err());
  }

  #[test]
  fn checked_add_and_sub() {
    let one = Num::from_str("1.101").unwrap();
    let two = Num::from_str("1.121").unwrap();
    assert_eq!(one.checked_add(&two).unwrap(), Num::from_str("2.222").unwrap());

    let three = Num::from_str("3.303").unwrap();
    assert_eq!(
      three.checked_sub(&Num::from_str("1.081").unwrap()).unwrap(),
      Num::from_str("2.222").unwrap()
    );
    assert!(one.checked_sub(&two).is_err());
  }

  #[test]
  fn min_picks_smaller() {
    let a = Num::from_str("20").unwrap();
    let b = Num::from_str("50").unwrap();
    assert_eq!(a.min(&b), a);
    assert_eq!(b.min(&a), a);
    assert_eq!(a.min(&a), a);
  }

  #[test]
  fn scale_counts_fractional_digits() {
    assert_eq!(Num::from_str("21000000").unwrap().scale(), 0);
    assert_eq!(Num::from_str("1.05").unwrap().scale(), 2);
    assert_eq!(Num::from_str("0.000000000000000001").unwrap().scale(), 18);
  }

  #[test]
  fn positivity() {
    assert!(Num::from_str("0.001").unwrap().is_positive());
    assert!(!Num::from_str("0").unwrap().is_positive());
    assert!(!Num::from_str("0.00").unwrap().is_positive());
  }

  #[test]
  fn checked_to_u8_requires_integer() {
    assert_eq!(Num::from_str("18").unwrap().checked_to_u8().unwrap(), 18);
    assert_eq!(Num::from_str("15.00").unwrap().checked_to_u8().unwrap(), 15);
    assert!(Num::from_str("0.5").unwrap().checked_to_u8().is_err());
    assert!(Num::from_str("256").unwrap().checked_to_u8().is_err());
  }

  #[test]
  fn display_is_canonical() {
    assert_eq!(Num::from_str("1.1000").unwrap().to_string(), "1.1");
    assert_eq!(Num::from_str("00.00100").unwrap().to_string(), "0.001");
    assert_eq!(Num::from_str("0.0").unwrap().to_string(), "0");
    assert_eq!(Num::from_str("500").unwrap().to_string(), "500");
  }

  #[test]
  fn serde_round_trips_as_string() {
    let num = Num::from_str("1.01").unwrap();
    let json = serde_json::to_string(&num).unwrap();
    assert_eq!(json.as_str(), "\"1.01\"");
    assert_eq!(serde_json::from_str::<Num>(&json).unwrap(), num);

    assert!(serde_json::from_str::<Num>("\"1e2\"").is_err());
  }

  #[test]
  fn negative_sum_is_rejected() {
    let sum = BigDecimal::from_str("-0.1").unwrap();
    assert!(Num::try_from(sum).is_err());
    let sum = BigDecimal::from_str("0.1").unwrap();
    assert_eq!(Num::try_from(sum).unwrap(), Num::from_str("0.1").unwrap());
  }

  #[test]
  fn max_token_quantity_is_exact() {
    let max = format!("{}.999999999999999999", u64::MAX);
    let num = Num::from_str(&max).unwrap();
    assert_eq!(num.scale(), 18);
    assert!(num > Num::from(u64::MAX));
  }
}
