use crate::error::Brc20Error;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt::Display, str::FromStr};

pub const TICK_BYTE_COUNT: usize = 4;

/// Token ticker. Original casing is kept for display; identity is the
/// Unicode-lowercased form.
#[derive(Debug, Clone)]
pub struct Tick(String);

impl FromStr for Tick {
  type Err = Brc20Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.len() != TICK_BYTE_COUNT {
      return Err(Brc20Error::InvalidTickLen(s.to_string()));
    }
    Ok(Self(s.to_string()))
  }
}

impl Tick {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Identity key, matching the ledger's lowercased unique column.
  pub fn lower(&self) -> String {
    self.0.to_lowercase()
  }
}

impl PartialEq for Tick {
  fn eq(&self, other: &Self) -> bool {
    self.lower() == other.lower()
  }
}

impl Display for Tick {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

impl Serialize for Tick {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    self.as_str().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Tick {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    Self::from_str(&String::deserialize(deserializer)?)
      .map_err(|e| de::Error::custom(format!("deserialize tick error: {e}")))
  }
}
