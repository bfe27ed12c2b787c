use bitcoin::Txid;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
  fmt::{self, Display, Formatter},
  str::FromStr,
};

/// Inscription genesis id in the `<txid>i<index>` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InscriptionId {
  pub txid: Txid,
  pub index: u32,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseInscriptionIdError {
  #[error("invalid inscription id separator")]
  Separator,

  #[error("invalid txid in inscription id: {0}")]
  Txid(String),

  #[error("invalid index in inscription id: {0}")]
  Index(String),
}

impl FromStr for InscriptionId {
  type Err = ParseInscriptionIdError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (txid, index) = s
      .rsplit_once('i')
      .ok_or(ParseInscriptionIdError::Separator)?;
    Ok(Self {
      txid: txid
        .parse()
        .map_err(|_| ParseInscriptionIdError::Txid(txid.to_string()))?,
      index: index
        .parse()
        .map_err(|_| ParseInscriptionIdError::Index(index.to_string()))?,
    })
  }
}

impl Display for InscriptionId {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}i{}", self.txid, self.index)
  }
}

impl Serialize for InscriptionId {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for InscriptionId {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    Self::from_str(&String::deserialize(deserializer)?).map_err(de::Error::custom)
  }
}
