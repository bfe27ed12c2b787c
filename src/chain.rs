use crate::inscription_id::InscriptionId;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

/// One delivery from the upstream block source. Apply and rollback share
/// a single stream so their interleaving is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChainEvent {
  BlockApply(BlockApply),
  BlockRollback(BlockRollback),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockApply {
  pub height: u64,
  pub hash: String,
  pub prev_hash: String,
  pub inscriptions: Vec<InscriptionEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRollback {
  pub height: u64,
  pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InscriptionEvent {
  /// First appearance of an inscription, payload included.
  Genesis(InscriptionGenesis),
  /// Any subsequent movement of an inscription.
  Transfer(InscriptionTransfer),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionGenesis {
  pub inscription_id: InscriptionId,
  pub number: i64,
  #[serde(with = "payload_hex")]
  pub payload: Vec<u8>,
  pub mime: String,
  pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionTransfer {
  pub inscription_id: InscriptionId,
  pub location: Location,
}

/// Where an inscription currently sits. `address` is absent when it was
/// spent as a fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub block_height: u64,
  pub tx_id: Txid,
  pub address: Option<String>,
  pub offset: u64,
}

mod payload_hex {
  use serde::{de, Deserialize, Deserializer, Serializer};

  pub fn serialize<S>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&hex::encode(payload))
  }

  pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
  where
    D: Deserializer<'de>,
  {
    hex::decode(String::deserialize(deserializer)?).map_err(de::Error::custom)
  }
}
