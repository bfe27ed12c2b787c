mod deploy;
mod mint;
mod transfer;

pub use self::{deploy::Deploy, mint::Mint, transfer::Transfer};

use super::{params::PROTOCOL_LITERAL, JsonError};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
  Deploy(Deploy),
  Mint(Mint),
  Transfer(Transfer),
}

/// Lenient whitespace, strict fields: the body must be a JSON object
/// whose `p` and `op` values match the protocol case-insensitively.
/// Duplicate keys resolve last-wins.
pub fn deserialize_brc20(s: &str) -> Result<Operation, JsonError> {
  let value: Value = serde_json::from_str(s).map_err(|_| JsonError::InvalidJson)?;
  let object = value.as_object().ok_or(JsonError::NotBrc20Json)?;

  let protocol = object
    .get("p")
    .and_then(Value::as_str)
    .ok_or(JsonError::NotBrc20Json)?;
  if !protocol.eq_ignore_ascii_case(PROTOCOL_LITERAL) {
    return Err(JsonError::NotBrc20Json);
  }

  let op = object
    .get("op")
    .and_then(Value::as_str)
    .ok_or(JsonError::NotBrc20Json)?;

  match op.to_ascii_lowercase().as_str() {
    "deploy" => Deploy::from_json(&value).map(Operation::Deploy),
    "mint" => Mint::from_json(&value).map(Operation::Mint),
    "transfer" => Transfer::from_json(&value).map(Operation::Transfer),
    _ => Err(JsonError::NotBrc20Json),
  }
}

impl Serialize for Operation {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("p", PROTOCOL_LITERAL)?;
    match self {
      Operation::Deploy(deploy) => {
        map.serialize_entry("op", "deploy")?;
        map.serialize_entry("tick", deploy.tick.as_str())?;
        map.serialize_entry("max", &deploy.max_supply)?;
        if let Some(limit) = &deploy.mint_limit {
          map.serialize_entry("lim", limit)?;
        }
        map.serialize_entry("dec", &deploy.decimals.to_string())?;
      }
      Operation::Mint(mint) => {
        map.serialize_entry("op", "mint")?;
        map.serialize_entry("tick", mint.tick.as_str())?;
        map.serialize_entry("amt", &mint.amount)?;
      }
      Operation::Transfer(transfer) => {
        map.serialize_entry("op", "transfer")?;
        map.serialize_entry("tick", transfer.tick.as_str())?;
        map.serialize_entry("amt", &transfer.amount)?;
      }
    }
    map.end()
  }
}
