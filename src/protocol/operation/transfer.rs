use crate::{num::Num, protocol::JsonError, tick::Tick};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, PartialEq, Clone)]
pub struct Transfer {
  pub tick: Tick,
  pub amount: Num,
}

#[derive(Deserialize)]
struct RawTransfer {
  tick: String,
  amt: String,
}

impl Transfer {
  pub(super) fn from_json(value: &Value) -> Result<Self, JsonError> {
    let raw: RawTransfer = serde_json::from_value(value.clone())
      .map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;

    let tick = Tick::from_str(&raw.tick)
      .map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;

    let amount = Num::from_str(&raw.amt)
      .map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;
    if !amount.is_positive() {
      return Err(JsonError::ParseOperationJsonError(format!(
        "amt must be positive: {}",
        raw.amt
      )));
    }

    Ok(Self { tick, amount })
  }
}
