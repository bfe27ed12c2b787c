use crate::{
  num::Num,
  protocol::{
    params::{default_decimals, MAX_DECIMAL_WIDTH},
    JsonError,
  },
  tick::Tick,
};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, PartialEq, Clone)]
pub struct Deploy {
  pub tick: Tick,
  pub max_supply: Num,
  pub mint_limit: Option<Num>,
  pub decimals: u8,
}

#[derive(Deserialize)]
struct RawDeploy {
  tick: String,
  max: String,
  lim: Option<String>,
  dec: Option<String>,
}

impl Deploy {
  pub(super) fn from_json(value: &Value) -> Result<Self, JsonError> {
    let raw: RawDeploy = serde_json::from_value(value.clone())
      .map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;

    let tick = Tick::from_str(&raw.tick)
      .map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;

    let max_supply = Num::from_str(&raw.max)
      .map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;
    if !max_supply.is_positive() {
      return Err(JsonError::ParseOperationJsonError(format!(
        "max must be positive: {}",
        raw.max
      )));
    }

    let mint_limit = raw
      .lim
      .map(|lim| {
        let limit =
          Num::from_str(&lim).map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;
        if !limit.is_positive() {
          return Err(JsonError::ParseOperationJsonError(format!(
            "lim must be positive: {lim}"
          )));
        }
        Ok(limit)
      })
      .transpose()?;

    let decimals = match raw.dec {
      None => default_decimals(),
      Some(dec) => {
        let decimals = Num::from_str(&dec)
          .and_then(|n| n.checked_to_u8())
          .map_err(|e| JsonError::ParseOperationJsonError(e.to_string()))?;
        if decimals > MAX_DECIMAL_WIDTH {
          return Err(JsonError::ParseOperationJsonError(format!(
            "dec out of range: {dec}"
          )));
        }
        decimals
      }
    };

    Ok(Self {
      tick,
      max_supply,
      mint_limit,
      decimals,
    })
  }
}
