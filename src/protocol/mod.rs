mod operation;
mod params;

pub use self::{
  operation::{deserialize_brc20, Deploy, Mint, Operation, Transfer},
  params::{default_decimals, MAXIMUM_SUPPLY, MAX_DECIMAL_WIDTH, PROTOCOL_LITERAL},
};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum JsonError {
  #[error("unsupported content type")]
  UnsupportedContentType,

  #[error("invalid utf-8 payload")]
  InvalidUtf8,

  #[error("invalid json string")]
  InvalidJson,

  #[error("not brc20 json")]
  NotBrc20Json,

  #[error("parse operation json error: {0}")]
  ParseOperationJsonError(String),
}

fn is_brc20_content_type(content_type: &str) -> bool {
  content_type == "text/plain"
    || content_type == "application/json"
    || content_type.starts_with("text/plain;")
    || content_type.starts_with("application/json;")
}

/// Decode a raw inscription payload into a typed BRC-20 operation.
/// Any failure means the inscription is not a BRC-20 operation.
pub fn deserialize_brc20_operation(
  payload: &[u8],
  content_type: &str,
) -> Result<Operation, JsonError> {
  if !is_brc20_content_type(content_type) {
    return Err(JsonError::UnsupportedContentType);
  }
  let body = std::str::from_utf8(payload).map_err(|_| JsonError::InvalidUtf8)?;
  deserialize_brc20(body)
}
