use crate::num::Num;
use once_cell::sync::Lazy;

pub use crate::num::MAX_DECIMAL_WIDTH;

pub const PROTOCOL_LITERAL: &str = "brc-20";

/// The protocol caps supplies at the largest 64-bit integer.
pub static MAXIMUM_SUPPLY: Lazy<Num> = Lazy::new(|| Num::from(u64::MAX));

pub const fn default_decimals() -> u8 {
  MAX_DECIMAL_WIDTH
}
