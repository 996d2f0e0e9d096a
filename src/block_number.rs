use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Block height as the explorer reports it, a `0x` prefixed hex string. Kept in its original
/// text form so snapshots carry exactly what the explorer returned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockNumber {
    hex: String,
    number: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid hex block number: {0:?}")]
pub struct ParseBlockNumberError(String);

impl BlockNumber {
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl FromStr for BlockNumber {
    type Err = ParseBlockNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ParseBlockNumberError(s.to_string()))?;
        let number =
            u64::from_str_radix(digits, 16).map_err(|_| ParseBlockNumberError(s.to_string()))?;
        Ok(BlockNumber {
            hex: s.to_string(),
            number,
        })
    }
}

impl TryFrom<String> for BlockNumber {
    type Error = ParseBlockNumberError;

    fn try_from(hex: String) -> Result<Self, Self::Error> {
        hex.parse()
    }
}

impl From<BlockNumber> for String {
    fn from(block_number: BlockNumber) -> Self {
        block_number.hex
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_test() {
        let block_number: BlockNumber = "0x1a2b3c".parse().unwrap();
        assert_eq!(block_number.number(), 0x1a2b3c);
        assert_eq!(block_number.as_hex(), "0x1a2b3c");
        assert_eq!(block_number.to_string(), "1715004");
    }

    #[test]
    fn reject_missing_prefix_test() {
        assert_eq!(
            "1a2b3c".parse::<BlockNumber>(),
            Err(ParseBlockNumberError("1a2b3c".to_string()))
        );
    }

    #[test]
    fn reject_non_hex_test() {
        assert!("0xzz".parse::<BlockNumber>().is_err());
        assert!("0x".parse::<BlockNumber>().is_err());
    }

    #[test]
    fn deserialize_rejects_invalid_test() {
        assert!(serde_json::from_str::<BlockNumber>("\"latest\"").is_err());
        let block_number: BlockNumber = serde_json::from_str("\"0xff\"").unwrap();
        assert_eq!(block_number.number(), 255);
    }
}
