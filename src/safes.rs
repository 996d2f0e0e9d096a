//! Safes
//! =====
//! The shape of a Circles safe as the subgraph returns it, and the snapshot the download job
//! writes. Values pass through untouched so a snapshot re-serialises to the same bytes it was
//! parsed from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::block_number::BlockNumber;

/// GraphQL `BigInt`s arrive as decimal strings, older dumps carry plain JSON numbers. Whichever
/// form came in goes back out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BigNumber {
    Text(String),
    Number(serde_json::Number),
}

impl BigNumber {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            BigNumber::Text(text) => text.parse().ok(),
            BigNumber::Number(number) => number.as_u64(),
        }
    }
}

impl From<u64> for BigNumber {
    fn from(num: u64) -> Self {
        BigNumber::Text(num.to_string())
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BigNumber::Text(text) => write!(f, "{text}"),
            BigNumber::Number(number) => write!(f, "{number}"),
        }
    }
}

/// A trust relationship. `user_address` may send to `can_send_to_address` up to
/// `limit_percentage` of its holdings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub limit: Option<BigNumber>,
    pub limit_percentage: BigNumber,
    pub can_send_to_address: String,
    pub user_address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub owner: Owner,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub amount: String,
    pub token: Token,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Safe {
    pub id: String,
    pub organization: bool,
    pub outgoing: Vec<Permission>,
    pub incoming: Vec<Permission>,
    pub balances: Vec<Balance>,
}

impl Safe {
    #[cfg(test)]
    pub fn with_id(id: &str) -> Self {
        Safe {
            id: id.to_string(),
            organization: false,
            outgoing: vec![],
            incoming: vec![],
            balances: vec![],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub block_number: BlockNumber,
    pub safes: Vec<Safe>,
}
