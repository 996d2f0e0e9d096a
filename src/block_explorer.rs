//! Looks up the current chain height from a Blockscout style explorer API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use format_url::FormatUrl;
use mockall::automock;
use serde::Deserialize;
use tracing::debug;

use crate::block_number::BlockNumber;

#[derive(Debug, Deserialize)]
struct BlockNumberEnvelope {
    result: String,
}

#[automock]
#[async_trait]
pub trait BlockExplorer {
    async fn get_block_number(&self) -> Result<BlockNumber>;
}

pub struct BlockscoutHttp {
    api_url: String,
    client: reqwest::Client,
}

impl BlockscoutHttp {
    pub fn new_with_url(api_url: &str) -> Self {
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BlockExplorer for BlockscoutHttp {
    async fn get_block_number(&self) -> Result<BlockNumber> {
        let url = FormatUrl::new(&self.api_url)
            .with_query_params(vec![("module", "block"), ("action", "eth_block_number")])
            .format_url();

        debug!("requesting block number from {}", url);

        let envelope = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<BlockNumberEnvelope>()
            .await
            .context("block explorer response did not contain a result")?;

        let block_number = envelope.result.parse::<BlockNumber>()?;
        Ok(block_number)
    }
}
