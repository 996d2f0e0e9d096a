pub mod block_explorer;
pub mod block_number;
pub mod env;
pub mod fetcher;
pub mod log;
pub mod safes;
pub mod snapshot;
pub mod subgraph;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    block_explorer::BlockExplorer,
    fetcher::{fetch_all_safes, FetchConfig},
    safes::Snapshot,
    subgraph::Subgraph,
};

/// Stamps the current block number, then fetches every safe. The block number is only a
/// marker, safes indexed after it was read may be included.
pub async fn download_snapshot(
    block_explorer: &impl BlockExplorer,
    subgraph: &impl Subgraph,
    config: &FetchConfig,
) -> Result<Snapshot> {
    let block_number = block_explorer
        .get_block_number()
        .await
        .context("failed to get current block number")?;
    info!(%block_number, "got current block number");

    let safes = fetch_all_safes(subgraph, config).await?;

    Ok(Snapshot {
        block_number,
        safes,
    })
}

/// Downloads a snapshot and writes it to `output`. Nothing is written unless the download
/// finished cleanly.
pub async fn download_safes(
    block_explorer: &impl BlockExplorer,
    subgraph: &impl Subgraph,
    config: &FetchConfig,
    output: &Path,
) -> Result<Snapshot> {
    let snapshot = download_snapshot(block_explorer, subgraph, config).await?;
    snapshot::write_snapshot(output, &snapshot)?;
    Ok(snapshot)
}
