use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use circles_safes::{
    block_explorer::BlockscoutHttp,
    download_safes,
    env::ENV_CONFIG,
    fetcher::{FetchConfig, MalformedPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE},
    log,
    subgraph::SubgraphHttp,
};

/// Downloads every Circles safe from the subgraph into a JSON snapshot.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Where to write the snapshot, replaced only when the download succeeds.
    #[arg(long, default_value = "safes.json")]
    output: PathBuf,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
    /// Total requests allowed, failed and successful ones alike.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
    /// Defaults to SUBGRAPH_URL from env.
    #[arg(long)]
    subgraph_url: Option<String>,
    /// Defaults to BLOCK_EXPLORER_URL from env.
    #[arg(long)]
    block_explorer_url: Option<String>,
    /// Retry responses without data.safes instead of treating them as the end of the data.
    #[arg(long)]
    strict: bool,
    /// Back off exponentially between failed attempts.
    #[arg(long)]
    backoff: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    log::init();

    let args = Args::parse();

    let subgraph_url = args
        .subgraph_url
        .unwrap_or_else(|| ENV_CONFIG.subgraph_url.clone());
    let block_explorer_url = args
        .block_explorer_url
        .unwrap_or_else(|| ENV_CONFIG.block_explorer_url.clone());

    let config = FetchConfig {
        page_size: args.page_size,
        max_attempts: args.max_attempts,
        on_malformed: if args.strict {
            MalformedPolicy::Retry
        } else {
            MalformedPolicy::EndOfData
        },
        backoff: args.backoff,
    };

    let block_explorer = BlockscoutHttp::new_with_url(&block_explorer_url);
    let subgraph = SubgraphHttp::new_with_url(&subgraph_url);

    download_safes(&block_explorer, &subgraph, &config, &args.output)
        .await
        .inspect_err(|err| error!("failed to download safes: {err:#}"))?;

    Ok(())
}
