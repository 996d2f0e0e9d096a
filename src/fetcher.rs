//! Paginated Fetcher
//! =================
//! Walks the subgraph's safes ordered by id. Each request asks for the next page above the
//! last id seen. An empty page means every safe has been seen. Failed requests are retried in
//! place until the attempt budget runs out; every request, failed or not, spends one attempt.

use backoff::{backoff::Backoff, ExponentialBackoff};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    safes::Safe,
    subgraph::{SafesPage, Subgraph},
};

/// Ids are hex addresses, every one of them sorts above this.
pub const START_CURSOR: &str = "0";
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 500;

/// What to do with a response that has neither `errors` nor a well formed `data.safes`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Treat it like an empty page and finish. Matches how the subgraph job has always
    /// behaved, but a schema change would end the download early without complaint.
    #[default]
    EndOfData,
    /// Count it as a failed attempt and ask again.
    Retry,
}

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub page_size: u32,
    pub max_attempts: u32,
    pub on_malformed: MalformedPolicy,
    /// Wait exponentially longer between failed attempts instead of retrying immediately.
    pub backoff: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            on_malformed: MalformedPolicy::default(),
            backoff: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("too many failures or requests, gave up after {attempts} attempts with {fetched} safes fetched")]
    AttemptsExhausted { attempts: u32, fetched: usize },
    #[error("subgraph returned safe {id} after {previous} (cursor {cursor}), ids are not strictly increasing")]
    OutOfOrder {
        cursor: String,
        previous: String,
        id: String,
    },
    #[error("page size must be greater than zero")]
    ZeroPageSize,
}

/// Loop state. Owns everything fetched so far.
#[derive(Debug)]
pub struct Pagination {
    cursor: String,
    safes: Vec<Safe>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            cursor: START_CURSOR.to_string(),
            safes: Vec::new(),
        }
    }
}

impl Pagination {
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn safes(&self) -> &[Safe] {
        &self.safes
    }

    /// Appends a non-empty page and moves the cursor to its last id.
    pub fn advance(&mut self, page: Vec<Safe>) -> Result<(), FetchError> {
        let mut previous = self.cursor.as_str();
        for safe in &page {
            if safe.id.as_str() <= previous {
                return Err(FetchError::OutOfOrder {
                    cursor: self.cursor.clone(),
                    previous: previous.to_string(),
                    id: safe.id.clone(),
                });
            }
            previous = &safe.id;
        }

        if let Some(last) = page.last() {
            self.cursor = last.id.clone();
        }
        self.safes.extend(page);
        Ok(())
    }

    pub fn into_safes(self) -> Vec<Safe> {
        self.safes
    }
}

fn make_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

async fn wait_before_retry(retry_backoff: &mut Option<ExponentialBackoff>) {
    if let Some(delay) = retry_backoff.as_mut().and_then(|b| b.next_backoff()) {
        debug!(?delay, "waiting before retrying");
        tokio::time::sleep(delay).await;
    }
}

/// Fetches every safe the subgraph knows about, in ascending id order.
#[instrument(skip_all, fields(page_size = config.page_size, max_attempts = config.max_attempts))]
pub async fn fetch_all_safes(
    subgraph: &impl Subgraph,
    config: &FetchConfig,
) -> Result<Vec<Safe>, FetchError> {
    // A zero sized page comes back empty and would pass for a finished download.
    if config.page_size == 0 {
        return Err(FetchError::ZeroPageSize);
    }

    let mut pagination = Pagination::default();
    let mut retry_backoff = config.backoff.then(make_backoff);

    for attempt in 1..=config.max_attempts {
        info!(cursor = pagination.cursor(), attempt, "fetching safes page");

        let page = match subgraph
            .fetch_safes_page(pagination.cursor(), config.page_size)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(attempt, "failed to fetch safes page: {err:#}");
                wait_before_retry(&mut retry_backoff).await;
                continue;
            }
        };

        match page {
            SafesPage::QueryErrors(errors) => {
                warn!(attempt, ?errors, "subgraph returned errors, retrying");
                wait_before_retry(&mut retry_backoff).await;
            }
            SafesPage::Malformed(reason) => match config.on_malformed {
                MalformedPolicy::EndOfData => {
                    warn!(%reason, "malformed response, treating it as the end of the data");
                    return Ok(pagination.into_safes());
                }
                MalformedPolicy::Retry => {
                    warn!(attempt, %reason, "malformed response, retrying");
                    wait_before_retry(&mut retry_backoff).await;
                }
            },
            SafesPage::Safes(safes) if safes.is_empty() => {
                info!(
                    total = pagination.safes().len(),
                    "got an empty page, all safes fetched"
                );
                return Ok(pagination.into_safes());
            }
            SafesPage::Safes(safes) => {
                let page_len = safes.len();
                pagination.advance(safes)?;
                info!(
                    page_len,
                    total = pagination.safes().len(),
                    "got safes page"
                );
                if let Some(retry_backoff) = retry_backoff.as_mut() {
                    retry_backoff.reset();
                }
            }
        }
    }

    Err(FetchError::AttemptsExhausted {
        attempts: config.max_attempts,
        fetched: pagination.safes().len(),
    })
}
