//! Talks to the Circles subgraph. One call fetches one page of safes above a cursor.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::safes::Safe;

const SAFE_FIELDS: &str = "id organization \
    outgoing { limit limitPercentage canSendToAddress userAddress } \
    incoming { limit limitPercentage canSendToAddress userAddress } \
    balances { amount token { id owner { id } } }";

pub fn make_safes_page_query(cursor: &str, page_size: u32) -> String {
    format!(
        "{{ safes(orderBy: id, first: {page_size}, where: {{ id_gt: \"{cursor}\" }}) {{ {SAFE_FIELDS} }} }}"
    )
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
}

/// What a page request came back with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SafesPage {
    /// The service answered with an `errors` list.
    QueryErrors(Vec<GraphQlError>),
    /// A well formed `data.safes` list, possibly empty.
    Safes(Vec<Safe>),
    /// Valid JSON without the shape we asked for.
    Malformed(String),
}

impl SafesPage {
    pub fn from_response(body: Value) -> Self {
        if let Some(errors) = body.get("errors") {
            let errors = serde_json::from_value::<Vec<GraphQlError>>(errors.clone())
                .unwrap_or_else(|_| {
                    vec![GraphQlError {
                        message: errors.to_string(),
                    }]
                });
            return SafesPage::QueryErrors(errors);
        }

        let Some(safes) = body.get("data").and_then(|data| data.get("safes")) else {
            return SafesPage::Malformed(format!("missing data.safes in response: {body}"));
        };

        match serde_json::from_value::<Vec<Safe>>(safes.clone()) {
            Ok(safes) => SafesPage::Safes(safes),
            Err(err) => SafesPage::Malformed(format!("unexpected safe shape: {err}")),
        }
    }
}

#[automock]
#[async_trait]
pub trait Subgraph {
    /// Up to `page_size` safes with an id strictly greater than `cursor`, ascending by id.
    async fn fetch_safes_page(&self, cursor: &str, page_size: u32) -> Result<SafesPage>;
}

pub struct SubgraphHttp {
    url: String,
    client: reqwest::Client,
}

impl SubgraphHttp {
    pub fn new_with_url(url: &str) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Subgraph for SubgraphHttp {
    async fn fetch_safes_page(&self, cursor: &str, page_size: u32) -> Result<SafesPage> {
        let query = make_safes_page_query(cursor, page_size);

        debug!(cursor, page_size, "requesting safes page");

        // The graph node reports query errors with non-2xx statuses too. Without an errors
        // list a non-2xx status is a gateway failure, not the end of the data.
        let res = self
            .client
            .post(&self.url)
            .json(&GraphQlRequest { query: &query })
            .send()
            .await?;
        let status = res.status();
        let body = res
            .json::<Value>()
            .await
            .with_context(|| format!("subgraph returned a non-json body, status = {status}"))?;

        if !status.is_success() && body.get("errors").is_none() {
            bail!("subgraph request failed. status = {status} body = {body}");
        }

        Ok(SafesPage::from_response(body))
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    #[test]
    fn make_safes_page_query_test() {
        let query = make_safes_page_query("0x0a", 1000);
        assert_eq!(
            query,
            "{ safes(orderBy: id, first: 1000, where: { id_gt: \"0x0a\" }) { id organization \
            outgoing { limit limitPercentage canSendToAddress userAddress } \
            incoming { limit limitPercentage canSendToAddress userAddress } \
            balances { amount token { id owner { id } } } } }"
        );
    }

    #[test]
    fn classify_errors_test() {
        let page = SafesPage::from_response(json!({
            "errors": [{"message": "indexing_error", "locations": []}]
        }));
        assert_eq!(
            page,
            SafesPage::QueryErrors(vec![GraphQlError {
                message: "indexing_error".to_string()
            }])
        );
    }

    #[test]
    fn classify_errors_with_data_test() {
        let page = SafesPage::from_response(json!({
            "data": {"safes": []},
            "errors": "bad gateway"
        }));
        assert!(matches!(page, SafesPage::QueryErrors(errors) if errors.len() == 1));
    }

    #[test]
    fn classify_empty_page_test() {
        let page = SafesPage::from_response(json!({"data": {"safes": []}}));
        assert_eq!(page, SafesPage::Safes(vec![]));
    }

    #[test]
    fn classify_missing_fields_test() {
        assert!(matches!(
            SafesPage::from_response(json!({})),
            SafesPage::Malformed(_)
        ));
        assert!(matches!(
            SafesPage::from_response(json!({"data": {}})),
            SafesPage::Malformed(_)
        ));
        assert!(matches!(
            SafesPage::from_response(json!({"data": {"safes": [{"id": "0x01"}]}})),
            SafesPage::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn fetch_safes_page_test() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "query": make_safes_page_query("0", 2)
            })))
            .with_status(200)
            .with_body(
                json!({"data": {"safes": [{
                    "id": "0x01",
                    "organization": true,
                    "outgoing": [],
                    "incoming": [],
                    "balances": []
                }]}})
                .to_string(),
            )
            .create_async()
            .await;

        let subgraph = SubgraphHttp::new_with_url(&server.url());
        let page = subgraph.fetch_safes_page("0", 2).await.unwrap();

        mock.assert_async().await;
        match page {
            SafesPage::Safes(safes) => {
                assert_eq!(safes.len(), 1);
                assert_eq!(safes[0].id, "0x01");
                assert!(safes[0].organization);
            }
            other => panic!("expected safes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_safes_page_error_status_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .with_body(json!({"errors": [{"message": "store error"}]}).to_string())
            .create_async()
            .await;

        let subgraph = SubgraphHttp::new_with_url(&server.url());
        let page = subgraph.fetch_safes_page("0", 2).await.unwrap();

        assert!(matches!(page, SafesPage::QueryErrors(_)));
    }

    #[tokio::test]
    async fn fetch_safes_page_gateway_error_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body(json!({"message": "unavailable"}).to_string())
            .create_async()
            .await;

        let subgraph = SubgraphHttp::new_with_url(&server.url());

        assert!(subgraph.fetch_safes_page("0", 2).await.is_err());
    }

    #[tokio::test]
    async fn fetch_safes_page_non_json_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let subgraph = SubgraphHttp::new_with_url(&server.url());

        assert!(subgraph.fetch_safes_page("0", 2).await.is_err());
    }
}
