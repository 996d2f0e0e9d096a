use circles_safes::{
    block_explorer::BlockscoutHttp,
    download_safes,
    fetcher::FetchConfig,
    snapshot::{check_ordering, read_snapshot},
    subgraph::SubgraphHttp,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};

fn safe_json(id: &str) -> Value {
    json!({
        "id": id,
        "organization": false,
        "outgoing": [{
            "limit": "100",
            "limitPercentage": "50",
            "canSendToAddress": id,
            "userAddress": "0x00000000000000000000000000000000000000ff"
        }],
        "incoming": [],
        "balances": [{
            "amount": "1000000000000000000",
            "token": { "id": "0x00000000000000000000000000000000000000aa", "owner": { "id": id } }
        }]
    })
}

async fn mock_page(server: &mut ServerGuard, cursor: &str, ids: &[&str]) {
    let safes: Vec<Value> = ids.iter().map(|id| safe_json(id)).collect();
    server
        .mock("POST", "/")
        .match_body(Matcher::Regex(format!(r#"id_gt: \\"{cursor}\\""#)))
        .with_status(200)
        .with_body(json!({ "data": { "safes": safes } }).to_string())
        .create_async()
        .await;
}

async fn mock_block_explorer(server: &mut ServerGuard) {
    server
        .mock("GET", "/")
        .match_query(Matcher::UrlEncoded("action".into(), "eth_block_number".into()))
        .with_status(200)
        .with_body(json!({"jsonrpc": "2.0", "result": "0x1f1f", "id": 1}).to_string())
        .create_async()
        .await;
}

#[tokio::test]
async fn download_safes_over_http_test() {
    let mut explorer_server = Server::new_async().await;
    mock_block_explorer(&mut explorer_server).await;

    let mut subgraph_server = Server::new_async().await;
    mock_page(&mut subgraph_server, "0", &["0x01", "0x02"]).await;
    mock_page(&mut subgraph_server, "0x02", &["0x03", "0x04"]).await;
    mock_page(&mut subgraph_server, "0x04", &["0x05"]).await;
    mock_page(&mut subgraph_server, "0x05", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("safes.json");
    let config = FetchConfig {
        page_size: 2,
        ..FetchConfig::default()
    };

    let snapshot = download_safes(
        &BlockscoutHttp::new_with_url(&explorer_server.url()),
        &SubgraphHttp::new_with_url(&subgraph_server.url()),
        &config,
        &output,
    )
    .await
    .unwrap();

    let written = read_snapshot(&output).unwrap();
    assert_eq!(written, snapshot);
    assert_eq!(written.block_number.as_hex(), "0x1f1f");
    assert_eq!(written.safes.len(), 5);
    check_ordering(&written.safes).unwrap();

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(raw["blockNumber"], "0x1f1f");
    assert_eq!(raw["safes"][0], safe_json("0x01"));
}

#[tokio::test]
async fn download_safes_gives_up_after_budget_test() {
    let mut explorer_server = Server::new_async().await;
    mock_block_explorer(&mut explorer_server).await;

    let mut subgraph_server = Server::new_async().await;
    let errors = subgraph_server
        .mock("POST", "/")
        .with_status(200)
        .with_body(json!({"errors": [{"message": "indexing_error"}]}).to_string())
        .expect(3)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("safes.json");
    let config = FetchConfig {
        max_attempts: 3,
        ..FetchConfig::default()
    };

    let result = download_safes(
        &BlockscoutHttp::new_with_url(&explorer_server.url()),
        &SubgraphHttp::new_with_url(&subgraph_server.url()),
        &config,
        &output,
    )
    .await;

    assert!(result.is_err());
    errors.assert_async().await;
    assert!(!output.exists());
}
