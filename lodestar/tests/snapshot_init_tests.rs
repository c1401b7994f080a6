//! Starting an engine from configuration and a snapshot file on disk

mod common;

use std::io::Write;

use common::WS;
use lodestar::config::ConfigLoader;
use lodestar::prelude::*;
use tempfile::NamedTempFile;
use tokio_test::{assert_err, assert_ok};

fn write_snapshot(snapshot: &lodestar::storage::WorkspaceSnapshot) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(serde_json::to_string_pretty(snapshot).unwrap().as_bytes())
        .unwrap();
    file
}

fn corpus() -> lodestar::storage::WorkspaceSnapshot {
    let mut snapshot = common::snapshot();
    snapshot.chunks.push(common::chunk(
        "c-482",
        482,
        "Move auth to the gateway",
        "Token validation now happens in the gateway.",
    ));
    snapshot.chunks.push(common::chunk(
        "c-517",
        517,
        "Billing retry policy",
        "Failed charges are retried three times.",
    ));
    snapshot
}

#[tokio::test]
async fn test_init_loads_snapshot_file() {
    let file = write_snapshot(&corpus());
    let config = ConfigBuilder::testing()
        .with_snapshot_file(file.path())
        .build()
        .unwrap();

    let engine = assert_ok!(init(config).await);
    let response = assert_ok!(engine.search(SearchRequest::new(WS, "#517")).await);
    assert_eq!(response.results[0].id, "c-517");
    assert_eq!(response.results[0].score, 1.0);

    let contents = engine
        .contents(ContentsRequest {
            workspace_id: WS.to_string(),
            refs: vec![
                ContentRef::external(SourceType::Github, "#482"),
                ContentRef::id("nope"),
            ],
            include_related: false,
        })
        .await
        .unwrap();
    assert_eq!(contents.items.len(), 1);
    assert_eq!(contents.items[0].id, "c-482");
    assert_eq!(contents.missing, vec!["nope".to_string()]);
}

#[tokio::test]
async fn test_init_rejects_snapshot_with_foreign_records() {
    let mut snapshot = corpus();
    snapshot.chunks[1].workspace_id = "other".to_string();
    let file = write_snapshot(&snapshot);
    let config = ConfigBuilder::testing()
        .with_snapshot_file(file.path())
        .build()
        .unwrap();

    assert_err!(init(config).await);
}

#[tokio::test]
async fn test_engine_from_toml_config_file() {
    let snapshot = write_snapshot(&corpus());
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[retrieval]
default_limit = 1
knowledge_timeout = "2s"
neural_timeout = "2s"
temporal_timeout = "2s"
graph_timeout = "2s"
embedding_timeout = "2s"

[storage]
snapshot_file = "{}"
"#,
        snapshot.path().display()
    )
    .unwrap();

    let config = ConfigLoader::new()
        .load_file(file.path())
        .unwrap()
        .extract()
        .unwrap();
    assert_eq!(config.retrieval.default_limit, 1);

    let engine = init(config).await.unwrap();
    let response = engine
        .search(SearchRequest::new(WS, "gateway token validation"))
        .await
        .unwrap();
    assert!(response.results.len() <= 1);
}
