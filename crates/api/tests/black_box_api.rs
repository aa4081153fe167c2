use std::net::SocketAddr;

use reqwest::StatusCode;
use serde_json::{json, Value};

use stockalloc_api::app::{build_app, services};
use stockalloc_infra::{AppConfig, ServiceConfig, StoreBackend};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(app_services: services::AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = build_app(app_services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn in_memory() -> Self {
        Self::spawn(services::AppServices::in_memory(ServiceConfig::default())).await
    }

    async fn sqlite(database_url: &str) -> Self {
        let config = AppConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            store: StoreBackend::Sqlite,
            database_url: database_url.to_string(),
            service: ServiceConfig::default(),
        };
        let app_services = services::build_services(&config)
            .await
            .expect("failed to open sqlite store");
        Self::spawn(app_services).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn add_stock(&self, client: &reqwest::Client, batches: &[(&str, &str, i64, Option<&str>)]) {
        for (reference, sku, qty, eta) in batches {
            let res = client
                .post(self.url("/add_batch"))
                .json(&json!({ "ref": reference, "sku": sku, "qty": qty, "eta": eta }))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::CREATED, "add_batch {reference}");
        }
    }

    async fn allocate(&self, client: &reqwest::Client, orderid: &str, sku: &str, qty: i64) -> reqwest::Response {
        client
            .post(self.url("/allocate"))
            .json(&json!({ "orderid": orderid, "sku": sku, "qty": qty }))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn suffix() -> String {
    uuid::Uuid::now_v7().simple().to_string()[20..].to_string()
}

fn random_sku(name: &str) -> String {
    format!("sku-{name}-{}", suffix())
}

fn random_batchref(name: &str) -> String {
    format!("batch-{name}-{}", suffix())
}

fn random_orderid(name: &str) -> String {
    format!("order-{name}-{}", suffix())
}

#[tokio::test]
async fn server_is_up_and_running() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("Hello"));

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok", "store": "memory" }));
}

#[tokio::test]
async fn happy_path_returns_201_and_allocated_batch() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();
    let (sku, othersku) = (random_sku(""), random_sku("other"));
    let (early, later, other) = (random_batchref("1"), random_batchref("2"), random_batchref("3"));

    srv.add_stock(
        &client,
        &[
            (later.as_str(), sku.as_str(), 100, Some("2011-01-02")),
            (early.as_str(), sku.as_str(), 100, Some("2011-01-01")),
            (other.as_str(), othersku.as_str(), 100, None),
        ],
    )
    .await;

    let res = srv.allocate(&client, &random_orderid(""), &sku, 3).await;

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["batchref"], early.as_str());
}

#[tokio::test]
async fn allocations_are_persisted() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();
    let sku = random_sku("");
    let (batch1, batch2) = (random_batchref("1"), random_batchref("2"));
    let (order1, order2) = (random_orderid("1"), random_orderid("2"));

    srv.add_stock(
        &client,
        &[(batch1.as_str(), sku.as_str(), 10, Some("2011-01-01")), (batch2.as_str(), sku.as_str(), 10, Some("2011-01-02"))],
    )
    .await;

    let res = srv.allocate(&client, &order1, &sku, 10).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["batchref"], batch1.as_str());

    let res = srv.allocate(&client, &order2, &sku, 10).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["batchref"], batch2.as_str());
}

#[tokio::test]
async fn out_of_stock_returns_400_and_message() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();
    let (sku, small_batch, large_order) = (random_sku(""), random_batchref(""), random_orderid(""));

    srv.add_stock(&client, &[(small_batch.as_str(), sku.as_str(), 10, Some("2011-01-01"))]).await;

    let res = srv.allocate(&client, &large_order, &sku, 20).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], format!("Cannot allocate sku {sku}. Out of stock."));
    assert_eq!(body["error"], "out_of_stock");
}

#[tokio::test]
async fn unhappy_path_returns_400_and_error_message() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();
    let (unknown_sku, orderid) = (random_sku(""), random_orderid(""));

    let res = srv.allocate(&client, &orderid, &unknown_sku, 20).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], format!("Invalid sku {unknown_sku}."));
}

#[tokio::test]
async fn add_batch_then_allocate() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();
    let (batchref, orderid, sku) = (random_batchref(""), random_orderid(""), random_sku(""));

    srv.add_stock(&client, &[(batchref.as_str(), sku.as_str(), 100, None)]).await;

    let res = srv.allocate(&client, &orderid, &sku, 10).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["batchref"], batchref.as_str());

    let res = client
        .get(srv.url(&format!("/allocations/{orderid}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!([{ "sku": sku, "batchref": batchref }]));
}

#[tokio::test]
async fn duplicate_batch_and_bad_quantity_are_400() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();
    let (batchref, sku) = (random_batchref(""), random_sku(""));

    srv.add_stock(&client, &[(batchref.as_str(), sku.as_str(), 100, None)]).await;

    let res = client
        .post(srv.url("/add_batch"))
        .json(&json!({ "ref": batchref, "sku": sku, "qty": 5, "eta": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_batch_ref");

    let res = srv.allocate(&client, &random_orderid(""), &sku, 0).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_quantity");
}

#[tokio::test]
async fn unknown_order_has_no_allocations() {
    let srv = TestServer::in_memory().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url(&format!("/allocations/{}", random_orderid(""))))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn allocations_survive_a_server_restart() {
    let path = std::env::temp_dir().join(format!("stockalloc-api-{}.db", uuid::Uuid::now_v7()));
    let database_url = format!("sqlite://{}", path.display());
    let client = reqwest::Client::new();
    let sku = random_sku("");
    let (batch1, batch2) = (random_batchref("1"), random_batchref("2"));

    {
        let srv = TestServer::sqlite(&database_url).await;
        srv.add_stock(
            &client,
            &[(batch1.as_str(), sku.as_str(), 10, Some("2011-01-01")), (batch2.as_str(), sku.as_str(), 10, Some("2011-01-02"))],
        )
        .await;

        let res = srv.allocate(&client, &random_orderid("1"), &sku, 10).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let srv = TestServer::sqlite(&database_url).await;
    let health: Value = client
        .get(srv.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["store"], "sqlite");

    let res = srv.allocate(&client, &random_orderid("2"), &sku, 10).await;

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["batchref"], batch2.as_str());
}
