use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use stockledger_infra::LedgerConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = stockledger_api::app::build_app(LedgerConfig::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        read(res).await
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.put(self.url(path)).json(&body).send().await.unwrap();
        read(res).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        read(res).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.delete(self.url(path)).send().await.unwrap();
        read(res).await
    }

    async fn create_product(&self, code: &str, opening_stock: i64) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({
                    "code": code,
                    "name": format!("Product {code}"),
                    "unit": "pcs",
                    "min_stock": 5,
                    "opening_stock": opening_stock,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read(res: reqwest::Response) -> (StatusCode, Value) {
    let status = res.status();
    let text = res.text().await.unwrap();
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let (status, _) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn movement_lifecycle_record_edit_delete() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("SKU-A", 10).await;

    let (status, body) = srv
        .post(
            "/movements",
            json!({ "product_id": id, "kind": "in", "quantity": 5, "note": "restock" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["new_balance"], 15);

    let (status, body) = srv
        .post(
            "/movements",
            json!({ "product_id": id, "kind": "OUT", "quantity": 3, "responsible": "Sari" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["new_balance"], 12);
    let out_id = body["transaction_id"].as_u64().unwrap();

    let (status, body) = srv
        .put(&format!("/movements/{out_id}"), json!({ "quantity": 6 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], 9);

    let (status, body) = srv.delete(&format!("/movements/{out_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], 15);

    let (status, body) = srv.get(&format!("/products/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_stock"], 15);
    assert_eq!(body["status"], "available");
    assert_eq!(body["below_minimum"], false);

    let (status, body) = srv.get(&format!("/products/{id}/balance-check")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);
}

#[tokio::test]
async fn domain_errors_have_stable_codes() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("SKU-B", 2).await;

    let (status, body) = srv
        .post("/movements", json!({ "product_id": id, "kind": "out", "quantity": 3 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = srv
        .post("/movements", json!({ "product_id": id, "kind": "in", "quantity": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");

    let (status, body) = srv
        .post("/movements", json!({ "product_id": id, "kind": "in", "quantity": i64::MAX }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_quantity");

    let (status, body) = srv
        .post("/movements", json!({ "product_id": id, "kind": "adjust", "quantity": 9 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_kind");

    let (status, body) = srv.delete("/movements/987654").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = srv.get("/products/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = srv
        .post(
            "/products",
            json!({ "code": "SKU-B", "name": "Again", "unit": "pcs" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn opname_apply_now_and_stock_card() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("SKU-C", 0).await;
    let now = Utc::now();

    srv.post(
        "/movements",
        json!({
            "product_id": id,
            "kind": "in",
            "quantity": 10,
            "occurred_at": (now - ChronoDuration::days(3)).to_rfc3339(),
        }),
    )
    .await;
    srv.post(
        "/movements",
        json!({
            "product_id": id,
            "kind": "in",
            "quantity": 5,
            "occurred_at": (now - ChronoDuration::minutes(2)).to_rfc3339(),
        }),
    )
    .await;
    srv.post(
        "/movements",
        json!({
            "product_id": id,
            "kind": "out",
            "quantity": 3,
            "occurred_at": (now - ChronoDuration::minutes(1)).to_rfc3339(),
        }),
    )
    .await;

    let (status, body) = srv
        .post(
            "/opnames",
            json!({
                "product_id": id,
                "count_date": now.date_naive(),
                "physical_stock": 20,
                "petugas": "Rina",
                "apply_now": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["difference"], 8);
    assert_eq!(body["status"], "adjusted");
    assert_eq!(body["new_balance"], 20);

    let from = (now - ChronoDuration::days(1)).date_naive();
    let to = now.date_naive();
    let (status, card) = srv
        .get(&format!("/products/{id}/stock-card?from={from}&to={to}"))
        .await;
    assert_eq!(status, StatusCode::OK, "{card}");
    assert_eq!(card["opening_balance"], 10);
    let rows: Vec<(i64, i64, i64)> = card["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["qty_in"].as_i64().unwrap(),
                r["qty_out"].as_i64().unwrap(),
                r["balance"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(rows, vec![(5, 0, 15), (0, 3, 12), (8, 0, 20)]);
    assert_eq!(card["rows"][2]["kind"], "ADJUST");
    assert_eq!(card["closing_balance"], 20);
}

#[tokio::test]
async fn opname_commit_is_idempotent_and_guards_deletion() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("SKU-D", 12).await;
    let today = Utc::now().date_naive();

    let (status, body) = srv
        .post(
            "/opnames",
            json!({
                "product_id": id,
                "count_date": today,
                "physical_stock": 9,
                "petugas": "Andi",
                "note": "rak A",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "not_adjusted");
    assert_eq!(body["difference"], -3);
    let opname_id = body["opname_id"].as_u64().unwrap();

    let (status, pending) = srv
        .get(&format!("/opnames?product_id={id}&status=not_adjusted"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, body) = srv.post(&format!("/opnames/{opname_id}/commit"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], 9);

    let (status, body) = srv.post(&format!("/opnames/{opname_id}/commit"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "already_adjusted");

    let (status, body) = srv.delete(&format!("/opnames/{opname_id}")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "cannot_delete_adjusted");

    let (_, product) = srv.get(&format!("/products/{id}")).await;
    assert_eq!(product["current_stock"], 9);

    let (status, opname) = srv.get(&format!("/opnames/{opname_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opname["status"], "adjusted");
    assert!(opname["adjustment_tx"].is_u64());
}

#[tokio::test]
async fn unadjusted_opname_can_be_deleted() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("SKU-E", 4).await;

    let (_, body) = srv
        .post(
            "/opnames",
            json!({
                "product_id": id,
                "count_date": Utc::now().date_naive(),
                "physical_stock": 4,
                "petugas": "Dewi",
            }),
        )
        .await;
    let opname_id = body["opname_id"].as_u64().unwrap();

    let (status, _) = srv.delete(&format!("/opnames/{opname_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = srv.get(&format!("/opnames/{opname_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn products_are_listed_by_code() {
    let srv = TestServer::spawn().await;
    srv.create_product("SKU-Z", 0).await;
    srv.create_product("SKU-M", 7).await;

    let (status, body) = srv.get("/products").await;
    assert_eq!(status, StatusCode::OK);
    let products = body.as_array().unwrap();
    let codes: Vec<&str> = products.iter().map(|p| p["code"].as_str().unwrap()).collect();
    assert_eq!(codes, vec!["SKU-M", "SKU-Z"]);
    assert_eq!(products[1]["status"], "out_of_stock");
    assert_eq!(products[1]["below_minimum"], true);

    let (status, body) = srv.get("/products?code=SKU-M").await;
    assert_eq!(status, StatusCode::OK);
    let found = body.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["current_stock"], 7);

    let (status, body) = srv.get("/products?code=SKU-UNKNOWN").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}
