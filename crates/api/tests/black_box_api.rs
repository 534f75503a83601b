use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use painterp_api::config::AppConfig;
use painterp_auth::JwtClaims;
use painterp_core::UserId;
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory store), bound to an ephemeral port.
        let app = painterp_api::app::build_app(&AppConfig::development(SECRET))
            .await
            .expect("failed to build app");
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

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn send(
        &self,
        method: reqwest::Method,
        token: &str,
        path: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let res = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        (res.status(), res.json().await.unwrap())
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, token, path, body).await
    }

    async fn create_brand(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post(token, "/inventory/brands", json!({ "name": name, "image": "brand.png" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_product(&self, token: &str, body: Value) -> Value {
        let (status, body) = self.post(token, "/inventory/products", body).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(user: UserId, name: &str) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user,
        name: Some(name.to_string()),
        email: Some(format!("{}@example.com", name.to_lowercase())),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn find<'a>(list: &'a Value, id: &str) -> &'a Value {
    list.as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == id)
        .unwrap_or_else(|| panic!("{id} not in {list}"))
}

fn gloss(brand: &str) -> Value {
    json!({
        "name": "Satin Gloss",
        "brand": brand,
        "type": "Enamel",
        "price": 500,
        "productCode": "SG-01",
        "stockBySize": { "1L": 5, "4L": 10 },
        "priceBySize": { "4L": 1200 },
    })
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/inventory/brands"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Not authorized, no token");

    let (status, body) = srv.get("not-a-jwt", "/billing/invoices").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, token failed");
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let past = Utc::now() - ChronoDuration::hours(2);
    let claims = JwtClaims {
        sub: UserId::new(),
        name: None,
        email: None,
        iat: past.timestamp(),
        exp: (past + ChronoDuration::minutes(10)).timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let (status, _) = srv.get(&token, "/inventory/brands").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_routes_and_malformed_bodies_use_the_envelope() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");

    let res = srv.client.get(srv.url("/nope")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Route not found");

    let res = srv
        .client
        .post(srv.url("/inventory/brands"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    let (status, body) = srv.get(&token, "/billing/invoices?page=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn catalog_lifecycle_brands_products_stock() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");

    let brand = srv.create_brand(&token, "  Acme Paints ").await;
    let (status, body) = srv
        .post(&token, "/inventory/brands", json!({ "name": "Acme Paints" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Brand with this name already exists");

    let (_, brands) = srv.get(&token, "/inventory/brands").await;
    assert_eq!(brands["data"][0]["name"], "Acme Paints");

    let product = srv.create_product(&token, gloss(&brand)).await;
    let id = product["id"].as_str().unwrap().to_string();
    assert_eq!(product["stock"], 15);
    assert_eq!(product["brand"]["name"], "Acme Paints");
    assert_eq!(product["unit"], "L");

    let (status, body) = srv.post(&token, "/inventory/products", gloss(&brand)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Product with code SG-01 already exists for this brand");

    // Size mode.
    let (status, body) = srv
        .send(
            reqwest::Method::PATCH,
            &token,
            &format!("/inventory/products/{id}/stock"),
            json!({ "size": "4L", "stockBySize": 7 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Stock updated successfully");
    assert_eq!(body["data"]["stockBySize"]["4L"], 7);
    assert_eq!(body["data"]["stock"], 12);

    // Neither mode.
    let (status, _) = srv
        .send(
            reqwest::Method::PATCH,
            &token,
            &format!("/inventory/products/{id}/stock"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown size.
    let (status, _) = srv
        .send(
            reqwest::Method::PATCH,
            &token,
            &format!("/inventory/products/{id}/stock"),
            json!({ "size": "5L", "stockBySize": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, by_brand) = srv.get(&token, &format!("/inventory/products/{brand}")).await;
    assert_eq!(by_brand["data"].as_array().unwrap().len(), 1);

    let (_, by_type) = srv
        .get(&token, &format!("/inventory/products/{brand}/Enamel"))
        .await;
    assert_eq!(by_type["data"].as_array().unwrap().len(), 1);
    let (_, other_type) = srv
        .get(&token, &format!("/inventory/products/{brand}/Primer"))
        .await;
    assert_eq!(other_type["data"].as_array().unwrap().len(), 0);

    let (_, searched) = srv.get(&token, "/inventory/products?search=satin").await;
    assert_eq!(searched["data"].as_array().unwrap().len(), 1);

    let (_, types) = srv.get(&token, "/inventory/types").await;
    assert!(types["data"].as_array().unwrap().iter().any(|t| t["name"] == "Enamel"));

    let (status, _) = srv
        .send(
            reqwest::Method::DELETE,
            &token,
            &format!("/inventory/products/{id}"),
            Value::Null,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = srv.get(&token, "/inventory/products").await;
    assert_eq!(after["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn product_types_upsert_and_brand_scope() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");
    let brand = srv.create_brand(&token, "Acme").await;
    srv.create_product(&token, gloss(&brand)).await;

    let (status, _) = srv
        .post(&token, "/inventory/types", json!({ "name": "Primer", "icon": "p.svg" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = srv
        .post(&token, "/inventory/types", json!({ "name": " Primer ", "icon": "p2.svg" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["icon"], "p2.svg");

    let (_, all) = srv.get(&token, "/inventory/types").await;
    let names: Vec<&str> = all["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Enamel", "Primer"]);

    let (status, scoped) = srv.get(&token, &format!("/inventory/types/{brand}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(scoped["data"].as_array().unwrap().iter().any(|t| t["name"] == "Enamel"));

    let (status, _) = srv
        .get(&token, &format!("/inventory/types/{}", uuid::Uuid::now_v7()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn updating_an_image_is_shared_with_the_code_family() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");
    let brand = srv.create_brand(&token, "Acme").await;

    let red = srv
        .create_product(
            &token,
            json!({ "name": "Weathercoat Red", "brand": brand, "type": "Exterior", "productCode": "WC-RED" }),
        )
        .await;
    let blue = srv
        .create_product(
            &token,
            json!({ "name": "Weathercoat Blue", "brand": brand, "type": "Exterior", "productCode": "WC-BLUE" }),
        )
        .await;
    let red_id = red["id"].as_str().unwrap();

    let (status, body) = srv
        .send(
            reqwest::Method::PUT,
            &token,
            &format!("/inventory/products/{red_id}"),
            json!({ "productImage": "weathercoat.png", "price": 950 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["price"].as_f64(), Some(950.0));

    let (_, listed) = srv.get(&token, &format!("/inventory/products/{brand}")).await;
    let blue = find(&listed["data"], blue["id"].as_str().unwrap());
    assert_eq!(blue["productImage"], "weathercoat.png");
}

#[tokio::test]
async fn bulk_upload_reports_each_row() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");
    let brand = srv.create_brand(&token, "Acme").await;

    let (status, body) = srv
        .post(
            &token,
            "/inventory/products/bulk",
            json!({
                "brandId": brand,
                "productType": "Emulsion",
                "products": [
                    { "name": "Silk", "productCode": "SLK-01", "colour": "White", "stockBySize": { "1L": 2, "20L": 1 } },
                    { "name": "Silk", "productCode": "SLK-01", "colour": "Ivory" },
                    { "productCode": "SLK-02" },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let success = body["data"]["success"].as_array().unwrap();
    let failed = body["data"]["failed"].as_array().unwrap();
    assert_eq!(success.len(), 1);
    assert_eq!(failed.len(), 2);
    assert_eq!(success[0]["name"], "Silk - White");
    assert_eq!(success[0]["stock"], 3);
    assert_eq!(failed[1]["reason"], "Name and product code are required");

    let (status, _) = srv
        .post(
            &token,
            "/inventory/products/bulk",
            json!({ "brandId": brand, "productType": "", "products": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_upload_keeps_going_past_a_malformed_row() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");
    let brand = srv.create_brand(&token, "Acme").await;

    let (status, body) = srv
        .post(
            &token,
            "/inventory/products/bulk",
            json!({
                "brandId": brand,
                "productType": "Emulsion",
                "products": [
                    { "name": "Tin", "productCode": "TIN-2", "stockBySize": { "2L": 2 } },
                    { "name": "Silk", "productCode": "SLK-01", "stockBySize": { "4L": 1 } },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let success = body["data"]["success"].as_array().unwrap();
    let failed = body["data"]["failed"].as_array().unwrap();
    assert_eq!(success.len(), 1);
    assert_eq!(success[0]["productCode"], "SLK-01");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["productCode"], "TIN-2");
    assert_eq!(failed[0]["stockBySize"]["2L"], 2);
    assert!(failed[0]["reason"].as_str().unwrap().starts_with("Invalid row"));
}

#[tokio::test]
async fn invoice_lifecycle_prices_decrements_and_scopes() {
    let srv = TestServer::spawn().await;
    let user = UserId::new();
    let token = mint_jwt(user, "Asha");
    let brand = srv.create_brand(&token, "Acme").await;
    let product = srv.create_product(&token, gloss(&brand)).await;
    let id = product["id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(
            &token,
            "/billing/invoices",
            json!({ "items": [{ "productId": id, "quantity": 2, "size": "4L" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let invoice = &body["data"];
    assert_eq!(body["message"], "Invoice created successfully");
    assert_eq!(invoice["subtotal"].as_f64(), Some(2400.0));
    assert_eq!(invoice["tax"].as_f64(), Some(432.0));
    assert_eq!(invoice["total"].as_f64(), Some(2832.0));
    assert_eq!(invoice["status"], "completed");
    assert!(invoice["invoiceNo"].as_str().unwrap().starts_with("INV-"));
    assert!(invoice["invoiceNo"].as_str().unwrap().ends_with("-1"));
    assert_eq!(invoice["user"]["name"], "Asha");
    assert_eq!(invoice["items"][0]["product"]["name"], "Satin Gloss");
    let invoice_id = invoice["id"].as_str().unwrap().to_string();

    let (_, products) = srv.get(&token, "/inventory/products").await;
    let after = find(&products["data"], &id);
    assert_eq!(after["stockBySize"]["4L"], 8);
    assert_eq!(after["stock"], 13);

    let (status, fetched) = srv
        .get(&token, &format!("/billing/invoices/{invoice_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["id"], invoice_id.as_str());

    let stranger = mint_jwt(UserId::new(), "Ravi");
    let (status, body) = srv
        .get(&stranger, &format!("/billing/invoices/{invoice_id}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Invoice not found");
}

#[tokio::test]
async fn failed_invoice_leaves_every_product_untouched() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");
    let brand = srv.create_brand(&token, "Acme").await;
    let first = srv.create_product(&token, gloss(&brand)).await;
    let second = srv
        .create_product(
            &token,
            json!({ "name": "Thinner", "brand": brand, "type": "Solvent", "stock": 3, "price": 80 }),
        )
        .await;
    let first_id = first["id"].as_str().unwrap().to_string();
    let second_id = second["id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(
            &token,
            "/billing/invoices",
            json!({ "items": [
                { "productId": first_id, "quantity": 1, "size": "1L" },
                { "productId": second_id, "quantity": 99 },
            ] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Insufficient stock for Thinner. Available: 3");

    let (_, products) = srv.get(&token, "/inventory/products").await;
    assert_eq!(find(&products["data"], &first_id)["stockBySize"]["1L"], 5);
    assert_eq!(find(&products["data"], &second_id)["stock"], 3);

    let (_, invoices) = srv.get(&token, "/billing/invoices").await;
    assert_eq!(invoices["pagination"]["total"], 0);

    let (status, body) = srv
        .post(&token, "/billing/invoices", json!({ "items": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invoice must have at least one item");
}

#[tokio::test]
async fn invoices_are_paginated_newest_first() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(UserId::new(), "Asha");
    let brand = srv.create_brand(&token, "Acme").await;
    let product = srv
        .create_product(
            &token,
            json!({ "name": "Thinner", "brand": brand, "type": "Solvent", "stock": 10, "price": 80 }),
        )
        .await;
    let id = product["id"].as_str().unwrap().to_string();

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let (status, body) = srv
            .post(
                &token,
                "/billing/invoices",
                json!({ "items": [{ "productId": id, "quantity": 1 }], "taxRate": 0 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["total"].as_f64(), Some(80.0));
        numbers.push(body["data"]["invoiceNo"].as_str().unwrap().to_string());
    }

    let (status, page) = srv.get(&token, "/billing/invoices?page=1&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["invoiceNo"], numbers[2].as_str());
    assert_eq!(
        page["pagination"],
        json!({ "page": 1, "limit": 2, "total": 3, "pages": 2 })
    );

    let (_, second) = srv.get(&token, "/billing/invoices?page=2&limit=2").await;
    assert_eq!(second["data"].as_array().unwrap().len(), 1);

    let (status, _) = srv.get(&token, "/billing/invoices?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let other = mint_jwt(UserId::new(), "Ravi");
    let (_, theirs) = srv.get(&other, "/billing/invoices").await;
    assert_eq!(theirs["pagination"]["total"], 0);
}
