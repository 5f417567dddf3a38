use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use billet_server::config::{BootstrapAdmin, Config};
use billet_server::routes::create_routes;
use billet_server::state::AppState;
use billet_server::store::{ensure_bootstrap_admin, MemoryStore, Store};

const ADMIN_EMAIL: &str = "owner@billet.test";
const ADMIN_PASSWORD: &str = "owner-password";
const RIVAL_EMAIL: &str = "rival@billet.test";
const RIVAL_PASSWORD: &str = "rival-password";
const BASE_URL: &str = "http://localhost:3001";

async fn test_app() -> Router {
    let store = Store::Memory(MemoryStore::new());
    for (name, email, password) in [
        ("Owner", ADMIN_EMAIL, ADMIN_PASSWORD),
        ("Rival", RIVAL_EMAIL, RIVAL_PASSWORD),
    ] {
        let admin = BootstrapAdmin {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        ensure_bootstrap_admin(&store, &admin).await.unwrap();
    }
    create_routes(AppState::new(store, Config::for_tests()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

async fn create_event(app: &Router, token: &str, capacity: i32) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/events",
        Some(token),
        Some(json!({
            "name": "Harbour Night",
            "description": "Open air concert",
            "date": "2026-12-31T20:00:00Z",
            "location": "Pier 4",
            "capacity": capacity,
            "ticket_price": "25.00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn create_seller(app: &Router, token: &str, event_id: &str, email: &str, quota: i32) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/sellers",
        Some(token),
        Some(json!({
            "event_id": event_id,
            "name": "Box Office",
            "email": email,
            "password": "seller-password",
            "quota": quota
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn generate(app: &Router, token: &str, quantity: i32) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/tickets/generate",
        Some(token),
        Some(json!({
            "buyer_name": "Ada Buyer",
            "buyer_email": "ada@example.com",
            "buyer_phone": "+1 555 010 2030",
            "quantity": quantity
        })),
    )
    .await
}

/// Admin token, event id and seller token for an event with one seller.
async fn seeded(app: &Router, capacity: i32, quota: i32) -> (String, String, String) {
    let admin = login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let event_id = create_event(app, &admin, capacity).await;
    create_seller(app, &admin, &event_id, "seller@billet.test", quota).await;
    let seller = login(app, "seller@billet.test", "seller-password").await;
    (admin, event_id, seller)
}

fn error_code(body: &Value) -> &str {
    assert_eq!(body["success"], json!(false));
    body["error"]["code"].as_str().unwrap()
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["store"], "memory");
}

#[tokio::test]
async fn test_login_refresh_and_me() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "AUTH_ERROR");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "Owner@Billet.test", "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["user"].get("password_hash").is_none());
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    // a refresh token is not an access token
    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["access_token"].is_string());

    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_rejected() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/admin/events", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "AUTH_ERROR");

    let (status, _) = send(&app, Method::GET, "/api/admin/events", Some("v1.bogus.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_seller_cannot_use_admin_routes() {
    let app = test_app().await;
    let (admin, _, seller) = seeded(&app, 100, 5).await;

    let (status, body) = send(&app, Method::GET, "/api/admin/dashboard", Some(&seller), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");

    let (status, _) = generate(&app, &admin, 1).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_json_gets_error_envelope() {
    let app = test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let app = test_app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("x-frame-options"));
}

#[tokio::test]
async fn test_generation_respects_quota() {
    let app = test_app().await;
    let (_, _, seller) = seeded(&app, 100, 3).await;

    let (status, body) = generate(&app, &seller, 2).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let tickets = body["data"].as_array().unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0]["status"], "valid");
    assert_eq!(tickets[0]["cryptic_code"].as_str().unwrap().len(), 16);
    assert!(tickets[0]["qr_payload"].as_str().unwrap().starts_with("BILLET:1:"));
    assert!(tickets[0]["links"]["download_url"].is_string());

    let (status, body) = generate(&app, &seller, 2).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "QUOTA_EXCEEDED");
    assert_eq!(body["error"]["details"]["quota"], 3);
    assert_eq!(body["error"]["details"]["tickets_sold"], 2);

    let (status, body) = send(&app, Method::GET, "/api/tickets/seller", Some(&seller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tickets"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["summary"]["remaining"], 1);
}

#[tokio::test]
async fn test_generation_respects_capacity() {
    let app = test_app().await;
    let (_, _, seller) = seeded(&app, 2, 10).await;

    let (status, body) = generate(&app, &seller, 3).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CAPACITY_EXCEEDED");
}

#[tokio::test]
async fn test_revoked_seller_cannot_generate() {
    let app = test_app().await;
    let (admin, _, seller) = seeded(&app, 100, 5).await;
    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&seller), None).await;
    let seller_id = me["data"]["user"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/sellers/{seller_id}/revoke");
    let (status, body) = send(&app, Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (status, _) = generate(&app, &seller, 1).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/admin/sellers/{seller_id}/restore");
    send(&app, Method::POST, &uri, Some(&admin), None).await;
    let (status, _) = generate(&app, &seller, 1).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_scan_admits_once() {
    let app = test_app().await;
    let (admin, event_id, seller) = seeded(&app, 100, 5).await;
    let (_, body) = generate(&app, &seller, 1).await;
    let payload = body["data"][0]["qr_payload"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&admin),
        Some(json!({ "code": payload })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["result"], "admitted");
    assert_eq!(body["data"]["ticket"]["status"], "used");
    assert_eq!(body["data"]["event"]["id"], event_id.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&admin),
        Some(json!({ "code": payload })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "TICKET_ALREADY_USED");
    assert!(body["error"]["details"]["used_at"].is_string());
}

#[tokio::test]
async fn test_scan_accepts_typed_code() {
    let app = test_app().await;
    let (admin, _, seller) = seeded(&app, 100, 5).await;
    let (_, body) = generate(&app, &seller, 1).await;
    let display = body["data"][0]["display_code"].as_str().unwrap().to_lowercase();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/qr/lookup",
        Some(&admin),
        Some(json!({ "code": display })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["admissible"], true);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&admin),
        Some(json!({ "code": "not a ticket" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_revoke_and_restore() {
    let app = test_app().await;
    let (admin, _, seller) = seeded(&app, 100, 5).await;
    let (_, body) = generate(&app, &seller, 1).await;
    let ticket_id = body["data"][0]["id"].as_str().unwrap().to_string();
    let code = body["data"][0]["cryptic_code"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/tickets/{ticket_id}/revoke");
    let (status, body) = send(&app, Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "revoked");

    let (status, body) = send(&app, Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "INVALID_TRANSITION");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&admin),
        Some(json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "TICKET_REVOKED");

    let uri = format!("/api/admin/tickets/{ticket_id}/restore");
    let (status, body) = send(&app, Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "valid");
    assert!(body["data"]["revoked_at"].is_null());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&admin),
        Some(json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_event_admin_limit() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let event_id = create_event(&app, &admin, 10).await;
    let uri = format!("/api/admin/events/{event_id}/admins");

    for n in 1..=2 {
        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(&admin),
            Some(json!({
                "name": format!("Helper {n}"),
                "email": format!("helper{n}@billet.test"),
                "password": "helper-password"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&admin),
        Some(json!({
            "name": "One Too Many",
            "email": "helper3@billet.test",
            "password": "helper-password"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    let (_, body) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    // co-admins see the event but cannot manage its admins
    let helper = login(&app, "helper1@billet.test", "helper-password").await;
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/admin/events/{event_id}"),
        Some(&helper),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&helper),
        Some(json!({ "name": "X", "email": "x@billet.test", "password": "helper-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_links() {
    let app = test_app().await;
    let (_, _, seller) = seeded(&app, 100, 5).await;
    let (_, body) = generate(&app, &seller, 1).await;
    let ticket = &body["data"][0];
    let info_path = ticket["links"]["info_url"]
        .as_str()
        .unwrap()
        .strip_prefix(BASE_URL)
        .unwrap()
        .to_string();
    let download_path = ticket["links"]["download_url"]
        .as_str()
        .unwrap()
        .strip_prefix(BASE_URL)
        .unwrap()
        .to_string();

    let (status, body) = send(&app, Method::GET, &info_path, None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["buyer_name"], "Ada Buyer");
    assert_eq!(body["data"]["event"]["name"], "Harbour Night");
    assert!(body["data"].get("buyer_email").is_none());

    let request = Request::builder().uri(&download_path).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(document["qr_payload"].as_str().unwrap().starts_with("BILLET:1:"));

    let mut tampered = download_path.clone();
    tampered.pop();
    tampered.push(if download_path.ends_with('A') { 'B' } else { 'A' });
    let (status, body) = send(&app, Method::GET, &tampered, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn test_dashboard_counts() {
    let app = test_app().await;
    let (admin, _, seller) = seeded(&app, 100, 5).await;
    let (_, body) = generate(&app, &seller, 3).await;
    let code = body["data"][0]["cryptic_code"].as_str().unwrap().to_string();
    send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&admin),
        Some(json!({ "code": code })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/admin/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["events"], 1);
    assert_eq!(body["data"]["tickets"]["total"], 3);
    assert_eq!(body["data"]["tickets"]["used"], 1);
    assert_eq!(body["data"]["tickets"]["valid"], 2);
}

#[tokio::test]
async fn test_unknown_route_and_method_get_error_envelope() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (status, body) = send(&app, Method::DELETE, "/api/auth/login", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_code(&body), "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_unknown_email_login_is_indistinguishable() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@billet.test", "password": "whatever-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_admin_cannot_reach_another_admins_event() {
    let app = test_app().await;
    let (_, event_id, seller) = seeded(&app, 100, 5).await;
    let (_, body) = generate(&app, &seller, 1).await;
    let ticket_id = body["data"][0]["id"].as_str().unwrap().to_string();
    let code = body["data"][0]["cryptic_code"].as_str().unwrap().to_string();
    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&seller), None).await;
    let seller_id = me["data"]["user"]["id"].as_str().unwrap().to_string();

    let rival = login(&app, RIVAL_EMAIL, RIVAL_PASSWORD).await;
    create_event(&app, &rival, 50).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&rival),
        Some(json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let uri = format!("/api/admin/sellers/{seller_id}");
    let (status, body) = send(&app, Method::GET, &uri, Some(&rival), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let uri = format!("/api/admin/tickets/{ticket_id}/revoke");
    let (status, body) = send(&app, Method::POST, &uri, Some(&rival), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let uri = format!("/api/admin/tickets?event_id={event_id}");
    let (status, body) = send(&app, Method::GET, &uri, Some(&rival), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    // unscoped listings only cover the rival's own event
    let (status, body) = send(&app, Method::GET, "/api/admin/tickets", Some(&rival), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    // the ticket is untouched and still admits at its own event
    let owner = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/qr/verify",
        Some(&owner),
        Some(json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_quota_cannot_drop_below_sold() {
    let app = test_app().await;
    let (admin, _, seller) = seeded(&app, 100, 5).await;
    generate(&app, &seller, 3).await;
    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&seller), None).await;
    let seller_id = me["data"]["user"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/admin/sellers/{seller_id}/quota");

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({ "quota": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({ "quota": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quota"], 3);
}

#[tokio::test]
async fn test_owner_cannot_be_removed() {
    let app = test_app().await;
    let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let event_id = create_event(&app, &admin, 10).await;
    let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&admin), None).await;
    let owner_id = me["data"]["user"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/events/{event_id}/admins/{owner_id}");
    let (status, body) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");
}
