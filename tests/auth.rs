#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use chrono::Duration;
use common::{bearer, db_pool, lazy_pool, send, status_of, unique, PASSWORD};
use serde_json::json;
use workstream::auth::{TokenIssuer, TokenType};

#[actix_rt::test]
async fn test_register_and_login_flow() {
    let Some(pool) = db_pool().await else { return };
    let app = test_app!(pool);

    let username = unique("integration_");
    let register_payload = json!({
        "username": username,
        "email": format!("{}@example.com", username),
        "password": PASSWORD,
        "full_name": "Integration User",
        "birth_date": "1990-04-01"
    });
    let req = test::TestRequest::post()
        .uri("/api/register/")
        .set_json(&register_payload)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Registration failed. Body: {}", body);
    assert_eq!(body["username"], username.as_str());
    assert_eq!(body["birth_date"], "1990-04-01");
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    // Same username and email again
    let req = test::TestRequest::post()
        .uri("/api/register/")
        .set_json(&register_payload)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "Duplicate registration did not fail. Body: {}", body);

    let req = test::TestRequest::post()
        .uri("/api/login/")
        .set_json(json!({ "username": username, "password": PASSWORD }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "Login failed. Body: {}", body);
    let access = body["access"].as_str().unwrap();
    let refresh = body["refresh"].as_str().unwrap();
    let access_claims = common::issuer().verify(access, TokenType::Access).unwrap();
    let refresh_claims = common::issuer().verify(refresh, TokenType::Refresh).unwrap();
    assert_eq!(access_claims.sub, refresh_claims.sub);

    let req = test::TestRequest::post()
        .uri("/api/token/refresh/")
        .set_json(json!({ "refresh": refresh }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());
}

#[actix_rt::test]
async fn test_register_derives_username_from_email() {
    let Some(pool) = db_pool().await else { return };
    let app = test_app!(pool);

    let local_part = unique("a");
    let req = test::TestRequest::post()
        .uri("/api/register/")
        .set_json(json!({ "email": format!("{}@b.com", local_part), "password": PASSWORD }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["username"], local_part.as_str());
}

#[actix_rt::test]
async fn test_login_with_wrong_password() {
    let Some(pool) = db_pool().await else { return };
    let app = test_app!(pool);
    let user = common::register_and_login(&app, "wrongpw_").await;

    let req = test::TestRequest::post()
        .uri("/api/login/")
        .set_json(json!({ "username": user.username, "password": "not-the-password" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Incorrect username or password.");

    let req = test::TestRequest::post()
        .uri("/api/login/")
        .set_json(json!({ "username": unique("ghost_"), "password": PASSWORD }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_register_rejects_invalid_payloads() {
    let app = test_app!(lazy_pool());

    let req = test::TestRequest::post()
        .uri("/api/register/")
        .set_json(json!({ "email": "not-an-email", "password": PASSWORD }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());

    let req = test::TestRequest::post()
        .uri("/api/register/")
        .set_json(json!({ "email": "x@example.com", "password": PASSWORD, "birth_date": "01/02/1990" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["birth_date"].is_array());
}

#[actix_rt::test]
async fn test_invalid_bearer_token_is_rejected() {
    let app = test_app!(lazy_pool());

    let req = test::TestRequest::get()
        .uri("/api/tasks/")
        .insert_header(bearer("garbage.token.value"))
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::UNAUTHORIZED);

    // Refresh tokens do not authenticate API requests.
    let refresh = common::issuer().issue(1, TokenType::Refresh).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/tasks/")
        .insert_header(bearer(&refresh))
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_anonymous_writes_are_unauthorized() {
    let app = test_app!(lazy_pool());

    let req = test::TestRequest::post()
        .uri("/api/states/")
        .set_json(json!({ "name": "Backlog" }))
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/tasks")
        .set_json(json!({
            "name": "Task",
            "description": "Description",
            "state": 1,
            "priority": 1,
            "deadline": "2024-06-08"
        }))
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::UNAUTHORIZED);

    // Comments need credentials even for reads.
    let req = test::TestRequest::get().uri("/api/comments/").to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_refresh_ignores_a_stale_access_header() {
    let app = test_app!(lazy_pool());

    let expired = TokenIssuer::new(
        "integration-test-secret",
        Duration::minutes(-10),
        Duration::days(1),
    )
    .issue(7, TokenType::Access)
    .unwrap();
    // The stale token still guards the resource routes.
    let req = test::TestRequest::get()
        .uri("/api/tasks/")
        .insert_header(bearer(&expired))
        .to_request();
    assert_eq!(status_of(&app, req).await, StatusCode::UNAUTHORIZED);

    let refresh = common::issuer().issue(7, TokenType::Refresh).unwrap();
    let req = test::TestRequest::post()
        .uri("/api/token/refresh/")
        .insert_header(bearer(&expired))
        .set_json(json!({ "refresh": refresh }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let access = body["access"].as_str().unwrap();
    assert_eq!(common::issuer().verify(access, TokenType::Access).unwrap().sub, 7);
}
