#[macro_use]
mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::{bearer, create_lookup, create_task, db_pool, lazy_pool, register_and_login, send, unique};
use serde_json::json;

#[actix_rt::test]
async fn test_duplicate_state_name_is_rejected() {
    let Some(pool) = db_pool().await else { return };
    let app = test_app!(pool);
    let user = register_and_login(&app, "states_").await;

    let name = unique("Backlog-");
    let post = |name: String| {
        test::TestRequest::post()
            .uri("/api/states/")
            .insert_header(bearer(&user.token))
            .set_json(json!({ "name": name }))
            .to_request()
    };

    let (status, body) = send(&app, post(name.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["name"], name.as_str());

    let (status, body) = send(&app, post(name.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["name"].is_array(), "{}", body);

    // Uniqueness ignores case.
    let (status, _) = send(&app, post(name.to_uppercase())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_priority_crud() {
    let Some(pool) = db_pool().await else { return };
    let app = test_app!(pool);
    let user = register_and_login(&app, "prio_").await;
    let id = create_lookup(&app, &user, "priorities", &unique("Urgent-")).await;

    let req = test::TestRequest::get().uri(&format!("/api/priorities/{}/", id)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let renamed = unique("Later-");
    let req = test::TestRequest::put()
        .uri(&format!("/api/priorities/{}", id))
        .insert_header(bearer(&user.token))
        .set_json(json!({ "name": renamed }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], renamed.as_str());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/priorities/{}/", id))
        .insert_header(bearer(&user.token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&format!("/api/priorities/{}/", id)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_batch_create_is_all_or_nothing() {
    let Some(pool) = db_pool().await else { return };
    let app = test_app!(pool);
    let user = register_and_login(&app, "batch_").await;

    let first = unique("Todo-");
    let second = unique("Doing-");
    let req = test::TestRequest::post()
        .uri("/api/states/")
        .insert_header(bearer(&user.token))
        .set_json(json!([{ "name": first }, { "name": second }]))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let untouched = unique("Never-");
    let req = test::TestRequest::post()
        .uri("/api/states/")
        .insert_header(bearer(&user.token))
        .set_json(json!([{ "name": untouched }, { "name": "" }]))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body[0], json!({}));
    assert!(body[1]["name"].is_array());

    let req = test::TestRequest::get().uri("/api/states/").to_request();
    let (_, body) = send(&app, req).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(names.contains(&first.as_str()));
    assert!(!names.contains(&untouched.as_str()));
}

#[actix_rt::test]
async fn test_lookup_validation_runs_before_the_store() {
    let app = test_app!(lazy_pool());
    let token = common::issuer().issue_pair(1).unwrap().access;

    let req = test::TestRequest::post()
        .uri("/api/priorities/")
        .insert_header(bearer(&token))
        .set_json(json!({ "name": "x".repeat(31) }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"][0], "Ensure this field has no more than 30 characters.");

    // Absent, blank and mistyped names are reported per field.
    for (payload, reason) in [
        (json!({}), "This field is required."),
        (json!({ "name": "   " }), "This field may not be blank."),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/states/")
            .insert_header(bearer(&token))
            .set_json(&payload)
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["name"][0], reason, "{}", payload);
    }

    let req = test::TestRequest::post()
        .uri("/api/states/")
        .insert_header(bearer(&token))
        .set_json(json!([{ "name": "Fine" }, {}, { "name": 7 }]))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body[0], json!({}));
    assert!(body[2]["non_field_errors"].is_array(), "{}", body);
    assert!(!body.to_string().contains("OneOrMany"));

    let req = test::TestRequest::post()
        .uri("/api/priorities/")
        .insert_header(bearer(&token))
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_deleting_a_priority_removes_its_tasks() {
    let Some(pool) = db_pool().await else { return };
    let app = test_app!(pool);
    let user = register_and_login(&app, "prio_cascade_").await;
    let state = create_lookup(&app, &user, "states", &unique("Open-")).await;
    let priority = create_lookup(&app, &user, "priorities", &unique("Doomed-")).await;
    let task = create_task(
        &app,
        &user,
        json!({
            "name": "Depends on priority",
            "description": "Goes away with it",
            "state": state,
            "priority": priority,
            "deadline": "2024-06-08"
        }),
    )
    .await;
    let uri = format!("/api/tasks/{}/", task["id"]);

    let req = test::TestRequest::get().uri(&uri).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/priorities/{}/", priority))
        .insert_header(bearer(&user.token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&uri).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The state is untouched.
    let req = test::TestRequest::get()
        .uri(&format!("/api/states/{}/", state))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}
