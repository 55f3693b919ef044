pub mod auth;
pub mod comments;
pub mod health;
pub mod lookups;
pub mod tasks;
pub mod users;

use actix_web::web;

use crate::error::AppError;
use crate::models::{Priority, State};

/// Malformed JSON bodies are client errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        log::debug!("rejected JSON body for {}: {}", req.path(), err);
        AppError::BadRequest(err.to_string()).into()
    })
}

/// Malformed query strings are client errors.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req| {
        log::debug!("rejected query string for {}: {}", req.path(), err);
        AppError::BadRequest(err.to_string()).into()
    })
}

/// Registers the token endpoints at the application root, ahead of the `/api`
/// scope. They sit outside `AuthMiddleware`, so a stale access token in the
/// `Authorization` header does not block login or refresh.
pub fn public_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/register")
            .app_data(json_config())
            .route(web::post().to(auth::register)),
    )
    .service(
        web::resource("/api/login")
            .app_data(json_config())
            .route(web::post().to(auth::login)),
    )
    .service(
        web::resource("/api/token/refresh")
            .app_data(json_config())
            .route(web::post().to(auth::refresh)),
    );
}

/// Registers the resource routes. Mounted under `/api` behind `AuthMiddleware`;
/// paths carry no trailing slash, `NormalizePath` strips it from incoming requests.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .configure(lookups::configure::<State>("/states"))
        .configure(lookups::configure::<Priority>("/priorities"))
        .service(
            web::scope("/users")
                .service(users::list_users)
                .service(users::create_users)
                .service(users::get_user)
                .service(users::update_user)
                .service(users::delete_user),
        )
        .service(
            web::scope("/tasks")
                // The by_* routes must precede `/{id}`.
                .service(tasks::by_state)
                .service(tasks::by_priority)
                .service(tasks::by_deadline)
                .service(tasks::by_owner)
                .service(tasks::by_assigned_users)
                .service(tasks::list_tasks)
                .service(tasks::create_tasks)
                .service(tasks::get_task)
                .service(tasks::update_task)
                .service(tasks::patch_task)
                .service(tasks::delete_task),
        )
        .service(
            web::scope("/comments")
                .service(comments::list_comments)
                .service(comments::create_comment)
                .service(comments::get_comment)
                .service(comments::update_comment)
                .service(comments::patch_comment)
                .service(comments::delete_comment),
        );
}
