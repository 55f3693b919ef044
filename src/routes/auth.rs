use crate::{
    auth::{authenticate, hash_password, AccessToken, LoginRequest, RefreshRequest, TokenIssuer},
    error::AppError,
    models::{decode, required, User, UserInput},
};
use actix_web::{web, HttpResponse, Responder};
use serde_json::Value;
use sqlx::PgPool;
use validator::Validate;

/// Register a new user
///
/// Mounted at `/api/register`. Open to anonymous callers. When `username` is omitted it is derived from the
/// local part of `email`. Responds with the created profile.
pub async fn register(
    pool: web::Data<PgPool>,
    register_data: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let new_user = decode::<UserInput>(register_data.into_inner())?.into_new_user()?;
    let password_hash = hash_password(&new_user.password)?;

    let user = User::insert(&**pool, &new_user, &password_hash).await?;
    log::info!("registered user {} ({})", user.id, user.username);

    Ok(HttpResponse::Created().json(user))
}

/// Login user
///
/// Mounted at `/api/login`. Exchanges a username and password for a
/// `{refresh, access}` token pair.
pub async fn login(
    pool: web::Data<PgPool>,
    issuer: web::Data<TokenIssuer>,
    login_data: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let login = decode::<LoginRequest>(login_data.into_inner())?;
    login.validate()?;
    let username = required(login.username, "username")?;
    let password = required(login.password, "password")?;

    let user = authenticate(&pool, &username, &password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let tokens = issuer.issue_pair(user.id)?;
    log::info!("user {} logged in", user.id);
    Ok(HttpResponse::Ok().json(tokens))
}

/// Refresh an access token
///
/// Mounted at `/api/token/refresh`. Accepts only refresh tokens; an access token in `refresh` is rejected with 401.
pub async fn refresh(
    issuer: web::Data<TokenIssuer>,
    refresh_data: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let request = decode::<RefreshRequest>(refresh_data.into_inner())?;
    request.validate()?;
    let access = issuer.refresh(&required(request.refresh, "refresh")?)?;
    Ok(HttpResponse::Ok().json(AccessToken { access }))
}
