use crate::{
    auth::{hash_password, permissions::read_only_or_authenticated, Actor},
    error::AppError,
    models::{check_all, decode, OneOrMany, User, UserInput, UserUpdate},
};
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use serde_json::Value;
use sqlx::PgPool;

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

/// Lists every user. Passwords are never serialized.
#[get("")]
pub async fn list_users(pool: web::Data<PgPool>) -> Result<impl Responder, AppError> {
    let users = User::list(&pool).await?;
    Ok(HttpResponse::Ok().json(users))
}

/// Creates one user, or several in a single transaction when a list is posted.
///
/// Every item is validated before any row is written; a failure in any item
/// rejects the whole batch.
#[post("")]
pub async fn create_users(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    read_only_or_authenticated(req.method(), &actor)?;

    let payload = OneOrMany::<UserInput>::from_value(payload.into_inner())?;
    let many = payload.is_many();
    let new_users = check_all(many, payload.into_vec(), UserInput::into_new_user)?;
    let hashes = new_users
        .iter()
        .map(|user| hash_password(&user.password))
        .collect::<Result<Vec<String>, AppError>>()?;

    let mut tx = pool.begin().await?;
    let mut created = Vec::with_capacity(new_users.len());
    for (user, hash) in new_users.iter().zip(&hashes) {
        created.push(User::insert(&mut *tx, user, hash).await?);
    }
    tx.commit().await?;

    log::info!("created {} user(s)", created.len());
    Ok(HttpResponse::Created().json(OneOrMany::from_items(many, created)))
}

#[get("/{id}")]
pub async fn get_user(
    pool: web::Data<PgPool>,
    id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let user = User::find(&**pool, id.into_inner())
        .await?
        .ok_or_else(user_not_found)?;
    Ok(HttpResponse::Ok().json(user))
}

/// Replaces a user's profile. The password only changes when one is supplied.
#[put("/{id}")]
pub async fn update_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let id = id.into_inner();
    User::find(&**pool, id).await?.ok_or_else(user_not_found)?;
    read_only_or_authenticated(req.method(), &actor)?;
    let changes = decode::<UserUpdate>(payload.into_inner())?.into_changes()?;

    let password_hash = changes.password.as_deref().map(hash_password).transpose()?;
    let user = User::update(&**pool, id, &changes, password_hash.as_deref()).await?;
    log::info!("user {} updated by {:?}", id, actor);
    Ok(HttpResponse::Ok().json(user))
}

/// Deletes a user with the tasks they own and the comments they wrote.
#[delete("/{id}")]
pub async fn delete_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let id = id.into_inner();
    User::find(&**pool, id).await?.ok_or_else(user_not_found)?;
    read_only_or_authenticated(req.method(), &actor)?;

    if !User::delete(&**pool, id).await? {
        return Err(user_not_found());
    }
    log::info!("user {} deleted by {:?}", id, actor);
    Ok(HttpResponse::NoContent().finish())
}
