//! Comment endpoints. Every method requires an authenticated caller; writes to an
//! existing comment are limited to its author.

use crate::{
    auth::{permissions::comment_author_only, Actor, AuthenticatedUser},
    error::AppError,
    models::{decode, Comment, CommentInput, CommentPatch, Task},
};
use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse, Responder};
use serde_json::Value;
use sqlx::PgPool;

fn comment_not_found() -> AppError {
    AppError::NotFound("Comment not found".into())
}

async fn load_comment(pool: &PgPool, id: i32) -> Result<Comment, AppError> {
    Comment::find(pool, id).await?.ok_or_else(comment_not_found)
}

/// Validates the payload and returns the id of the task it points at, which must
/// exist, along with the text to store.
async fn checked_input(pool: &PgPool, input: CommentInput) -> Result<(i32, String), AppError> {
    let (task_id, text) = input.checked()?;
    match Task::find(pool, task_id).await? {
        Some(task) => Ok((task.id, text)),
        None => Err(AppError::field("task", "Task does not exist.")),
    }
}

#[get("")]
pub async fn list_comments(
    pool: web::Data<PgPool>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let comments = Comment::list(&pool).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// Adds a comment to a task. The author is the caller, whatever the body says.
#[post("")]
pub async fn create_comment(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let input = decode::<CommentInput>(payload.into_inner())?;
    let (task_id, text) = checked_input(&pool, input).await?;
    let comment = Comment::insert(&**pool, task_id, user.0, &text).await?;
    log::info!("user {} commented on task {}", user.0, task_id);
    Ok(HttpResponse::Created().json(comment))
}

#[get("/{id}")]
pub async fn get_comment(
    pool: web::Data<PgPool>,
    _user: AuthenticatedUser,
    id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let comment = load_comment(&pool, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comment))
}

async fn apply_update(pool: &PgPool, comment: &Comment, input: CommentInput) -> Result<HttpResponse, AppError> {
    let (task_id, text) = checked_input(pool, input).await?;
    let updated = Comment::update(pool, comment.id, task_id, &text).await?;
    log::info!("comment {} updated", comment.id);
    Ok(HttpResponse::Ok().json(updated))
}

#[put("/{id}")]
pub async fn update_comment(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    user: AuthenticatedUser,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let comment = load_comment(&pool, id.into_inner()).await?;
    comment_author_only(req.method(), &Actor::User(user.0), &comment)?;
    apply_update(&pool, &comment, decode::<CommentInput>(payload.into_inner())?).await
}

#[patch("/{id}")]
pub async fn patch_comment(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    user: AuthenticatedUser,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let comment = load_comment(&pool, id.into_inner()).await?;
    comment_author_only(req.method(), &Actor::User(user.0), &comment)?;
    let input = decode::<CommentPatch>(payload.into_inner())?.merge_into(&comment);
    apply_update(&pool, &comment, input).await
}

#[delete("/{id}")]
pub async fn delete_comment(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    user: AuthenticatedUser,
    id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let comment = load_comment(&pool, id.into_inner()).await?;
    comment_author_only(req.method(), &Actor::User(user.0), &comment)?;

    if !Comment::delete(&**pool, comment.id).await? {
        return Err(comment_not_found());
    }
    log::info!("comment {} deleted by user {}", comment.id, user.0);
    Ok(HttpResponse::NoContent().finish())
}
