use crate::{
    auth::{
        permissions::{owner_or_assigned_only, read_only_or_authenticated},
        Actor,
    },
    error::AppError,
    filters::{find_tasks, Dimension, TaskFilter, TaskQuery},
    models::{
        check_all, decode, task::KnownReferences, OneOrMany, Task, TaskDetail, TaskInput, TaskPatch,
    },
};
use actix_web::{delete, get, patch, post, put, web, HttpRequest, HttpResponse, Responder};
use serde_json::Value;
use sqlx::PgPool;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found".into())
}

async fn load_task(pool: &PgPool, id: i32) -> Result<Task, AppError> {
    Task::find(pool, id).await?.ok_or_else(task_not_found)
}

/// Runs a filtered listing and renders it with nested relations.
async fn filtered(pool: &PgPool, query: &TaskQuery) -> Result<HttpResponse, AppError> {
    let filter = TaskFilter::resolve(pool, query).await?;
    let tasks = find_tasks(pool, &filter).await?;
    let details = TaskDetail::expand(pool, tasks).await?;
    Ok(HttpResponse::Ok().json(details))
}

async fn filtered_by(
    pool: &PgPool,
    query: web::Query<TaskQuery>,
    dimension: Dimension,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner().restrict_to(dimension)?;
    filtered(pool, &query).await
}

/// Retrieves tasks, ordered by ascending deadline.
///
/// ## Query Parameters (all optional, combined with AND):
/// - `state`, `priority`: id, or case-insensitive name.
/// - `deadline` with `filter` = `exact` (default), `before` or `after`.
/// - `deadline_after_or_on`, `deadline_before_or_on`: inclusive bounds.
/// - `owner`, `assigned_users`: user id or username.
///
/// ## Responses:
/// - `200 OK`: JSON array of tasks with nested state, priority and users.
/// - `400 Bad Request`: a date or `filter` value is malformed.
/// - `404 Not Found`: an identifier does not resolve.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    filtered(&pool, &query).await
}

#[get("/by_state")]
pub async fn by_state(
    pool: web::Data<PgPool>,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    filtered_by(&pool, query, Dimension::State).await
}

#[get("/by_priority")]
pub async fn by_priority(
    pool: web::Data<PgPool>,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    filtered_by(&pool, query, Dimension::Priority).await
}

#[get("/by_deadline")]
pub async fn by_deadline(
    pool: web::Data<PgPool>,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    filtered_by(&pool, query, Dimension::Deadline).await
}

#[get("/by_owner")]
pub async fn by_owner(
    pool: web::Data<PgPool>,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    filtered_by(&pool, query, Dimension::Owner).await
}

#[get("/by_assigned_users")]
pub async fn by_assigned_users(
    pool: web::Data<PgPool>,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    filtered_by(&pool, query, Dimension::AssignedUsers).await
}

/// Creates one task, or several in a single transaction when a list is posted.
///
/// The owner is always the authenticated caller; an `owner` field in the body is
/// ignored.
///
/// ## Responses:
/// - `201 Created`: the created task(s), mirroring the request shape.
/// - `400 Bad Request`: field errors (a list of per-item maps for list payloads).
/// - `401 Unauthorized`: no credentials.
#[post("")]
pub async fn create_tasks(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    read_only_or_authenticated(req.method(), &actor)?;
    let owner_id = actor.user_id().ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".into())
    })?;

    let payload = OneOrMany::<TaskInput>::from_value(payload.into_inner())?;
    let many = payload.is_many();
    let inputs = payload.into_vec();
    let known = KnownReferences::load(&pool, &inputs).await?;
    let writes = check_all(many, inputs, |input| input.check(&known))?;

    let mut tx = pool.begin().await?;
    let mut created = Vec::with_capacity(writes.len());
    for write in &writes {
        created.push(Task::insert(&mut tx, owner_id, write).await?);
    }
    tx.commit().await?;

    log::info!("user {} created {} task(s)", owner_id, created.len());
    let details = TaskDetail::expand(&pool, created).await?;
    Ok(HttpResponse::Created().json(OneOrMany::from_items(many, details)))
}

#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let task = load_task(&pool, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TaskDetail::expand_one(&pool, task).await?))
}

/// Validates `input` against the store and rewrites the task in one transaction.
async fn apply_update(pool: &PgPool, task: &Task, input: TaskInput) -> Result<HttpResponse, AppError> {
    let known = KnownReferences::load(pool, std::slice::from_ref(&input)).await?;
    let write = input.check(&known)?;

    let mut tx = pool.begin().await?;
    let updated = Task::update(&mut tx, task.id, &write).await?;
    tx.commit().await?;

    log::info!("task {} updated", task.id);
    Ok(HttpResponse::Ok().json(TaskDetail::expand_one(pool, updated).await?))
}

/// Replaces every writable field. Only the owner or an assigned user may do this.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let task = load_task(&pool, id.into_inner()).await?;
    owner_or_assigned_only(req.method(), &actor, &task)?;
    let input = decode::<TaskInput>(payload.into_inner())?;
    apply_update(&pool, &task, input).await
}

/// Changes only the fields present in the body.
#[patch("/{id}")]
pub async fn patch_task(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let task = load_task(&pool, id.into_inner()).await?;
    owner_or_assigned_only(req.method(), &actor, &task)?;
    let input = decode::<TaskPatch>(payload.into_inner())?.merge_into(&task);
    apply_update(&pool, &task, input).await
}

/// Deletes a task together with its assignments and comments.
///
/// ## Responses:
/// - `204 No Content`: deleted.
/// - `401 Unauthorized`: no credentials.
/// - `403 Forbidden`: the caller neither owns nor is assigned to the task.
/// - `404 Not Found`: no such task.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    id: web::Path<i32>,
) -> Result<impl Responder, AppError> {
    let task = load_task(&pool, id.into_inner()).await?;
    owner_or_assigned_only(req.method(), &actor, &task)?;

    if !Task::delete(&**pool, task.id).await? {
        return Err(task_not_found());
    }
    log::info!("task {} deleted by {:?}", task.id, actor);
    Ok(HttpResponse::NoContent().finish())
}
