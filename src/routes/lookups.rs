//! Handlers shared by `/states` and `/priorities`.
//!
//! Generic functions cannot carry route attributes, so the two resources are wired
//! up with [`configure`] instead of `#[get]`/`#[post]` macros.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::Value;
use sqlx::PgPool;

use crate::{
    auth::{permissions::read_only_or_authenticated, Actor},
    error::AppError,
    models::{
        check_all, decode,
        lookup::{self, Lookup},
        LookupInput, OneOrMany,
    },
};

/// Returns a configuration function that mounts the collection and item routes
/// for `T` under `path`.
pub fn configure<T: Lookup>(path: &'static str) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.service(
            web::resource(path)
                .route(web::get().to(list::<T>))
                .route(web::post().to(create::<T>)),
        )
        .service(
            web::resource(format!("{}/{{id}}", path))
                .route(web::get().to(retrieve::<T>))
                .route(web::put().to(update::<T>))
                .route(web::delete().to(destroy::<T>)),
        );
    }
}

fn not_found<T: Lookup>() -> AppError {
    AppError::NotFound(format!("{} not found", T::LABEL))
}

async fn list<T: Lookup>(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let items = lookup::list::<T>(&pool).await?;
    Ok(HttpResponse::Ok().json(items))
}

/// Creates one entry, or several in a single transaction when a list is posted.
async fn create<T: Lookup>(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    read_only_or_authenticated(req.method(), &actor)?;

    let payload = OneOrMany::<LookupInput>::from_value(payload.into_inner())?;
    let many = payload.is_many();
    let names = check_all(many, payload.into_vec(), LookupInput::checked_name)?;

    let mut tx = pool.begin().await?;
    let mut created = Vec::with_capacity(names.len());
    for name in &names {
        created.push(lookup::insert::<T, _>(&mut *tx, name).await?);
    }
    tx.commit().await?;

    log::info!("created {} {} record(s)", created.len(), T::LABEL);
    Ok(HttpResponse::Created().json(OneOrMany::from_items(many, created)))
}

async fn retrieve<T: Lookup>(
    pool: web::Data<PgPool>,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let item = lookup::find::<T, _>(&**pool, id.into_inner())
        .await?
        .ok_or_else(not_found::<T>)?;
    Ok(HttpResponse::Ok().json(item))
}

async fn update<T: Lookup>(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    id: web::Path<i32>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    lookup::find::<T, _>(&**pool, id)
        .await?
        .ok_or_else(not_found::<T>)?;
    read_only_or_authenticated(req.method(), &actor)?;
    let name = decode::<LookupInput>(payload.into_inner())?.checked_name()?;

    let item = lookup::update::<T, _>(&**pool, id, &name).await?;
    log::info!("updated {} {}", T::LABEL, id);
    Ok(HttpResponse::Ok().json(item))
}

async fn destroy<T: Lookup>(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    actor: Actor,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let id = id.into_inner();
    lookup::find::<T, _>(&**pool, id)
        .await?
        .ok_or_else(not_found::<T>)?;
    read_only_or_authenticated(req.method(), &actor)?;

    if !lookup::delete::<T, _>(&**pool, id).await? {
        return Err(not_found::<T>());
    }
    log::info!("deleted {} {}", T::LABEL, id);
    Ok(HttpResponse::NoContent().finish())
}
