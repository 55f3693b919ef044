//! States and priorities: small named catalogs referenced by tasks.
//!
//! Both tables have the same shape, so the queries are written once against the
//! [`Lookup`] trait and the route handlers are generic over it.

use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgExecutor, PgPool};
use validator::Validate;

use crate::error::AppError;
use crate::models::required;
use crate::validation::trimmed;

/// A task workflow state such as "Backlog" or "Done".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct State {
    pub id: i32,
    pub name: String,
}

/// A task priority such as "Urgent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Priority {
    pub id: i32,
    pub name: String,
}

/// Write payload shared by states and priorities.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LookupInput {
    /// Unique (case-insensitively) name, at most 30 characters.
    #[validate(required, length(min = 1, max = 30))]
    pub name: Option<String>,
}

impl LookupInput {
    /// Trims and validates the name, returning the value to store.
    pub fn checked_name(self) -> Result<String, AppError> {
        let input = LookupInput { name: trimmed(self.name) };
        input.validate()?;
        required(input.name, "name")
    }
}

pub trait Lookup: Serialize + for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    /// Backing table.
    const TABLE: &'static str;
    /// Human readable entity name used in error messages.
    const LABEL: &'static str;

    fn id(&self) -> i32;
}

impl Lookup for State {
    const TABLE: &'static str = "states";
    const LABEL: &'static str = "State";

    fn id(&self) -> i32 {
        self.id
    }
}

impl Lookup for Priority {
    const TABLE: &'static str = "priorities";
    const LABEL: &'static str = "Priority";

    fn id(&self) -> i32 {
        self.id
    }
}

pub async fn list<T: Lookup>(pool: &PgPool) -> Result<Vec<T>, sqlx::Error> {
    sqlx::query_as::<_, T>(&format!("SELECT id, name FROM {} ORDER BY id", T::TABLE))
        .fetch_all(pool)
        .await
}

pub async fn find<'e, T: Lookup, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
) -> Result<Option<T>, sqlx::Error> {
    sqlx::query_as::<_, T>(&format!("SELECT id, name FROM {} WHERE id = $1", T::TABLE))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Case-insensitive exact name match.
pub async fn find_by_name<'e, T: Lookup, E: PgExecutor<'e>>(
    executor: E,
    name: &str,
) -> Result<Option<T>, sqlx::Error> {
    sqlx::query_as::<_, T>(&format!(
        "SELECT id, name FROM {} WHERE LOWER(name) = LOWER($1)",
        T::TABLE
    ))
    .bind(name)
    .fetch_optional(executor)
    .await
}

pub async fn find_many<'e, T: Lookup, E: PgExecutor<'e>>(
    executor: E,
    ids: &[i32],
) -> Result<Vec<T>, sqlx::Error> {
    sqlx::query_as::<_, T>(&format!(
        "SELECT id, name FROM {} WHERE id = ANY($1) ORDER BY id",
        T::TABLE
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
}

pub async fn insert<'e, T: Lookup, E: PgExecutor<'e>>(
    executor: E,
    name: &str,
) -> Result<T, sqlx::Error> {
    sqlx::query_as::<_, T>(&format!(
        "INSERT INTO {} (name) VALUES ($1) RETURNING id, name",
        T::TABLE
    ))
    .bind(name)
    .fetch_one(executor)
    .await
}

pub async fn update<'e, T: Lookup, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
    name: &str,
) -> Result<T, sqlx::Error> {
    sqlx::query_as::<_, T>(&format!(
        "UPDATE {} SET name = $1 WHERE id = $2 RETURNING id, name",
        T::TABLE
    ))
    .bind(name)
    .bind(id)
    .fetch_one(executor)
    .await
}

/// Deletes the row; dependent tasks go with it through `ON DELETE CASCADE`.
pub async fn delete<'e, T: Lookup, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", T::TABLE))
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
