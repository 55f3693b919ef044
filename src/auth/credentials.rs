use bcrypt::{hash, verify, DEFAULT_COST};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::User;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

/// Returns the user when `username`/`password` match, `None` otherwise.
///
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
pub async fn authenticate(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let row: Option<(i32, String)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    let Some((id, password_hash)) = row else {
        log::info!("login failed: unknown username {:?}", username);
        return Ok(None);
    };
    if !verify_password(password, &password_hash)? {
        log::info!("login failed: wrong password for user {}", id);
        return Ok(None);
    }
    Ok(User::find(pool, id).await?)
}
