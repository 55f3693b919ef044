use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use validator::Validate;

use crate::error::AppError;
use crate::models::required;
use crate::validation::{parse_date, trimmed, username_from_email, validate_date, USERNAME_REGEX};

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, birth_date, identification";

/// Public representation of a user. The password hash never leaves the database layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub identification: Option<i64>,
}

/// Payload for `POST /users/` and `POST /register/`.
#[derive(Debug, Deserialize, Validate)]
pub struct UserInput {
    /// Optional; derived from the email local part when missing or blank.
    #[validate(
        length(max = 150),
        regex(
            path = "USERNAME_REGEX",
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: Option<String>,
    #[validate(required, length(min = 1, max = 128))]
    pub password: Option<String>,
    #[validate(required, email, length(max = 254))]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
    #[validate(custom = "validate_date")]
    pub birth_date: Option<String>,
    #[validate(range(min = 0))]
    pub identification: Option<i64>,
}

/// Payload for `PUT /users/{id}/`. The password is only changed when supplied.
#[derive(Debug, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(
        required,
        length(min = 1, max = 150),
        regex(
            path = "USERNAME_REGEX",
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub password: Option<String>,
    #[validate(required, email, length(max = 254))]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub full_name: Option<String>,
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
    #[validate(custom = "validate_date")]
    pub birth_date: Option<String>,
    #[validate(range(min = 0))]
    pub identification: Option<i64>,
}

/// A validated profile replacement. `password` is plain text and optional.
#[derive(Debug, Clone, PartialEq)]
pub struct UserChanges {
    pub username: String,
    pub password: Option<String>,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub identification: Option<i64>,
}

/// A validated user ready to be written. `password` is still plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub identification: Option<i64>,
}

impl UserInput {
    /// Validates the payload and fills in the username from the email when absent.
    /// A username that was supplied is kept as is.
    pub fn into_new_user(self) -> Result<NewUser, AppError> {
        let input = UserInput {
            username: trimmed(self.username).filter(|name| !name.is_empty()),
            email: trimmed(self.email),
            full_name: trimmed(self.full_name),
            ..self
        };
        input.validate()?;

        let email = required(input.email, "email")?;
        let username = input.username.unwrap_or_else(|| username_from_email(&email));
        if !USERNAME_REGEX.is_match(&username) {
            return Err(AppError::field(
                "username",
                "Could not derive a valid username from the email address.",
            ));
        }

        Ok(NewUser {
            username,
            password: required(input.password, "password")?,
            email,
            full_name: input.full_name.unwrap_or_default(),
            avatar: input.avatar,
            birth_date: input.birth_date.as_deref().and_then(parse_date),
            identification: input.identification,
        })
    }
}

impl UserUpdate {
    /// Trims the text fields and validates the replacement profile.
    pub fn into_changes(self) -> Result<UserChanges, AppError> {
        let update = UserUpdate {
            username: trimmed(self.username),
            email: trimmed(self.email),
            full_name: trimmed(self.full_name),
            ..self
        };
        update.validate()?;

        Ok(UserChanges {
            username: required(update.username, "username")?,
            password: update.password,
            email: required(update.email, "email")?,
            full_name: update.full_name.unwrap_or_default(),
            avatar: update.avatar,
            birth_date: update.birth_date.as_deref().and_then(parse_date),
            identification: update.identification,
        })
    }
}

impl User {
    pub async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(pool)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_username<'e, E: PgExecutor<'e>>(
        executor: E,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS))
            .bind(username)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_many<'e, E: PgExecutor<'e>>(
        executor: E,
        ids: &[i32],
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1) ORDER BY id",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(executor)
        .await
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        user: &NewUser,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password_hash, email, full_name, avatar, birth_date, identification) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(password_hash)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(user.birth_date)
        .bind(user.identification)
        .fetch_one(executor)
        .await
    }

    /// Replaces the profile fields. `password_hash` of `None` keeps the current password.
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i32,
        changes: &UserChanges,
        password_hash: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET username = $1, email = $2, full_name = $3, avatar = $4, \
             birth_date = $5, identification = $6, password_hash = COALESCE($7, password_hash) \
             WHERE id = $8 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.full_name)
        .bind(&changes.avatar)
        .bind(changes.birth_date)
        .bind(changes.identification)
        .bind(password_hash)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    /// Deletes the user together with the tasks they own and the comments they wrote.
    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
