use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use validator::Validate;

use crate::error::AppError;
use crate::models::required;
use crate::validation::trimmed;

const COMMENT_COLUMNS: &str = "id, task_id, user_id, text, created_at";

/// A comment on a task. `user` is the author and is always the actor who created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i32,
    #[serde(rename = "task")]
    pub task_id: i32,
    #[serde(rename = "user")]
    pub user_id: i32,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST` and `PUT`. A `user` field in the body is ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentInput {
    pub task: Option<i32>,
    #[validate(required, length(min = 1))]
    pub text: Option<String>,
}

/// Payload for `PATCH`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentPatch {
    pub task: Option<i32>,
    pub text: Option<String>,
}

impl CommentInput {
    /// Trims and validates the text and checks that a task id is present.
    /// Returns the task id with the text to store.
    pub fn checked(self) -> Result<(i32, String), AppError> {
        let input = CommentInput { text: trimmed(self.text), ..self };
        input.validate()?;
        let task = required(input.task, "task")?;
        Ok((task, required(input.text, "text")?))
    }
}

impl CommentPatch {
    pub fn merge_into(self, current: &Comment) -> CommentInput {
        CommentInput {
            task: self.task.or(Some(current.task_id)),
            text: self.text.or_else(|| Some(current.text.clone())),
        }
    }
}

impl Comment {
    pub async fn list(pool: &PgPool) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments ORDER BY created_at, id",
            COMMENT_COLUMNS
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        task_id: i32,
        author_id: i32,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (task_id, user_id, text) VALUES ($1, $2, $3) RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(task_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(executor)
        .await
    }

    /// Updates task and text. The author is never reassigned.
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i32,
        task_id: i32,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET task_id = $1, text = $2 WHERE id = $3 RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(task_id)
        .bind(text)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
