use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use std::collections::{BTreeSet, HashMap, HashSet};
use validator::Validate;

use crate::error::{AppError, FieldErrors};
use crate::models::{lookup, merge_errors, required, Priority, State, User};
use crate::validation::{parse_date, trimmed, validate_date, DATE_FORMAT};

/// Selects tasks with their assigned user ids aggregated into an array.
/// Callers append `WHERE` conditions followed by [`TASK_GROUP_ORDER`].
pub const TASK_SELECT: &str = "SELECT t.id, t.name, t.description, t.state_id, t.priority_id, \
     t.deadline, t.owner_id, \
     COALESCE(ARRAY_AGG(a.user_id ORDER BY a.user_id) FILTER (WHERE a.user_id IS NOT NULL), \
     '{}'::INTEGER[]) AS assigned_users \
     FROM tasks t LEFT JOIN task_assigned_users a ON a.task_id = t.id";

/// Tasks are always listed by ascending deadline; the id breaks ties.
pub const TASK_GROUP_ORDER: &str = " GROUP BY t.id ORDER BY t.deadline ASC, t.id ASC";

/// A task row with foreign keys as ids. This is what the authorization policies look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub state_id: i32,
    pub priority_id: i32,
    pub deadline: NaiveDate,
    pub owner_id: i32,
    pub assigned_users: Vec<i32>,
}

/// The read representation: relations are nested objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub state: State,
    pub priority: Priority,
    pub deadline: NaiveDate,
    pub owner: User,
    pub assigned_users: Vec<User>,
}

/// Full write payload (`POST` and `PUT`). Any `owner` sent by the client is ignored.
/// Absent fields decode as `None` and are reported by validation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    #[validate(required, length(min = 1, max = 40))]
    pub name: Option<String>,
    #[validate(required, length(min = 1, max = 255))]
    pub description: Option<String>,
    #[validate(required)]
    pub state: Option<i32>,
    #[validate(required)]
    pub priority: Option<i32>,
    #[validate(required, custom = "validate_date")]
    pub deadline: Option<String>,
    #[serde(default)]
    pub assigned_users: Vec<i32>,
}

/// Partial write payload (`PATCH`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub state: Option<i32>,
    pub priority: Option<i32>,
    pub deadline: Option<String>,
    pub assigned_users: Option<Vec<i32>>,
}

/// A validated write whose references are known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWrite {
    pub name: String,
    pub description: String,
    pub state_id: i32,
    pub priority_id: i32,
    pub deadline: NaiveDate,
    pub assigned_users: Vec<i32>,
}

/// Ids that exist in the store, fetched once per request for every id a payload mentions.
#[derive(Debug, Default, Clone)]
pub struct KnownReferences {
    pub states: HashSet<i32>,
    pub priorities: HashSet<i32>,
    pub users: HashSet<i32>,
}

fn missing_pk(id: i32) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

impl KnownReferences {
    pub async fn load(pool: &PgPool, inputs: &[TaskInput]) -> Result<Self, sqlx::Error> {
        let states: Vec<i32> = inputs.iter().filter_map(|t| t.state).collect();
        let priorities: Vec<i32> = inputs.iter().filter_map(|t| t.priority).collect();
        let users: Vec<i32> = inputs
            .iter()
            .flat_map(|t| t.assigned_users.iter().copied())
            .collect();

        Ok(Self {
            states: lookup::find_many::<State, _>(pool, &states)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect(),
            priorities: lookup::find_many::<Priority, _>(pool, &priorities)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect(),
            users: User::find_many(pool, &users)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect(),
        })
    }
}

impl TaskInput {
    /// Trims text fields, then validates field constraints and references,
    /// collecting every failure.
    pub fn check(self, known: &KnownReferences) -> Result<TaskWrite, AppError> {
        let input = TaskInput {
            name: trimmed(self.name),
            description: trimmed(self.description),
            ..self
        };

        let mut errors = FieldErrors::new();
        if let Err(validation) = input.validate() {
            if let AppError::ValidationError(fields) = AppError::from(validation) {
                merge_errors(&mut errors, fields);
            }
        }
        if let Some(state) = input.state.filter(|id| !known.states.contains(id)) {
            errors.entry("state".into()).or_default().push(missing_pk(state));
        }
        if let Some(priority) = input.priority.filter(|id| !known.priorities.contains(id)) {
            errors.entry("priority".into()).or_default().push(missing_pk(priority));
        }
        for user in &input.assigned_users {
            if !known.users.contains(user) {
                errors.entry("assigned_users".into()).or_default().push(missing_pk(*user));
            }
        }
        if !errors.is_empty() {
            return Err(AppError::ValidationError(errors));
        }

        let deadline = parse_date(&required(input.deadline, "deadline")?)
            .ok_or_else(|| AppError::field("deadline", "Date has wrong format."))?;
        let assigned_users: BTreeSet<i32> = input.assigned_users.into_iter().collect();

        Ok(TaskWrite {
            name: required(input.name, "name")?,
            description: required(input.description, "description")?,
            state_id: required(input.state, "state")?,
            priority_id: required(input.priority, "priority")?,
            deadline,
            assigned_users: assigned_users.into_iter().collect(),
        })
    }
}

impl TaskPatch {
    /// Overlays the patch on the current task, producing a full payload to validate.
    pub fn merge_into(self, current: &Task) -> TaskInput {
        TaskInput {
            name: self.name.or_else(|| Some(current.name.clone())),
            description: self.description.or_else(|| Some(current.description.clone())),
            state: self.state.or(Some(current.state_id)),
            priority: self.priority.or(Some(current.priority_id)),
            deadline: self
                .deadline
                .or_else(|| Some(current.deadline.format(DATE_FORMAT).to_string())),
            assigned_users: self
                .assigned_users
                .unwrap_or_else(|| current.assigned_users.clone()),
        }
    }
}

impl Task {
    pub async fn find<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("{} WHERE t.id = $1{}", TASK_SELECT, TASK_GROUP_ORDER))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Inserts the task and its assignments. `owner_id` always comes from the actor.
    pub async fn insert(
        conn: &mut PgConnection,
        owner_id: i32,
        write: &TaskWrite,
    ) -> Result<Task, sqlx::Error> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO tasks (name, description, state_id, priority_id, deadline, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&write.name)
        .bind(&write.description)
        .bind(write.state_id)
        .bind(write.priority_id)
        .bind(write.deadline)
        .bind(owner_id)
        .fetch_one(&mut *conn)
        .await?;

        Self::replace_assignments(&mut *conn, id, &write.assigned_users).await?;
        Self::find(&mut *conn, id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Rewrites every writable field. The owner never changes.
    pub async fn update(
        conn: &mut PgConnection,
        id: i32,
        write: &TaskWrite,
    ) -> Result<Task, sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET name = $1, description = $2, state_id = $3, priority_id = $4, \
             deadline = $5 WHERE id = $6",
        )
        .bind(&write.name)
        .bind(&write.description)
        .bind(write.state_id)
        .bind(write.priority_id)
        .bind(write.deadline)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Self::replace_assignments(&mut *conn, id, &write.assigned_users).await?;
        Self::find(&mut *conn, id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// The new set of assigned users supersedes the old one. Run inside the parent
    /// write's transaction.
    async fn replace_assignments(
        conn: &mut PgConnection,
        task_id: i32,
        users: &[i32],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_assigned_users WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;
        if !users.is_empty() {
            sqlx::query(
                "INSERT INTO task_assigned_users (task_id, user_id) \
                 SELECT $1, UNNEST($2::INTEGER[]) ON CONFLICT DO NOTHING",
            )
            .bind(task_id)
            .bind(users)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Deletes the task; assignments and comments cascade.
    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// True when `user_id` may write to this task.
    pub fn is_owned_or_assigned_to(&self, user_id: i32) -> bool {
        self.owner_id == user_id || self.assigned_users.contains(&user_id)
    }
}

impl TaskDetail {
    /// Loads the related rows for a batch of tasks and nests them. Order is preserved.
    ///
    /// A task whose relations were deleted between the two reads went away with them
    /// (every foreign key cascades) and is left out.
    pub async fn expand(pool: &PgPool, tasks: Vec<Task>) -> Result<Vec<TaskDetail>, AppError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let state_ids: Vec<i32> = tasks.iter().map(|t| t.state_id).collect();
        let priority_ids: Vec<i32> = tasks.iter().map(|t| t.priority_id).collect();
        let user_ids: Vec<i32> = tasks
            .iter()
            .flat_map(|t| std::iter::once(t.owner_id).chain(t.assigned_users.iter().copied()))
            .collect();

        let states: HashMap<i32, State> = lookup::find_many::<State, _>(pool, &state_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let priorities: HashMap<i32, Priority> = lookup::find_many::<Priority, _>(pool, &priority_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let users: HashMap<i32, User> = User::find_many(pool, &user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(tasks
            .into_iter()
            .filter_map(|task| match TaskDetail::assemble(task, &states, &priorities, &users) {
                Ok(detail) => Some(detail),
                Err(e) => {
                    log::debug!("skipping task removed while loading: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn expand_one(pool: &PgPool, task: Task) -> Result<TaskDetail, AppError> {
        let mut details = Self::expand(pool, vec![task]).await?;
        details
            .pop()
            .ok_or_else(|| AppError::NotFound("Task not found".into()))
    }

    fn assemble(
        task: Task,
        states: &HashMap<i32, State>,
        priorities: &HashMap<i32, Priority>,
        users: &HashMap<i32, User>,
    ) -> Result<TaskDetail, AppError> {
        let dangling = |what: &str| {
            AppError::InternalServerError(format!("Task {} references a missing {}", task.id, what))
        };
        let state = states.get(&task.state_id).cloned().ok_or_else(|| dangling("state"))?;
        let priority = priorities
            .get(&task.priority_id)
            .cloned()
            .ok_or_else(|| dangling("priority"))?;
        let owner = users.get(&task.owner_id).cloned().ok_or_else(|| dangling("owner"))?;
        let assigned_users = task
            .assigned_users
            .iter()
            .map(|id| users.get(id).cloned().ok_or_else(|| dangling("assigned user")))
            .collect::<Result<Vec<User>, AppError>>()?;

        Ok(TaskDetail {
            id: task.id,
            name: task.name,
            description: task.description,
            state,
            priority,
            deadline: task.deadline,
            owner,
            assigned_users,
        })
    }
}
