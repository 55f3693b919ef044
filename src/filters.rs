//! Translates task query-string parameters into SQL predicates.
//!
//! Identifiers are resolved against the store first (`state=Backlog` becomes a state
//! id), so an unknown identifier is reported as not found instead of silently
//! matching nothing. The resolved [`TaskFilter`] then renders into a single
//! `QueryBuilder` statement, always ordered by ascending deadline.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::lookup::{self, Lookup};
use crate::models::task::{TASK_GROUP_ORDER, TASK_SELECT};
use crate::models::{Priority, State, Task, User};
use crate::validation::parse_date;

const DATE_FORMAT_HINT: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";

/// How `deadline` is compared when filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeadlineFilter {
    #[default]
    Exact,
    /// Strictly before.
    Before,
    /// Strictly after.
    After,
}

impl DeadlineFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "exact" => Some(DeadlineFilter::Exact),
            "before" => Some(DeadlineFilter::Before),
            "after" => Some(DeadlineFilter::After),
            _ => None,
        }
    }

    fn operator(self) -> &'static str {
        match self {
            DeadlineFilter::Exact => " = ",
            DeadlineFilter::Before => " < ",
            DeadlineFilter::After => " > ",
        }
    }
}

/// The single dimension a dedicated `by_*` endpoint filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    State,
    Priority,
    Deadline,
    Owner,
    AssignedUsers,
}

impl Dimension {
    pub fn param(self) -> &'static str {
        match self {
            Dimension::State => "state",
            Dimension::Priority => "priority",
            Dimension::Deadline => "deadline",
            Dimension::Owner => "owner",
            Dimension::AssignedUsers => "assigned_users",
        }
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Raw query-string parameters accepted by the task endpoints. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub deadline: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub filter: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub deadline_after_or_on: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub deadline_before_or_on: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub assigned_users: Option<String>,
}

impl TaskQuery {
    /// Keeps only the parameters of `dimension`, which must be present.
    pub fn restrict_to(self, dimension: Dimension) -> Result<TaskQuery, AppError> {
        let mut restricted = TaskQuery::default();
        let present = match dimension {
            Dimension::State => {
                restricted.state = self.state;
                restricted.state.is_some()
            }
            Dimension::Priority => {
                restricted.priority = self.priority;
                restricted.priority.is_some()
            }
            Dimension::Deadline => {
                restricted.deadline = self.deadline;
                restricted.filter = self.filter;
                restricted.deadline.is_some()
            }
            Dimension::Owner => {
                restricted.owner = self.owner;
                restricted.owner.is_some()
            }
            Dimension::AssignedUsers => {
                restricted.assigned_users = self.assigned_users;
                restricted.assigned_users.is_some()
            }
        };
        if !present {
            return Err(AppError::field(dimension.param(), "This query parameter is required."));
        }
        Ok(restricted)
    }
}

/// Store predicates with every identifier resolved to an id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub state_id: Option<i32>,
    pub priority_id: Option<i32>,
    pub deadline: Option<(DeadlineFilter, NaiveDate)>,
    pub deadline_after_or_on: Option<NaiveDate>,
    pub deadline_before_or_on: Option<NaiveDate>,
    pub owner_id: Option<i32>,
    pub assigned_user_id: Option<i32>,
}

fn query_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_date(raw)
            .map(Some)
            .ok_or_else(|| AppError::field(field, DATE_FORMAT_HINT)),
    }
}

impl TaskFilter {
    /// Parses the date parameters. Identifier fields are left unresolved.
    fn with_dates(query: &TaskQuery) -> Result<TaskFilter, AppError> {
        let mode = match query.filter.as_deref() {
            None => DeadlineFilter::default(),
            Some(raw) => DeadlineFilter::parse(raw).ok_or_else(|| {
                AppError::field(
                    "filter",
                    format!("\"{}\" is not a valid choice. Use exact, before or after.", raw),
                )
            })?,
        };
        let deadline = query_date("deadline", query.deadline.as_deref())?;

        Ok(TaskFilter {
            deadline: deadline.map(|date| (mode, date)),
            deadline_after_or_on: query_date(
                "deadline_after_or_on",
                query.deadline_after_or_on.as_deref(),
            )?,
            deadline_before_or_on: query_date(
                "deadline_before_or_on",
                query.deadline_before_or_on.as_deref(),
            )?,
            ..TaskFilter::default()
        })
    }

    pub async fn resolve(pool: &PgPool, query: &TaskQuery) -> Result<TaskFilter, AppError> {
        let mut filter = Self::with_dates(query)?;
        if let Some(raw) = &query.state {
            filter.state_id = Some(resolve_lookup::<State>(pool, raw).await?);
        }
        if let Some(raw) = &query.priority {
            filter.priority_id = Some(resolve_lookup::<Priority>(pool, raw).await?);
        }
        if let Some(raw) = &query.owner {
            filter.owner_id = Some(resolve_user(pool, raw).await?.id);
        }
        if let Some(raw) = &query.assigned_users {
            filter.assigned_user_id = Some(resolve_user(pool, raw).await?.id);
        }
        Ok(filter)
    }

    pub fn build_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(TASK_SELECT);
        let mut first = true;
        let mut clause = |builder: &mut QueryBuilder<'static, Postgres>| {
            builder.push(if first { " WHERE " } else { " AND " });
            first = false;
        };

        if let Some(id) = self.state_id {
            clause(&mut builder);
            builder.push("t.state_id = ").push_bind(id);
        }
        if let Some(id) = self.priority_id {
            clause(&mut builder);
            builder.push("t.priority_id = ").push_bind(id);
        }
        if let Some((mode, date)) = self.deadline {
            clause(&mut builder);
            builder.push("t.deadline").push(mode.operator()).push_bind(date);
        }
        if let Some(date) = self.deadline_after_or_on {
            clause(&mut builder);
            builder.push("t.deadline >= ").push_bind(date);
        }
        if let Some(date) = self.deadline_before_or_on {
            clause(&mut builder);
            builder.push("t.deadline <= ").push_bind(date);
        }
        if let Some(id) = self.owner_id {
            clause(&mut builder);
            builder.push("t.owner_id = ").push_bind(id);
        }
        if let Some(id) = self.assigned_user_id {
            clause(&mut builder);
            builder
                .push("EXISTS (SELECT 1 FROM task_assigned_users f WHERE f.task_id = t.id AND f.user_id = ")
                .push_bind(id)
                .push(")");
        }

        builder.push(TASK_GROUP_ORDER);
        builder
    }
}

/// Matches a numeric id first, then a case-insensitive name.
pub async fn resolve_lookup<T: Lookup>(pool: &PgPool, raw: &str) -> Result<i32, AppError> {
    if let Ok(id) = raw.parse::<i32>() {
        if let Some(found) = lookup::find::<T, _>(pool, id).await? {
            return Ok(found.id());
        }
    }
    match lookup::find_by_name::<T, _>(pool, raw).await? {
        Some(found) => Ok(found.id()),
        None => {
            log::debug!("{} filter {:?} did not resolve", T::LABEL, raw);
            Err(AppError::NotFound(format!("{} not found", T::LABEL)))
        }
    }
}

/// Matches a numeric id first, then an exact username.
pub async fn resolve_user(pool: &PgPool, raw: &str) -> Result<User, AppError> {
    if let Ok(id) = raw.parse::<i32>() {
        if let Some(user) = User::find(pool, id).await? {
            return Ok(user);
        }
    }
    User::find_by_username(pool, raw).await?.ok_or_else(|| {
        log::debug!("user filter {:?} did not resolve", raw);
        AppError::NotFound("User not found".into())
    })
}

pub async fn find_tasks(pool: &PgPool, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
    let mut builder = filter.build_query();
    let tasks = builder.build_query_as::<Task>().fetch_all(pool).await?;
    Ok(tasks)
}
