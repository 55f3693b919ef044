pub mod comment;
pub mod lookup;
pub mod task;
pub mod user;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{AppError, FieldErrors};

pub use comment::{Comment, CommentInput, CommentPatch};
pub use lookup::{Lookup, LookupInput, Priority, State};
pub use task::{Task, TaskDetail, TaskInput, TaskPatch, TaskWrite};
pub use user::{NewUser, User, UserChanges, UserInput, UserUpdate};

/// A create payload: a single object or a list of objects.
///
/// The response mirrors the request shape.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T: DeserializeOwned> OneOrMany<T> {
    /// Decodes a create payload. Items that cannot be decoded are reported in the
    /// same shapes as validation failures: a plain map for a single object, a list
    /// of per-item maps for a list.
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        let values = match value {
            Value::Array(values) => values,
            value => {
                return decode_object(value)
                    .map(OneOrMany::One)
                    .map_err(AppError::ValidationError)
            }
        };

        let mut items = Vec::with_capacity(values.len());
        let mut errors = Vec::with_capacity(values.len());
        let mut failed = false;
        for value in values {
            match decode_object(value) {
                Ok(item) => {
                    items.push(item);
                    errors.push(FieldErrors::new());
                }
                Err(fields) => {
                    failed = true;
                    errors.push(fields);
                }
            }
        }
        if failed {
            Err(AppError::BatchValidationError(errors))
        } else {
            Ok(OneOrMany::Many(items))
        }
    }
}

impl<T> OneOrMany<T> {
    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }

    /// Rebuilds the request shape around `items`.
    pub fn from_items(many: bool, mut items: Vec<T>) -> Self {
        if many || items.len() != 1 {
            OneOrMany::Many(items)
        } else {
            OneOrMany::One(items.remove(0))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn decode_object<T: DeserializeOwned>(value: Value) -> Result<T, FieldErrors> {
    let reason = if value.is_object() {
        match serde_json::from_value(value) {
            Ok(item) => return Ok(item),
            Err(e) => format!("Invalid data: {}.", e),
        }
    } else {
        format!("Invalid data. Expected a dictionary, but got {}.", json_kind(&value))
    };
    let mut errors = FieldErrors::new();
    errors.insert("non_field_errors".into(), vec![reason]);
    Err(errors)
}

/// Decodes a single-object write payload (`PUT`, `PATCH`, register, login).
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    decode_object(value).map_err(AppError::ValidationError)
}

/// Unwraps a field that validation has already required.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::field(field, "This field is required."))
}

/// Validates every item of a batch before anything is written.
///
/// Field errors are collected per item; when a single payload object was sent the
/// plain field map is returned instead of a one-element list.
pub fn check_all<T, O>(
    many: bool,
    items: Vec<T>,
    mut check: impl FnMut(T) -> Result<O, AppError>,
) -> Result<Vec<O>, AppError> {
    let mut accepted = Vec::with_capacity(items.len());
    let mut errors: Vec<FieldErrors> = Vec::with_capacity(items.len());
    let mut failed = false;

    for item in items {
        match check(item) {
            Ok(value) => {
                accepted.push(value);
                errors.push(FieldErrors::new());
            }
            Err(AppError::ValidationError(fields)) => {
                failed = true;
                errors.push(fields);
            }
            Err(other) => return Err(other),
        }
    }

    if !failed {
        return Ok(accepted);
    }
    if many {
        Err(AppError::BatchValidationError(errors))
    } else {
        Err(AppError::ValidationError(errors.pop().unwrap_or_default()))
    }
}

/// Merges field maps, keeping every reason.
pub fn merge_errors(into: &mut FieldErrors, other: FieldErrors) {
    for (field, reasons) in other {
        into.entry(field).or_default().extend(reasons);
    }
}
