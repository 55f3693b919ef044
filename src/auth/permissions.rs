//! Authorization policies.
//!
//! Each policy is a pure function of the request method, the actor and (for object
//! policies) the target entity. Safe methods are always allowed. Handlers call the
//! object policies only after the target has been loaded, so a missing entity is
//! reported as not found before any permission question is asked.

use actix_web::http::Method;

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::{Comment, Task};

/// Why a policy refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    /// A write was attempted by an anonymous actor.
    Unauthenticated,
    /// The actor is known but has no rights on the target.
    Forbidden(&'static str),
}

impl From<Denied> for AppError {
    fn from(denied: Denied) -> AppError {
        match denied {
            Denied::Unauthenticated => {
                AppError::Unauthorized("Authentication credentials were not provided.".into())
            }
            Denied::Forbidden(reason) => AppError::Forbidden(reason.into()),
        }
    }
}

const NOT_OWNER_OR_ASSIGNED: &str = "Only the task owner or an assigned user can modify this task.";
const NOT_AUTHOR: &str = "Only the author of this comment can modify it.";

/// GET, HEAD and OPTIONS.
pub fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

fn require_user(actor: &Actor) -> Result<i32, Denied> {
    actor.user_id().ok_or(Denied::Unauthenticated)
}

/// Reads are public; writes need an authenticated actor.
pub fn read_only_or_authenticated(method: &Method, actor: &Actor) -> Result<(), Denied> {
    if is_safe_method(method) {
        return Ok(());
    }
    require_user(actor).map(|_| ())
}

/// Writes are limited to the task owner and its assigned users.
pub fn owner_or_assigned_only(method: &Method, actor: &Actor, task: &Task) -> Result<(), Denied> {
    if is_safe_method(method) {
        return Ok(());
    }
    let user_id = require_user(actor)?;
    if task.is_owned_or_assigned_to(user_id) {
        Ok(())
    } else {
        log::debug!("user {} denied {} on task {}", user_id, method, task.id);
        Err(Denied::Forbidden(NOT_OWNER_OR_ASSIGNED))
    }
}

/// Writes are limited to the comment author. Users assigned to the commented task
/// get no extra rights.
pub fn comment_author_only(method: &Method, actor: &Actor, comment: &Comment) -> Result<(), Denied> {
    if is_safe_method(method) {
        return Ok(());
    }
    let user_id = require_user(actor)?;
    if comment.user_id == user_id {
        Ok(())
    } else {
        log::debug!("user {} denied {} on comment {}", user_id, method, comment.id);
        Err(Denied::Forbidden(NOT_AUTHOR))
    }
}
