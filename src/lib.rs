#![doc = "The `workstream` library crate."]
#![doc = ""]
#![doc = "Domain models, authorization policies, token authentication, the task filter"]
#![doc = "layer, routing configuration and error handling for the WorkStream API."]
#![doc = "The binary (`main.rs`) wires these into an `HttpServer`."]

pub mod auth;
pub mod config;
pub mod error;
pub mod filters;
pub mod models;
pub mod routes;
pub mod validation;

pub use crate::error::AppError;
