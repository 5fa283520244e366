//! HTTP 处理器模块

pub mod analyze;
pub mod health;
pub mod index;
pub mod repo;
pub mod resolve;
pub mod webhook;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

/// JSON body parser that treats an empty body as `{}` and reports bad
/// JSON as a 400 in the service's error format.
pub(crate) fn parse_json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("Invalid JSON body: {}", e)))
}
