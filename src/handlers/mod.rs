pub mod auth;
pub mod comments;
pub mod posts;
pub mod upload;
pub mod users;
pub mod votes;

use crate::error::{AppError, Result};

/// Parses a numeric id from form or query input.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}
