//! HTTP handlers, one module per resource. Handlers translate between the wire
//! format and the repository, and every failure leaves as an `ApiError`.

pub mod account;
pub mod admin;
pub mod kanban;
pub mod uploads;
pub mod wiki;

use uuid::Uuid;

use crate::error::ApiError;

/// Parses a path identifier, reporting malformed ids as a validation failure.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::validation("invalid id"))
}
