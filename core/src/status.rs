//! Status-code classification shared by every operation.
//!
//! Each operation declares a small table of the statuses it understands.
//! `classify` resolves a response against that table; anything not listed is
//! `ApiError::UnexpectedStatus`.

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::types::ErrorPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The documented success status; the body (if any) is the payload.
    Success,
    /// The resource does not exist and that is a valid answer.
    Absent,
    Validation,
    NotFound,
    Conflict,
}

pub type StatusTable = &'static [(u16, Outcome)];

pub const CREATE: StatusTable = &[(201, Outcome::Success), (400, Outcome::Validation)];

pub const FETCH: StatusTable = &[
    (200, Outcome::Success),
    (404, Outcome::Absent),
    (400, Outcome::Validation),
];

pub const DELETE: StatusTable = &[
    (204, Outcome::Success),
    (404, Outcome::NotFound),
    (409, Outcome::Conflict),
    (400, Outcome::Validation),
];

/// Resolve `response` against `table`. Only `Success` and `Absent` come back
/// as `Ok`; every other outcome is turned into its error.
pub fn classify(table: StatusTable, response: &HttpResponse) -> Result<Outcome, ApiError> {
    let outcome = table
        .iter()
        .find(|(status, _)| *status == response.status)
        .map(|(_, outcome)| *outcome);

    match outcome {
        Some(outcome @ (Outcome::Success | Outcome::Absent)) => Ok(outcome),
        Some(Outcome::Validation) => {
            let payload: ErrorPayload =
                serde_json::from_slice(&response.body).map_err(ApiError::Deserialization)?;
            Err(ApiError::Validation {
                code: payload.error_code,
                message: payload.error_message,
            })
        }
        Some(Outcome::NotFound) => Err(ApiError::NotFound),
        Some(Outcome::Conflict) => Err(ApiError::Conflict),
        None => Err(ApiError::UnexpectedStatus {
            status: response.status,
            body: response.text().into_owned(),
        }),
    }
}
