use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_core::LedgerError;

/// Map a ledger error to a JSON response.
///
/// Domain rejections are returned verbatim; storage failures are logged and
/// reported generically.
pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = match &err {
        LedgerError::InvalidQuantity(_) | LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::InsufficientStock { .. }
        | LedgerError::WouldUnderflow { .. }
        | LedgerError::AlreadyAdjusted
        | LedgerError::CannotDeleteAdjusted => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::ConcurrentModification(_) => StatusCode::CONFLICT,
        LedgerError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            return json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                err.code(),
                "storage is temporarily unavailable",
            );
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
