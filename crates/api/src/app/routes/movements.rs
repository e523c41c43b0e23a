use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_movement))
        .route("/:id", put(edit_movement).delete(delete_movement))
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordMovementRequest>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&body.product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let kind = match dto::parse_movement_kind(&body.kind) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .mutator
        .apply_movement(product_id, kind, body.quantity, body.metadata())
    {
        Ok(receipt) => {
            (StatusCode::CREATED, Json(dto::MovementResponse::from(receipt))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn edit_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::EditMovementRequest>,
) -> axum::response::Response {
    let transaction_id = match dto::parse_transaction_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .mutator
        .edit_movement(transaction_id, body.quantity, body.note)
    {
        Ok(receipt) => (StatusCode::OK, Json(dto::MovementResponse::from(receipt))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let transaction_id = match dto::parse_transaction_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.mutator.delete_movement(transaction_id) {
        Ok(receipt) => (StatusCode::OK, Json(dto::MovementResponse::from(receipt))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
