use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockledger_ledger::NewOpname;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_opname).get(list_opnames))
        .route("/:id", get(get_opname).delete(delete_opname))
        .route("/:id/commit", post(commit_opname))
}

pub async fn create_opname(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateOpnameRequest>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&body.product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let new = NewOpname {
        product_id,
        count_date: body.count_date,
        physical_stock: body.physical_stock,
        petugas: body.petugas,
        note: body.note,
    };

    match services.opnames.create(new, body.apply_now) {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(dto::CreateOpnameResponse::new(&outcome.opname, outcome.new_balance)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_opnames(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::OpnameListQuery>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&query.product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match query.status.as_deref().map(dto::parse_opname_status).transpose() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.opnames.list_by_product(product_id, status) {
        Ok(opnames) => (StatusCode::OK, Json(opnames)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_opname(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let opname_id = match dto::parse_opname_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.opnames.get(opname_id) {
        Ok(opname) => (StatusCode::OK, Json(opname)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn commit_opname(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let opname_id = match dto::parse_opname_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.opnames.commit(opname_id) {
        Ok(receipt) => (StatusCode::OK, Json(dto::MovementResponse::from(receipt))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_opname(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let opname_id = match dto::parse_opname_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.opnames.delete(opname_id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
