use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockledger_ledger::NewProduct;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/stock-card", get(stock_card))
        .route("/:id/balance-check", get(balance_check))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let new = NewProduct {
        code: body.code,
        name: body.name,
        unit: body.unit,
        min_stock: body.min_stock,
        opening_stock: body.opening_stock,
    };

    match services.mutator.register_product(new) {
        Ok(product) => (StatusCode::CREATED, Json(dto::ProductView::from(&product))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ProductListQuery>,
) -> axum::response::Response {
    let products = match query.code.as_deref() {
        Some(code) => services
            .cards
            .find_product_by_code(code)
            .map(|found| found.into_iter().collect::<Vec<_>>()),
        None => services.cards.list_products(),
    };

    match products {
        Ok(products) => {
            let views: Vec<dto::ProductView> = products.iter().map(dto::ProductView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.cards.get_product(product_id) {
        Ok(product) => (StatusCode::OK, Json(dto::ProductView::from(&product))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn stock_card(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::StockCardQuery>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.cards.stock_card(product_id, query.from, query.to) {
        Ok(card) => (StatusCode::OK, Json(dto::StockCardResponse::from(card))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn balance_check(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.cards.verify_balance(product_id) {
        Ok(check) => (StatusCode::OK, Json(check)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
