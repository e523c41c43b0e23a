use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{OpnameId, ProductId, TransactionId};
use stockledger_infra::{MovementReceipt, ProductStockCard};
use stockledger_ledger::{
    MovementMetadata, OpnameStatus, Product, ProductStatus, StockCardRow, StockOpname,
    TransactionKind,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub code: String,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub opening_stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub product_id: String,
    /// `"in"` or `"out"`.
    pub kind: String,
    pub quantity: i64,
    #[serde(default)]
    pub note: String,
    pub responsible: Option<String>,
    /// Business time; defaults to now.
    pub occurred_at: Option<DateTime<Utc>>,
}

impl RecordMovementRequest {
    pub fn metadata(&self) -> MovementMetadata {
        MovementMetadata {
            note: self.note.clone(),
            responsible: self.responsible.clone(),
            occurred_at: self.occurred_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditMovementRequest {
    pub quantity: i64,
    /// Keeps the existing note when absent.
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOpnameRequest {
    pub product_id: String,
    pub count_date: NaiveDate,
    pub physical_stock: i64,
    pub petugas: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub apply_now: bool,
}

#[derive(Debug, Deserialize)]
pub struct StockCardQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    /// Exact product code; the list then holds at most one product.
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpnameListQuery {
    pub product_id: String,
    pub status: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub current_stock: i64,
    pub min_stock: i64,
    pub status: ProductStatus,
    pub below_minimum: bool,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id_typed(),
            code: p.code().to_string(),
            name: p.name().to_string(),
            unit: p.unit().to_string(),
            current_stock: p.current_stock(),
            min_stock: p.min_stock(),
            status: p.status(),
            below_minimum: p.is_below_minimum(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub transaction_id: TransactionId,
    pub new_balance: i64,
}

impl From<MovementReceipt> for MovementResponse {
    fn from(r: MovementReceipt) -> Self {
        Self {
            transaction_id: r.transaction_id,
            new_balance: r.new_balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOpnameResponse {
    pub opname_id: OpnameId,
    pub system_stock: i64,
    pub physical_stock: i64,
    pub difference: i64,
    pub status: OpnameStatus,
    /// Present when the count was reconciled right away.
    pub new_balance: Option<i64>,
}

impl CreateOpnameResponse {
    pub fn new(opname: &StockOpname, new_balance: Option<i64>) -> Self {
        Self {
            opname_id: opname.id,
            system_stock: opname.system_stock,
            physical_stock: opname.physical_stock,
            difference: opname.difference,
            status: opname.status,
            new_balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockCardResponse {
    pub product: ProductView,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub opening_balance: i64,
    pub rows: Vec<StockCardRow>,
    pub total_in: i64,
    pub total_out: i64,
    pub closing_balance: i64,
}

impl From<ProductStockCard> for StockCardResponse {
    fn from(value: ProductStockCard) -> Self {
        let ProductStockCard { product, card } = value;
        Self {
            product: ProductView::from(&product),
            from: card.window.from(),
            to: card.window.to(),
            opening_balance: card.opening_balance,
            rows: card.rows,
            total_in: card.total_in,
            total_out: card.total_out,
            closing_balance: card.closing_balance,
        }
    }
}

// -------------------------
// Path / query parsing
// -------------------------

pub fn parse_product_id(s: &str) -> Result<ProductId, axum::response::Response> {
    s.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"))
}

pub fn parse_transaction_id(s: &str) -> Result<TransactionId, axum::response::Response> {
    s.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid transaction id")
    })
}

pub fn parse_opname_id(s: &str) -> Result<OpnameId, axum::response::Response> {
    s.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid opname id"))
}

/// Movement kinds a caller may record directly. ADJUST rows only come from
/// opname commits.
pub fn parse_movement_kind(s: &str) -> Result<TransactionKind, axum::response::Response> {
    match s.parse::<TransactionKind>() {
        Ok(kind @ (TransactionKind::In | TransactionKind::Out)) => Ok(kind),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_kind",
            "kind must be one of: in, out",
        )),
    }
}

pub fn parse_opname_status(s: &str) -> Result<OpnameStatus, axum::response::Response> {
    s.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: not_adjusted, adjusted",
        )
    })
}
