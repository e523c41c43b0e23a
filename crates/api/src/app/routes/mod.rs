use axum::Router;

pub mod movements;
pub mod opnames;
pub mod products;
pub mod system;

/// Router for every ledger endpoint (`/health` is mounted separately).
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/movements", movements::router())
        .nest("/opnames", opnames::router())
}
