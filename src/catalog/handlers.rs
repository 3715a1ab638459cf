use axum::{extract::State, Json};

use crate::catalog::{Catalog, Product};

/// `GET /products`: every product in the catalog.
pub async fn list_products(State(catalog): State<Catalog>) -> Json<Vec<Product>> {
    tracing::debug!(count = catalog.len(), "Listing products");
    Json(catalog.products().to_vec())
}
