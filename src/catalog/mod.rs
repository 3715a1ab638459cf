//! Product catalog served over HTTP.
//!
//! The catalog is plain request-handling code: it produces an
//! [`axum::Router`] that the HTTP server runs, and knows nothing about the
//! listener or the shutdown lifecycle.

pub mod handlers;
pub mod product;

use std::sync::Arc;

use axum::{routing::get, Router};

pub use product::Product;

/// Immutable, cheaply clonable product list.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Arc<[Product]>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: products.into(),
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Build the listing router for `catalog`.
pub fn router(catalog: Catalog) -> Router {
    Router::new()
        .route("/products", get(handlers::list_products))
        .with_state(catalog)
}
