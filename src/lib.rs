//! Product listing HTTP server library.

pub mod catalog;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use catalog::{Catalog, Product};
pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{Coordinator, Outcome};
