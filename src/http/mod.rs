//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (from net::listener)
//!     → server.rs (hyper-util auto builder: HTTP/1.1 + HTTP/2)
//!     → request.rs (request ID assigned and echoed)
//!     → injected Router (e.g. catalog::router)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{HttpServer, ServeError};
