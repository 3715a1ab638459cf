//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator (coordinator.rs):
//!     spawn HttpServer::run → race(runner exit, termination signal)
//!
//! Shutdown (shutdown.rs):
//!     Serving → Draining (stop accept, drain connections) → Closed
//!     deadline missed → force close
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → single-slot channel → Coordinator
//! ```
//!
//! # Design Decisions
//! - Single-shot: nothing is retried or restarted
//! - Shutdown has a deadline: forced close after it
//! - Outcomes are distinct so the exit code tells them apart

pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use coordinator::{Coordinator, Outcome, RunnerExit};
pub use shutdown::{CloseError, DrainError, ListenerState, Phase, ServerHandle, ServerStatus, ShutdownWatch};
pub use signals::TerminationSignal;
