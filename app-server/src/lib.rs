//! # SupplyMind App Server
//!
//! Request contracts, validation, sessions and the JSON-lines transport in
//! front of the grounded retrieval services.
//!
//! ```text
//! stdin ──► server::serve ──► CopilotHandler::dispatch ──► CopilotServices
//!                                   │
//!                                   ├── validation (FieldError)
//!                                   └── SessionStore
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod session;
pub mod validation;

pub use error::{ApiError, ErrorBody};
pub use handler::CopilotHandler;
pub use protocol::{Method, Request, Response};
pub use server::{handle_line, serve};
pub use session::{Role, SessionMessage, SessionStore};
pub use validation::FieldError;
