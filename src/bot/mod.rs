//! Chat front-end: command parsing, menu state, routing and dispatch.

pub mod auth;
pub mod command;
pub mod dispatch;
pub mod router;
pub mod state;
pub mod transport;

use thiserror::Error;

use crate::repository::DieselError;
use transport::TransportError;

/// Errors surfaced by the chat layer. `Validation` carries user-facing
/// text; everything else is logged and answered generically.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("{0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(#[from] DieselError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("chart rendering failed: {0}")]
    Chart(String),
    #[error("archive handling failed: {0}")]
    Archive(String),
}

pub use auth::{Authorizer, StaticAdminList};
pub use dispatch::{Dispatcher, Incoming};
pub use router::QueryRouter;
pub use state::MenuState;
pub use transport::ChatTransport;
