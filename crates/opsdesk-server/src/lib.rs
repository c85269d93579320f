//! opsdesk HTTP layer.
//!
//! Thin axum surface over the record services: session middleware resolves
//! the cookie to a [`CurrentUser`](opsdesk_core::CurrentUser), the gate is
//! consulted at the top of every handler, and the handlers only shuttle
//! between form input, the services and minimal HTML. Styling and page
//! chrome are deliberately out of scope.

pub mod config;
pub mod error;
pub mod html;
pub mod routes;
pub mod session_mw;
pub mod state;
pub mod uploads;

pub use config::ServerConfig;
pub use error::AppError;
pub use routes::app;
pub use state::AppState;
