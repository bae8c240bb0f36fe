//! HTTP endpoint for arbor.
//!
//! Serves the Local bucket's signed URLs: `GET /file?signed=...` streams a
//! stored object, `PUT /file?signed=...` stores one. `/health` answers `OK`.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
