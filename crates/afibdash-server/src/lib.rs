//! AFib Dashboard HTTP API.
//!
//! Anonymous survey votes, community-contributed elements, clinical picture
//! shares and the AI digest, served as JSON under `/api`.

pub mod cache;
pub mod captcha;
pub mod client_ip;
pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
