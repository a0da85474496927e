pub mod capabilities;
pub mod completed;
pub mod error;
pub mod files;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod ws;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
