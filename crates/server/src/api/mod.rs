pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod servers;

pub use error::ApiError;
pub use routes::create_router;
