pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod links;
pub mod middleware;
pub mod rate_limiter;
pub mod response;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;
pub mod token_bucket;

pub use config::Config;
pub use error::{Result, ServiceError};
pub use response::{ApiResponse, PaginatedResult};
pub use server::create_app;
