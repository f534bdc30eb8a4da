// Request middleware and extractors

pub mod auth;
pub mod cors;

pub use auth::{token_matches, AdminAccess, AuthenticatedUser};
pub use cors::dynamic_cors_middleware;
