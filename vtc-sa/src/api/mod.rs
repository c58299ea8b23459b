//! HTTP API handlers for vtc-sa

pub mod analysis;
pub mod auth;
pub mod health;
pub mod sessions;
pub mod validation;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use sessions::session_routes;
