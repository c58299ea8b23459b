//! Database access for vtc-sa
//!
//! Schema lives in `vtc_common::db`. Reads take the pool; writes that may be
//! part of a transaction take a `&mut SqliteConnection`.

pub mod analysis;
pub mod analytics;
pub mod audit;
pub mod sessions;
pub mod tokens;
pub mod usage;
