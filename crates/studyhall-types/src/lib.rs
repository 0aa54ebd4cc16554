pub mod api;
pub mod error;
pub mod membership;
pub mod models;
pub mod ranking;

pub use error::{ReasonCode, Rejection};
