//! HTTP route handlers.

pub mod estates;
pub mod health;
pub mod merchants;
pub mod metrics;
pub mod streams;
