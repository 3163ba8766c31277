//! HTTP request handlers.

pub mod credits;
pub mod feed;
pub mod generate;
pub mod health;
pub mod posts;
pub mod webhooks;
