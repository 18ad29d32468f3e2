//! API request handlers

pub mod emails;
pub mod health;
pub mod mailers;
pub mod webhooks;

pub use health::*;
