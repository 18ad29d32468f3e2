//! MailerLog Common - Shared types and utilities
//!
//! This crate provides configuration, the error taxonomy and the email
//! lifecycle vocabulary shared across all MailerLog components.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{EmailStatus, EventType, StatusTransition, TransitionGuard, TransitionStamp};
