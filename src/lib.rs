//! SSH bastion library
//!
//! This module exposes the core functionality for use in integration tests
//! and the main binary.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod security_log;
pub mod ssh;
pub mod validation;
