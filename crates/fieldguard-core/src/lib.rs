//! # FieldGuard Core
//!
//! The domain layer of the abuse-rate limiter.
//! Policies, keys, decisions and the ports that infrastructure implements.
//! This crate has zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::PolicyError;
