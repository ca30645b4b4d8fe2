//! # FieldGuard Shared
//!
//! Wire types shared between the API and its front ends.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
