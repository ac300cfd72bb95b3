//! Response envelope and error types.

pub mod common;
pub mod error;

pub use common::ApiResponse;
pub use error::ErrorResponse;
