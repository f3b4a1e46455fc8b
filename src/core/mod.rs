//! Core error types shared across the engine.

pub mod error;

pub use error::{user_friendly_error, ErrorContext, StencilError};
