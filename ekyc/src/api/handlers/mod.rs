//! HTTP request handlers.
//!
//! - [`health`]: liveness endpoint returning the welcome message
//! - [`compare`]: two-image upload and face comparison
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Result`]; errors are logged and turned into a status code with
//! the error string as a JSON body by [`crate::errors::Error`]'s `IntoResponse` implementation.

pub mod compare;
pub mod health;
