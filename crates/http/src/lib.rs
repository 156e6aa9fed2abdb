//! Cinema HTTP client
//!
//! Typed access to the cinema booking API with transparent access token
//! refresh for authenticated calls.

pub mod client;
pub mod types;

pub use client::{ApiRequest, CinemaClient, CinemaClientBuilder, ClientConfig, ClientError};
