//! Cinema core types and utilities

pub mod error;
pub mod session;
#[cfg(feature = "tracing")]
pub mod tracing;
pub mod validation;

pub use error::{CoreError, CoreResult};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
