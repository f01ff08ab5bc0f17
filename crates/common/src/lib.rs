//! Shared types for the Xero demo workspace: secret handling and the
//! configuration error used while loading service settings.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
