//! Common utilities and types shared across hostanon crates.

pub mod error;
pub mod hash;
pub mod timestamp;
pub mod version;

pub use error::{Error, Result};
pub use timestamp::Timestamp;
pub use version::SchemaVersion;
