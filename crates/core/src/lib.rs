//! Domain types shared by every snapdoc crate.
//!
//! Kept free of internal dependencies: the capture record, its status,
//! the push message schema, source validation and the common error type.

pub mod document;
pub mod error;
pub mod messages;
pub mod source;
pub mod types;
