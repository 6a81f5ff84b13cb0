//! Storage client abstraction and the Backblaze B2 implementation.

pub mod b2;
pub mod client;
