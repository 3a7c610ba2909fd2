//! Token payloads and the wrappers handed back to callers.

pub mod claims;
pub mod pair;
pub mod secret;
