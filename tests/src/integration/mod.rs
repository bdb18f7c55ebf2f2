//! Cross-crate integration tests.

pub mod delivery;
pub mod pipeline;
