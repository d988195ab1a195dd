//! CLI command implementations.

pub mod profiles;
pub mod usage;
