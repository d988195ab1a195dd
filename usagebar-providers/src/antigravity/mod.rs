//! Antigravity provider implementation.
//!
//! Antigravity caches the language server's user status in its local state
//! database. The quotas are read from that cache without contacting the
//! running editor.

mod cache;
mod error;
mod provider;

pub use cache::{
    AntigravityConfig, AntigravitySnapshot, STATE_DB_ENV, parse_auth_status, parse_user_status,
    read_state_db,
};
pub use error::AntigravityError;
pub use provider::{AntigravityProvider, snapshot_to_result};
