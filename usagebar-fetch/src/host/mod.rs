//! Host APIs used by providers.
//!
//! - [`keychain`] - Platform secret store
//! - [`http`] - HTTP client with tracing and domain allowlist
//! - [`browser`] - Browser cookie import and decryption

pub mod browser;
pub mod http;
pub mod keychain;

pub use browser::{
    Browser, BrowserCookieImporter, BrowserProfile, CookieJar, DecryptedCookie, ProfileStatus,
};
pub use http::HttpClient;
pub use keychain::{MemorySecretStore, SecretStore, SystemSecretStore};
