//! Browser cookie import for session-authenticated endpoints.
//!
//! ## Supported Browsers
//!
//! - **Firefox**: SQLite, no encryption
//! - **Chromium family** (Chrome, Brave, Arc, Edge, Vivaldi, Opera,
//!   Chromium): SQLite, values encrypted with AES-128-CBC under a key
//!   derived from the browser's "Safe Storage" secret
//!
//! Every profile directory (`Default`, `Profile *`) is considered. The live
//! database is locked by a running browser, so it is copied to a temp file
//! before it is opened.
//!
//! ## Security Note
//!
//! Cookie data is sensitive. Only rows for the requested domain are read and
//! values are never logged.

use std::collections::HashMap;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::error::BrowserError;
use crate::host::keychain::SecretStore;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Salt used by Chromium's key derivation.
const PBKDF2_SALT: &[u8] = b"saltysalt";

/// PBKDF2 rounds on macOS.
pub const MACOS_ITERATIONS: u32 = 1003;

/// PBKDF2 rounds on Linux.
pub const LINUX_ITERATIONS: u32 = 1;

/// Fixed password Chromium uses for `v10` values on Linux.
const LINUX_V10_PASSWORD: &str = "peanuts";

/// Chromium's all-space IV.
const IV: [u8; 16] = [b' '; 16];

/// Newer Chromium builds prepend a 32-byte domain hash to the plaintext.
const DOMAIN_HASH_LEN: usize = 32;

/// Cookie whose value marks a logged-in session.
const LOGGED_IN_COOKIE: &str = "logged_in";

/// Cookie carrying the logged-in user's login.
const LOGIN_COOKIE: &str = "dotcom_user";

// ============================================================================
// Browser Enum
// ============================================================================

/// Supported browsers for cookie import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    /// Google Chrome.
    Chrome,
    /// Brave.
    Brave,
    /// Arc.
    Arc,
    /// Microsoft Edge.
    Edge,
    /// Vivaldi.
    Vivaldi,
    /// Opera.
    Opera,
    /// Chromium.
    Chromium,
    /// Mozilla Firefox.
    Firefox,
}

impl Browser {
    /// Returns the display name for this browser.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Chrome => "Chrome",
            Self::Brave => "Brave",
            Self::Arc => "Arc",
            Self::Edge => "Edge",
            Self::Vivaldi => "Vivaldi",
            Self::Opera => "Opera",
            Self::Chromium => "Chromium",
            Self::Firefox => "Firefox",
        }
    }

    /// Returns all browser variants.
    pub fn all() -> &'static [Browser] {
        &[
            Self::Chrome,
            Self::Brave,
            Self::Arc,
            Self::Edge,
            Self::Vivaldi,
            Self::Opera,
            Self::Chromium,
            Self::Firefox,
        ]
    }

    /// Secret store (service, account) holding the Safe Storage password.
    pub fn safe_storage_entry(&self) -> Option<(&'static str, &'static str)> {
        let entry = match self {
            Self::Chrome => ("Chrome Safe Storage", "Chrome"),
            Self::Brave => ("Brave Safe Storage", "Brave"),
            Self::Arc => ("Arc Safe Storage", "Arc"),
            Self::Edge => ("Microsoft Edge Safe Storage", "Microsoft Edge"),
            Self::Vivaldi => ("Vivaldi Safe Storage", "Vivaldi"),
            Self::Opera => ("Opera Safe Storage", "Opera"),
            Self::Chromium => ("Chromium Safe Storage", "Chromium"),
            Self::Firefox => return None,
        };
        Some(entry)
    }

    /// Root directory holding this browser's profiles on macOS.
    #[cfg(target_os = "macos")]
    pub fn profiles_root(&self, home: &Path) -> Option<PathBuf> {
        let support = home.join("Library/Application Support");
        let path = match self {
            Self::Chrome => support.join("Google/Chrome"),
            Self::Brave => support.join("BraveSoftware/Brave-Browser"),
            Self::Arc => support.join("Arc/User Data"),
            Self::Edge => support.join("Microsoft Edge"),
            Self::Vivaldi => support.join("Vivaldi"),
            Self::Opera => support.join("com.operasoftware.Opera"),
            Self::Chromium => support.join("Chromium"),
            Self::Firefox => support.join("Firefox/Profiles"),
        };
        Some(path)
    }

    /// Root directory holding this browser's profiles on Linux.
    #[cfg(target_os = "linux")]
    pub fn profiles_root(&self, home: &Path) -> Option<PathBuf> {
        let config = home.join(".config");
        let path = match self {
            Self::Chrome => config.join("google-chrome"),
            Self::Brave => config.join("BraveSoftware/Brave-Browser"),
            Self::Arc => return None,
            Self::Edge => config.join("microsoft-edge"),
            Self::Vivaldi => config.join("vivaldi"),
            Self::Opera => config.join("opera"),
            Self::Chromium => config.join("chromium"),
            Self::Firefox => home.join(".mozilla/firefox"),
        };
        Some(path)
    }

    /// No cookie stores are known on other platforms.
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    pub fn profiles_root(&self, _home: &Path) -> Option<PathBuf> {
        None
    }

    /// PBKDF2 rounds for this platform.
    pub fn key_iterations() -> u32 {
        if cfg!(target_os = "linux") {
            LINUX_ITERATIONS
        } else {
            MACOS_ITERATIONS
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// One browser profile with a cookie database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserProfile {
    /// Owning browser.
    pub browser: Browser,
    /// Profile directory.
    pub path: PathBuf,
    /// Human-readable name, e.g. "Chrome - Work".
    pub display_name: String,
}

impl BrowserProfile {
    /// Path of the cookie database inside the profile.
    ///
    /// Recent Chromium builds keep it under `Network/`.
    pub fn cookie_db_path(&self) -> PathBuf {
        if self.browser == Browser::Firefox {
            return self.path.join("cookies.sqlite");
        }
        let network = self.path.join("Network/Cookies");
        if network.exists() {
            network
        } else {
            self.path.join("Cookies")
        }
    }
}

fn is_chromium_profile_dir(name: &str) -> bool {
    name == "Default" || name.starts_with("Profile ")
}

fn chromium_profile_name(dir: &Path, fallback: &str) -> String {
    let Ok(raw) = fs::read_to_string(dir.join("Preferences")) else {
        return fallback.to_string();
    };
    serde_json::from_str::<serde_json::Value>(&raw)
        .ok()
        .and_then(|prefs| {
            prefs
                .get("profile")?
                .get("name")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Lists every profile of `browser` under `root` that has a cookie database.
pub fn discover_profiles(browser: Browser, root: &Path) -> Vec<BrowserProfile> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };

    let mut profiles: Vec<BrowserProfile> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();
            let label = if browser == Browser::Firefox {
                // "xxxxxxxx.default-release" -> "default-release"
                dir_name
                    .split_once('.')
                    .map_or(dir_name.clone(), |(_, rest)| rest.to_string())
            } else if is_chromium_profile_dir(&dir_name) {
                chromium_profile_name(&path, &dir_name)
            } else {
                return None;
            };

            let profile = BrowserProfile {
                browser,
                path,
                display_name: format!("{} - {label}", browser.display_name()),
            };
            profile.cookie_db_path().exists().then_some(profile)
        })
        .collect();

    profiles.sort_by(|a, b| a.path.cmp(&b.path));
    profiles
}

// ============================================================================
// Cookie Jar
// ============================================================================

/// A decrypted cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedCookie {
    /// Cookie name.
    pub name: String,
    /// Plaintext value.
    pub value: String,
}

/// The cookies read from one profile for one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<DecryptedCookie>,
}

impl CookieJar {
    /// Builds a jar. Later duplicates of a name replace earlier ones.
    pub fn new(cookies: Vec<DecryptedCookie>) -> Self {
        let mut jar = Self::default();
        for cookie in cookies {
            if let Some(existing) = jar.cookies.iter_mut().find(|c| c.name == cookie.name) {
                existing.value = cookie.value;
            } else {
                jar.cookies.push(cookie);
            }
        }
        jar
    }

    /// Returns the value of a cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Number of cookies.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// True when the jar holds no cookies.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Whether the jar carries the `logged_in=yes` marker.
    pub fn is_logged_in(&self) -> bool {
        self.get(LOGGED_IN_COOKIE) == Some("yes")
    }

    /// Login recorded in the session, if any.
    pub fn login(&self) -> Option<&str> {
        self.get(LOGIN_COOKIE).filter(|v| !v.is_empty())
    }

    /// Renders the jar as a `Cookie` header value.
    pub fn header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Summary of one profile for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStatus {
    /// The profile.
    pub profile: BrowserProfile,
    /// Number of cookies read for the domain.
    pub cookie_count: usize,
    /// Whether the jar is logged in.
    pub logged_in: bool,
    /// Login from the session cookie.
    pub login: Option<String>,
}

// ============================================================================
// Decryption
// ============================================================================

/// Derives the AES-128 key from a Safe Storage password.
pub fn derive_key(password: &str, iterations: u32) -> [u8; 16] {
    let mut key = [0u8; 16];
    let rounds = NonZeroU32::new(iterations).unwrap_or(NonZeroU32::MIN);
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA1,
        rounds,
        PBKDF2_SALT,
        password.as_bytes(),
        &mut key,
    );
    key
}

fn has_version_prefix(value: &[u8]) -> bool {
    value.starts_with(b"v10") || value.starts_with(b"v11")
}

/// Strips PKCS#7 padding. A malformed pad means the key was wrong.
fn strip_pkcs7(plain: &mut Vec<u8>) -> Result<(), BrowserError> {
    let pad = plain.last().copied().map_or(0, usize::from);
    let valid = (1..=16).contains(&pad)
        && pad <= plain.len()
        && plain[plain.len() - pad..].iter().all(|&b| usize::from(b) == pad);
    if !valid {
        return Err(BrowserError::DecryptionFailed("invalid padding".to_string()));
    }
    plain.truncate(plain.len() - pad);
    Ok(())
}

/// Decodes UTF-8, falling back to the first non-empty suffix that decodes.
fn decode_lenient(bytes: &[u8]) -> Option<String> {
    (0..bytes.len())
        .find_map(|start| std::str::from_utf8(&bytes[start..]).ok())
        .map(str::to_string)
}

/// Decrypts one stored cookie value.
///
/// Values without a `v10`/`v11` prefix are stored in clear and returned as
/// UTF-8.
///
/// # Errors
///
/// Returns [`BrowserError::DecryptionFailed`] if the ciphertext is not a
/// whole number of blocks.
pub fn decrypt_cookie_value(encrypted: &[u8], key: &[u8; 16]) -> Result<String, BrowserError> {
    if !has_version_prefix(encrypted) {
        return decode_lenient(encrypted)
            .ok_or_else(|| BrowserError::DecryptionFailed("not UTF-8".to_string()));
    }

    let ciphertext = &encrypted[3..];
    let decryptor = Aes128CbcDec::new_from_slices(key, &IV)
        .map_err(|e| BrowserError::DecryptionFailed(e.to_string()))?;
    let mut plain = decryptor
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|e| BrowserError::DecryptionFailed(e.to_string()))?;

    strip_pkcs7(&mut plain)?;
    if plain.len() > DOMAIN_HASH_LEN {
        plain.drain(..DOMAIN_HASH_LEN);
    }

    decode_lenient(&plain)
        .ok_or_else(|| BrowserError::DecryptionFailed("no UTF-8 text".to_string()))
}

// ============================================================================
// Browser Cookie Importer
// ============================================================================

/// Reads and decrypts browser cookies.
///
/// All methods block (filesystem, SQLite, secret store).
pub struct BrowserCookieImporter {
    secrets: Arc<dyn SecretStore>,
    home: Option<PathBuf>,
}

impl std::fmt::Debug for BrowserCookieImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserCookieImporter")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

impl BrowserCookieImporter {
    /// Creates an importer rooted at the user's home directory.
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            secrets,
            home: dirs::home_dir(),
        }
    }

    /// Creates an importer rooted at `home`.
    pub fn with_home(secrets: Arc<dyn SecretStore>, home: impl Into<PathBuf>) -> Self {
        Self {
            secrets,
            home: Some(home.into()),
        }
    }

    /// Every profile of every installed browser.
    pub fn profiles(&self) -> Vec<BrowserProfile> {
        let Some(home) = &self.home else {
            return Vec::new();
        };
        Browser::all()
            .iter()
            .filter_map(|browser| browser.profiles_root(home).map(|root| (*browser, root)))
            .flat_map(|(browser, root)| discover_profiles(browser, &root))
            .collect()
    }

    /// Reads the cookies of one profile that belong to `domain`.
    ///
    /// Cookies that fail to decrypt are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be copied or queried.
    #[instrument(skip(self, profile), fields(profile = %profile.display_name))]
    pub fn read_profile(
        &self,
        profile: &BrowserProfile,
        domain: &str,
    ) -> Result<CookieJar, BrowserError> {
        let db_path = profile.cookie_db_path();
        let temp = copy_to_temp(&db_path)?;
        let conn = Connection::open_with_flags(temp.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let pattern = format!("%{domain}%");

        let cookies = if profile.browser == Browser::Firefox {
            read_firefox_rows(&conn, &pattern)?
        } else {
            let rows = read_chromium_rows(&conn, &pattern)?;
            let keys = self.keys_for(profile.browser);
            decrypt_rows(rows, &keys)
        };

        debug!(count = cookies.len(), "Cookies read");
        Ok(CookieJar::new(cookies))
    }

    /// First logged-in jar for `domain` across all profiles.
    ///
    /// Returns `Ok(None)` when no browser holds a valid session.
    ///
    /// # Errors
    ///
    /// Never fails on a single broken profile; those are logged and skipped.
    #[instrument(skip(self))]
    pub fn find_session(
        &self,
        domain: &str,
    ) -> Result<Option<(BrowserProfile, CookieJar)>, BrowserError> {
        let profiles = self.profiles();
        if profiles.is_empty() {
            debug!("No browser profiles found");
            return Ok(None);
        }

        for profile in profiles {
            match self.read_profile(&profile, domain) {
                Ok(jar) if jar.is_logged_in() => {
                    debug!(profile = %profile.display_name, "Found logged-in session");
                    return Ok(Some((profile, jar)));
                }
                Ok(_) => trace!(profile = %profile.display_name, "Profile not logged in"),
                Err(e) => {
                    warn!(
                        profile = %profile.display_name,
                        error = %e,
                        "Skipping unreadable profile"
                    );
                }
            }
        }
        Ok(None)
    }

    /// Lists every profile with its session state for `domain`.
    pub fn list_profiles(&self, domain: &str) -> Vec<ProfileStatus> {
        self.profiles()
            .into_iter()
            .map(|profile| {
                let jar = self.read_profile(&profile, domain).unwrap_or_default();
                ProfileStatus {
                    cookie_count: jar.len(),
                    logged_in: jar.is_logged_in(),
                    login: jar.login().map(str::to_string),
                    profile,
                }
            })
            .collect()
    }

    fn safe_storage_password(&self, browser: Browser) -> Option<String> {
        let (service, account) = browser.safe_storage_entry()?;
        match self.secrets.get(service, account) {
            Ok(Some(password)) => Some(password),
            Ok(None) => {
                debug!(service, "No Safe Storage entry");
                None
            }
            Err(e) => {
                warn!(service, error = %e, "Safe Storage lookup failed");
                None
            }
        }
    }

    /// On Linux `v10` values use a fixed password and `v11` values the
    /// keyring secret; on macOS both use the keyring secret.
    fn keys_for(&self, browser: Browser) -> CookieKeys {
        if browser.safe_storage_entry().is_none() {
            return CookieKeys::default();
        }
        let iterations = Browser::key_iterations();
        let secret = self
            .safe_storage_password(browser)
            .map(|password| derive_key(&password, iterations));
        if cfg!(target_os = "linux") {
            CookieKeys {
                v10: Some(derive_key(LINUX_V10_PASSWORD, iterations)),
                v11: secret,
            }
        } else {
            CookieKeys {
                v10: secret,
                v11: secret,
            }
        }
    }
}

// ============================================================================
// SQLite Helpers
// ============================================================================

/// Raw Chromium row: name, plaintext value, encrypted value.
type ChromiumRow = (String, String, Vec<u8>);

/// Derived keys per value version.
#[derive(Debug, Clone, Copy, Default)]
struct CookieKeys {
    v10: Option<[u8; 16]>,
    v11: Option<[u8; 16]>,
}

impl CookieKeys {
    fn for_value(&self, encrypted: &[u8]) -> Option<&[u8; 16]> {
        if encrypted.starts_with(b"v11") {
            self.v11.as_ref()
        } else {
            self.v10.as_ref()
        }
    }
}

fn copy_to_temp(source: &Path) -> Result<tempfile::NamedTempFile, BrowserError> {
    let temp = tempfile::Builder::new()
        .prefix("usagebar_cookies")
        .suffix(".sqlite")
        .tempfile()?;
    fs::copy(source, temp.path())
        .map_err(|e| BrowserError::ReadFailed(format!("Failed to copy database: {e}")))?;
    Ok(temp)
}

fn read_firefox_rows(
    conn: &Connection,
    pattern: &str,
) -> Result<Vec<DecryptedCookie>, BrowserError> {
    let mut stmt = conn.prepare("SELECT name, value FROM moz_cookies WHERE host LIKE ?1")?;
    let cookies = stmt
        .query_map([pattern], |row| {
            Ok(DecryptedCookie {
                name: row.get(0)?,
                value: row.get(1)?,
            })
        })?
        .filter_map(Result::ok)
        .collect();
    Ok(cookies)
}

fn read_chromium_rows(conn: &Connection, pattern: &str) -> Result<Vec<ChromiumRow>, BrowserError> {
    let mut stmt =
        conn.prepare("SELECT name, value, encrypted_value FROM cookies WHERE host_key LIKE ?1")?;
    let rows = stmt
        .query_map([pattern], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, Option<Vec<u8>>>(2)?.unwrap_or_default(),
            ))
        })?
        .filter_map(Result::ok)
        .collect();
    Ok(rows)
}

fn decrypt_rows(rows: Vec<ChromiumRow>, keys: &CookieKeys) -> Vec<DecryptedCookie> {
    let mut cookies: HashMap<String, String> = HashMap::new();
    let mut order = Vec::new();

    for (name, value, encrypted) in rows {
        let plain = if !value.is_empty() {
            value
        } else if encrypted.is_empty() {
            continue;
        } else if !has_version_prefix(&encrypted) {
            let Some(plain) = decode_lenient(&encrypted) else {
                trace!(name = %name, "Unreadable clear cookie, skipping");
                continue;
            };
            plain
        } else {
            let Some(key) = keys.for_value(&encrypted) else {
                trace!(name = %name, "No key for encrypted cookie, skipping");
                continue;
            };
            match decrypt_cookie_value(&encrypted, key) {
                Ok(plain) => plain,
                Err(e) => {
                    trace!(name = %name, error = %e, "Failed to decrypt cookie, skipping");
                    continue;
                }
            }
        };
        if !cookies.contains_key(&name) {
            order.push(name.clone());
        }
        cookies.insert(name, plain);
    }

    order
        .into_iter()
        .filter_map(|name| cookies.remove(&name).map(|value| DecryptedCookie { name, value }))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
