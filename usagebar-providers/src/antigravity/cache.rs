//! Reader for the Antigravity local state cache.
//!
//! The editor keeps the last `GetUserStatus` response in its VS Code state
//! database as a base64 blob inside the `antigravityAuthStatus` row. The
//! blob is decoded without a schema, following a fixed field path down to
//! the per-model quota info.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use tracing::{debug, instrument, trace};
use usagebar_core::QuotaRecord;
use usagebar_fetch::{WireMessage, WireValue, coerce};

use super::error::AntigravityError;

// ============================================================================
// Constants
// ============================================================================

/// Environment override for the state database path.
pub const STATE_DB_ENV: &str = "USAGEBAR_ANTIGRAVITY_DB";

/// `ItemTable` key holding the cached auth status.
const AUTH_STATUS_KEY: &str = "antigravityAuthStatus";

/// JSON field carrying the serialized user status.
const USER_STATUS_FIELD: &str = "userStatusProtoBinaryBase64";

/// `UserStatus.email`.
const EMAIL_FIELD: u64 = 7;

/// `UserStatus.cascade_model_config_data`.
const MODEL_CONFIG_DATA_PATH: &[u64] = &[33];

/// `ModelConfigData.client_model_configs` (repeated).
const MODEL_CONFIG_FIELD: u64 = 1;

/// `ModelConfig.label`.
const LABEL_FIELD: u64 = 1;

/// `ModelConfig.quota_info`.
const QUOTA_INFO_FIELD: u64 = 15;

/// `QuotaInfo.remaining_fraction`.
const FRACTION_FIELD: u64 = 1;

/// `QuotaInfo.reset_time`.
const RESET_FIELD: u64 = 2;

// ============================================================================
// Config
// ============================================================================

/// Where to find the Antigravity state database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntigravityConfig {
    /// Path to `state.vscdb`.
    pub state_db: Option<PathBuf>,
}

impl Default for AntigravityConfig {
    fn default() -> Self {
        Self {
            state_db: default_state_db(),
        }
    }
}

impl AntigravityConfig {
    /// Default configuration honouring [`STATE_DB_ENV`].
    pub fn from_env() -> Self {
        match std::env::var(STATE_DB_ENV) {
            Ok(path) if !path.is_empty() => Self::with_state_db(path),
            _ => Self::default(),
        }
    }

    /// Configuration reading `path`.
    pub fn with_state_db(path: impl Into<PathBuf>) -> Self {
        Self {
            state_db: Some(path.into()),
        }
    }
}

#[cfg(target_os = "macos")]
fn default_state_db() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join("Library/Application Support/Antigravity/User/globalStorage/state.vscdb"))
}

#[cfg(not(target_os = "macos"))]
fn default_state_db() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config/Antigravity/User/globalStorage/state.vscdb"))
}

// ============================================================================
// Snapshot
// ============================================================================

/// Quotas recovered from the local cache.
#[derive(Debug, Clone, PartialEq)]
pub struct AntigravitySnapshot {
    /// Account email, if cached.
    pub email: Option<String>,
    /// One record per model label, in cache order.
    pub models: Vec<QuotaRecord>,
}

impl AntigravitySnapshot {
    /// The most exhausted model.
    pub fn most_constrained(&self) -> Option<&QuotaRecord> {
        self.models
            .iter()
            .min_by(|a, b| a.remaining_fraction.total_cmp(&b.remaining_fraction))
    }
}

// ============================================================================
// Decoding
// ============================================================================

fn parse_model(config: &WireMessage<'_>) -> Result<Option<QuotaRecord>, AntigravityError> {
    let Some(label) = config.string(LABEL_FIELD) else {
        return Ok(None);
    };
    let Some(quota) = config.descend(&[QUOTA_INFO_FIELD])? else {
        trace!(%label, "Model has no quota info");
        return Ok(None);
    };

    // Zero is omitted on the wire, so a missing fraction means exhausted.
    let fraction = quota
        .get(FRACTION_FIELD)
        .and_then(WireValue::as_float)
        .unwrap_or(0.0);
    let reset: Option<DateTime<Utc>> = quota.get(RESET_FIELD).and_then(WireValue::as_timestamp);

    Ok(Some(QuotaRecord::new(label, fraction).with_reset(reset)))
}

/// Decodes a serialized user status into quota records.
///
/// A label seen twice keeps the last record, at the position of the first.
///
/// # Errors
///
/// Returns [`AntigravityError::Wire`] if the blob or a message on the quota
/// path is malformed.
pub fn parse_user_status(blob: &[u8]) -> Result<AntigravitySnapshot, AntigravityError> {
    let status = WireMessage::decode(blob)?;
    let email = status.string(EMAIL_FIELD);

    let mut models: Vec<QuotaRecord> = Vec::new();
    if let Some(data) = status.descend(MODEL_CONFIG_DATA_PATH)? {
        for value in data.get_all(MODEL_CONFIG_FIELD) {
            let Some(config) = value.as_message().transpose()? else {
                continue;
            };
            let Some(record) = parse_model(&config)? else {
                continue;
            };
            match models.iter_mut().find(|m| m.label == record.label) {
                Some(existing) => *existing = record,
                None => models.push(record),
            }
        }
    }

    debug!(models = models.len(), "Decoded cached user status");
    Ok(AntigravitySnapshot { email, models })
}

/// Parses the `antigravityAuthStatus` JSON value.
///
/// # Errors
///
/// Returns [`AntigravityError::InvalidResponse`] for malformed JSON or
/// base64, and [`AntigravityError::NotSignedIn`] when the status carries no
/// user status blob.
pub fn parse_auth_status(raw: &str) -> Result<AntigravitySnapshot, AntigravityError> {
    let doc: Value = serde_json::from_str(raw)
        .map_err(|e| AntigravityError::InvalidResponse(format!("JSON error: {e}")))?;
    let encoded = coerce::first_string(&doc, &[USER_STATUS_FIELD])
        .ok_or(AntigravityError::NotSignedIn)?;
    let blob = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AntigravityError::InvalidResponse(format!("base64 error: {e}")))?;

    let mut snapshot = parse_user_status(&blob)?;
    if snapshot.email.is_none() {
        snapshot.email = coerce::first_string(&doc, &["email"]);
    }
    Ok(snapshot)
}

// ============================================================================
// Reader
// ============================================================================

/// Reads the cached auth status from a state database.
///
/// The database is copied to a temporary file first so a running editor's
/// lock does not interfere.
///
/// # Errors
///
/// Returns [`AntigravityError::NotInstalled`] when `path` does not exist,
/// [`AntigravityError::NotSignedIn`] when the row is absent, and decoding
/// errors from [`parse_auth_status`].
#[instrument]
pub fn read_state_db(path: &Path) -> Result<AntigravitySnapshot, AntigravityError> {
    if !path.exists() {
        return Err(AntigravityError::NotInstalled(path.display().to_string()));
    }

    let temp = tempfile::Builder::new()
        .prefix("usagebar-antigravity-")
        .suffix(".db")
        .tempfile()?;
    std::fs::copy(path, temp.path())?;

    let conn = Connection::open_with_flags(temp.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM ItemTable WHERE key = ?1",
            [AUTH_STATUS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    let raw = raw.ok_or(AntigravityError::NotSignedIn)?;
    debug!(bytes = raw.len(), "Read cached auth status");
    parse_auth_status(&raw)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use usagebar_fetch::WireWriter;

    pub(crate) fn model(label: &str, fraction: Option<f32>, reset_secs: Option<u64>) -> WireWriter {
        let mut quota = WireWriter::new();
        if let Some(fraction) = fraction {
            quota = quota.float(FRACTION_FIELD, fraction);
        }
        if let Some(secs) = reset_secs {
            quota = quota.message(RESET_FIELD, &WireWriter::new().varint(1, secs));
        }
        WireWriter::new()
            .bytes(LABEL_FIELD, label.as_bytes())
            .varint(2, 1018)
            .message(QUOTA_INFO_FIELD, &quota)
    }

    pub(crate) fn user_status(models: &[WireWriter]) -> Vec<u8> {
        let data = models
            .iter()
            .fold(WireWriter::new(), |w, m| w.message(MODEL_CONFIG_FIELD, m));
        WireWriter::new()
            .varint(1, 3)
            .bytes(EMAIL_FIELD, b"dev@example.com")
            .message(MODEL_CONFIG_DATA_PATH[0], &data)
            .finish()
    }

    pub(crate) fn auth_status_json(blob: &[u8]) -> String {
        serde_json::json!({
            "name": "Dev",
            "email": "fallback@example.com",
            USER_STATUS_FIELD: STANDARD.encode(blob),
        })
        .to_string()
    }

    pub(crate) fn write_state_db(path: &Path, value: Option<&str>) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
            [],
        )
        .unwrap();
        if let Some(value) = value {
            conn.execute(
                "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
                [AUTH_STATUS_KEY, value],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_parse_user_status() {
        let blob = user_status(&[
            model("Gemini 3 Pro (High)", Some(0.75), Some(1_767_225_600)),
            model("Claude Sonnet 4.5", Some(0.2), None),
        ]);
        let snapshot = parse_user_status(&blob).unwrap();

        assert_eq!(snapshot.email.as_deref(), Some("dev@example.com"));
        assert_eq!(snapshot.models.len(), 2);
        assert_eq!(snapshot.models[0].label, "Gemini 3 Pro (High)");
        assert!((snapshot.models[0].remaining_fraction - 0.75).abs() < 1e-6);
        assert_eq!(
            snapshot.models[0].reset_time.unwrap().timestamp(),
            1_767_225_600
        );
        assert_eq!(snapshot.most_constrained().unwrap().label, "Claude Sonnet 4.5");
    }

    #[test]
    fn test_missing_fraction_means_exhausted() {
        let snapshot = parse_user_status(&user_status(&[model("GPT-OSS", None, None)])).unwrap();
        assert_eq!(snapshot.models[0].remaining_fraction, 0.0);
    }

    #[test]
    fn test_duplicate_labels_last_write_wins() {
        let blob = user_status(&[
            model("Claude", Some(0.9), None),
            model("Gemini", Some(0.5), None),
            model("Claude", Some(0.1), None),
        ]);
        let snapshot = parse_user_status(&blob).unwrap();
        assert_eq!(snapshot.models.len(), 2);
        assert_eq!(snapshot.models[0].label, "Claude");
        assert!((snapshot.models[0].remaining_fraction - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_models_without_quota_are_skipped() {
        let bare = WireWriter::new().bytes(LABEL_FIELD, b"Tab");
        let snapshot = parse_user_status(&user_status(&[bare])).unwrap();
        assert!(snapshot.models.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let blob = WireWriter::new()
            .varint(99, 1)
            .double(100, 2.5)
            .finish();
        let snapshot = parse_user_status(&blob).unwrap();
        assert!(snapshot.models.is_empty());
        assert_eq!(snapshot.email, None);
    }

    #[test]
    fn test_malformed_blob_is_error() {
        // field 1, wire type 3
        assert!(matches!(
            parse_user_status(&[0x0B]),
            Err(AntigravityError::Wire(_))
        ));
    }

    #[test]
    fn test_parse_auth_status() {
        let blob = user_status(&[model("Claude", Some(0.4), None)]);
        let snapshot = parse_auth_status(&auth_status_json(&blob)).unwrap();
        assert_eq!(snapshot.models.len(), 1);
        assert_eq!(snapshot.email.as_deref(), Some("dev@example.com"));
    }

    #[test]
    fn test_parse_auth_status_errors() {
        assert!(matches!(
            parse_auth_status("{"),
            Err(AntigravityError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_auth_status(r#"{"email": "a@b.c"}"#),
            Err(AntigravityError::NotSignedIn)
        ));
        assert!(matches!(
            parse_auth_status(r#"{"userStatusProtoBinaryBase64": "%%%"}"#),
            Err(AntigravityError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_read_state_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.vscdb");
        let blob = user_status(&[model("Claude", Some(0.4), None)]);
        write_state_db(&path, Some(&auth_status_json(&blob)));

        let snapshot = read_state_db(&path).unwrap();
        assert_eq!(snapshot.models[0].label, "Claude");
    }

    #[test]
    fn test_read_state_db_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_state_db(&dir.path().join("nope.vscdb")),
            Err(AntigravityError::NotInstalled(_))
        ));

        let path = dir.path().join("state.vscdb");
        write_state_db(&path, None);
        assert!(matches!(
            read_state_db(&path),
            Err(AntigravityError::NotSignedIn)
        ));
    }
}
