//! Provider identifiers.

use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported provider kinds.
///
/// This is the key of the aggregated snapshot map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// GitHub Copilot
    Copilot,
    /// Antigravity
    Antigravity,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Copilot => "Copilot",
            Self::Antigravity => "Antigravity",
        }
    }

    /// Returns all available provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[Self::Copilot, Self::Antigravity]
    }

    /// Returns the CLI name for this provider (lowercase, no spaces).
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Copilot => "copilot",
            Self::Antigravity => "antigravity",
        }
    }

    /// Looks up a provider by CLI name (case-insensitive).
    pub fn from_cli_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.cli_name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cli_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cli_name() {
        assert_eq!(ProviderKind::from_cli_name("copilot"), Some(ProviderKind::Copilot));
        assert_eq!(ProviderKind::from_cli_name(" Antigravity "), Some(ProviderKind::Antigravity));
        assert_eq!(ProviderKind::from_cli_name("nope"), None);
    }

    #[test]
    fn test_display_uses_cli_name() {
        assert_eq!(ProviderKind::Copilot.to_string(), "copilot");
    }
}
