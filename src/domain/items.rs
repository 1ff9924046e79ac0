//! Catalog item kinds referenced by cart and reservation lines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminator for the three sellable catalog item types.
///
/// A cart or reservation line references exactly one of these; the
/// database enforces the XOR with a `num_nonnulls` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A single rentable service (bounce house, face painting, ...).
    Service,
    /// A bundle of services sold at a combined price.
    Bundle,
    /// A time-limited promotional offer.
    Promotion,
}

impl ItemKind {
    /// Parses the API-facing string form (`"service"`, `"bundle"`,
    /// `"promotion"`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "service" => Some(Self::Service),
            "bundle" => Some(Self::Bundle),
            "promotion" => Some(Self::Promotion),
            _ => None,
        }
    }

    /// One-letter column value stored in `reservation_lines.line_kind`.
    #[must_use]
    pub const fn db_code(self) -> &'static str {
        match self {
            Self::Service => "S",
            Self::Bundle => "B",
            Self::Promotion => "P",
        }
    }

    /// Parses the one-letter column value back into a kind.
    #[must_use]
    pub fn from_db_code(code: &str) -> Option<Self> {
        match code {
            "S" => Some(Self::Service),
            "B" => Some(Self::Bundle),
            "P" => Some(Self::Promotion),
            _ => None,
        }
    }

    /// API-facing string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Bundle => "bundle",
            Self::Promotion => "promotion",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_api_strings() {
        for kind in [ItemKind::Service, ItemKind::Bundle, ItemKind::Promotion] {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("combo"), None);
    }

    #[test]
    fn db_code_round_trips() {
        for kind in [ItemKind::Service, ItemKind::Bundle, ItemKind::Promotion] {
            assert_eq!(ItemKind::from_db_code(kind.db_code()), Some(kind));
        }
        assert_eq!(ItemKind::from_db_code("X"), None);
    }
}
