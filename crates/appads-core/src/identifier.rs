//! Store app identifiers.
//!
//! Three shapes are accepted, covering the stores the resolver knows about:
//!
//! - numeric App Store ids, optionally prefixed with `id` (`id284882215`);
//! - reverse-DNS package names used by Google Play and most TV stores
//!   (`com.example.game`);
//! - opaque alphanumeric SKUs such as Amazon ASINs (`B00X4WHP5E`).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Longest identifier accepted, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 255;

static NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:id)?\d+$").expect("valid numeric id regex"));

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)+$").expect("valid package name regex")
});

static STORE_SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{4,}$").expect("valid store sku regex"));

/// A validated app identifier. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validates and trims `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidIdentifier`] when the trimmed value is empty,
    /// too long, or matches none of the accepted shapes.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let value = raw.trim();
        let invalid = |reason| CoreError::InvalidIdentifier {
            value: value.to_owned(),
            reason,
        };

        if value.is_empty() {
            return Err(invalid("identifier is empty"));
        }
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(invalid("identifier is longer than 255 bytes"));
        }
        if !(NUMERIC_ID.is_match(value)
            || PACKAGE_NAME.is_match(value)
            || STORE_SKU.is_match(value))
        {
            return Err(invalid(
                "expected a numeric store id, a package name, or a store SKU",
            ));
        }

        Ok(Self(value.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric App Store id without the optional `id` prefix, if this is one.
    #[must_use]
    pub fn numeric_store_id(&self) -> Option<&str> {
        if NUMERIC_ID.is_match(&self.0) {
            Some(self.0.trim_start_matches("id"))
        } else {
            None
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}
