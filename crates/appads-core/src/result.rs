//! Per-identifier lookup results.
//!
//! [`LookupResult`] is a tagged type internally: an identifier either
//! resolved to a developer domain ([`LookupOutcome::Resolved`]) or failed
//! ([`LookupOutcome::Failed`]). On the wire it is a flat camelCase object
//! with a `success` flag; conversion happens in exactly one place in each
//! direction (`From<LookupResult>` and `TryFrom<LookupResultWire>`), so
//! consumers never branch on optional field combinations.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// The store an identifier was resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    GooglePlay,
    AppStore,
    Amazon,
    Roku,
    Samsung,
    #[serde(other)]
    Unknown,
}

impl StoreType {
    /// Display label used in exports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            StoreType::GooglePlay => "Google Play",
            StoreType::AppStore => "App Store",
            StoreType::Amazon => "Amazon",
            StoreType::Roku => "Roku",
            StoreType::Samsung => "Samsung",
            StoreType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A declaration line that satisfied (part of) a criteria set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedLine {
    pub line_number: usize,
    pub content: String,
}

/// Outcome for one matching criteria set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermResult {
    pub term: String,
    #[serde(default)]
    pub matches: Vec<MatchedLine>,
}

/// Aggregate match outcome for one declaration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub count: usize,
    #[serde(default)]
    pub term_results: Vec<TermResult>,
}

impl MatchInfo {
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.count > 0
    }

    /// All matching lines across every term, de-duplicated by content and
    /// kept in first-seen order.
    #[must_use]
    pub fn matching_lines(&self) -> Vec<&MatchedLine> {
        let mut seen = HashSet::new();
        self.term_results
            .iter()
            .flat_map(|t| t.matches.iter())
            .filter(|line| seen.insert(line.content.as_str()))
            .collect()
    }
}

/// What happened when the declaration document was retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationStatus {
    Found { text: String },
    NotFound,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// URL the document was (or would have been) served from.
    pub url: Option<String>,
    pub status: DeclarationStatus,
}

impl Declaration {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.status {
            DeclarationStatus::Found { text } => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        matches!(self.status, DeclarationStatus::Found { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Resolved {
        store_type: StoreType,
        domain: String,
        declaration: Declaration,
        match_info: Option<MatchInfo>,
    },
    Failed {
        error: String,
    },
}

/// Exactly one of these is produced per accepted identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "LookupResultWire", try_from = "LookupResultWire")]
pub struct LookupResult {
    pub identifier: String,
    pub outcome: LookupOutcome,
    pub timestamp: DateTime<Utc>,
}

impl LookupResult {
    #[must_use]
    pub fn resolved(
        identifier: impl Into<String>,
        store_type: StoreType,
        domain: impl Into<String>,
        declaration: Declaration,
        match_info: Option<MatchInfo>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: LookupOutcome::Resolved {
                store_type,
                domain: domain.into(),
                declaration,
                match_info,
            },
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed(identifier: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: LookupOutcome::Failed {
                error: error.into(),
            },
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LookupOutcome::Resolved { .. })
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        match &self.outcome {
            LookupOutcome::Resolved { domain, .. } => Some(domain),
            LookupOutcome::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn store_type(&self) -> Option<StoreType> {
        match &self.outcome {
            LookupOutcome::Resolved { store_type, .. } => Some(*store_type),
            LookupOutcome::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn declaration(&self) -> Option<&Declaration> {
        match &self.outcome {
            LookupOutcome::Resolved { declaration, .. } => Some(declaration),
            LookupOutcome::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn has_declaration(&self) -> bool {
        self.declaration().is_some_and(Declaration::exists)
    }

    #[must_use]
    pub fn match_info(&self) -> Option<&MatchInfo> {
        match &self.outcome {
            LookupOutcome::Resolved { match_info, .. } => match_info.as_ref(),
            LookupOutcome::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn is_match(&self) -> bool {
        self.match_info().is_some_and(MatchInfo::is_match)
    }

    /// Lookup error, or the declaration retrieval error for resolved apps.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            LookupOutcome::Failed { error } => Some(error),
            LookupOutcome::Resolved { declaration, .. } => match &declaration.status {
                DeclarationStatus::Failed { message } => Some(message),
                _ => None,
            },
        }
    }
}

/// Flat wire shape of [`LookupResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResultWire {
    #[serde(alias = "bundleId")]
    pub identifier: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_type: Option<StoreType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_url: Option<String>,
    #[serde(default)]
    pub has_declaration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_info: Option<MatchInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl From<LookupResult> for LookupResultWire {
    fn from(result: LookupResult) -> Self {
        let LookupResult {
            identifier,
            outcome,
            timestamp,
        } = result;

        match outcome {
            LookupOutcome::Resolved {
                store_type,
                domain,
                declaration,
                match_info,
            } => {
                let has_declaration = declaration.exists();
                let (declaration_text, declaration_error) = match declaration.status {
                    DeclarationStatus::Found { text } => (Some(text), None),
                    DeclarationStatus::NotFound => (None, None),
                    DeclarationStatus::Failed { message } => (None, Some(message)),
                };
                Self {
                    identifier,
                    success: true,
                    store_type: Some(store_type),
                    domain: Some(domain),
                    declaration_url: declaration.url,
                    has_declaration,
                    declaration_text,
                    declaration_error,
                    match_info,
                    error: None,
                    timestamp,
                }
            }
            LookupOutcome::Failed { error } => Self {
                identifier,
                success: false,
                store_type: None,
                domain: None,
                declaration_url: None,
                has_declaration: false,
                declaration_text: None,
                declaration_error: None,
                match_info: None,
                error: Some(error),
                timestamp,
            },
        }
    }
}

impl TryFrom<LookupResultWire> for LookupResult {
    type Error = CoreError;

    fn try_from(wire: LookupResultWire) -> Result<Self, Self::Error> {
        if !wire.success {
            return Ok(Self {
                identifier: wire.identifier,
                outcome: LookupOutcome::Failed {
                    error: wire.error.unwrap_or_else(|| "unknown error".to_owned()),
                },
                timestamp: wire.timestamp,
            });
        }

        let Some(domain) = wire.domain else {
            return Err(CoreError::InconsistentResult {
                identifier: wire.identifier,
                reason: "successful result has no domain",
            });
        };

        let status = match (wire.declaration_text, wire.declaration_error) {
            (Some(text), _) => DeclarationStatus::Found { text },
            (None, Some(message)) => DeclarationStatus::Failed { message },
            (None, None) if wire.has_declaration => DeclarationStatus::Found {
                text: String::new(),
            },
            (None, None) => DeclarationStatus::NotFound,
        };

        Ok(Self {
            identifier: wire.identifier,
            outcome: LookupOutcome::Resolved {
                store_type: wire.store_type.unwrap_or(StoreType::Unknown),
                domain,
                declaration: Declaration {
                    url: wire.declaration_url,
                    status,
                },
                match_info: wire.match_info,
            },
            timestamp: wire.timestamp,
        })
    }
}
