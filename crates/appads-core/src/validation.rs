//! Request validation, applied before any lookup work starts.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::criteria::normalize_criteria;
use crate::{CoreError, CriteriaInput, FilterCriteria, Identifier};

/// Body of both extraction endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_criteria: Option<CriteriaInput>,
}

/// A request that passed validation: distinct identifiers in input order and
/// the normalized, non-empty criteria sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub identifiers: Vec<Identifier>,
    pub criteria: Vec<FilterCriteria>,
}

/// Validates an extraction request.
///
/// Blank identifier entries are skipped and duplicates collapse to their
/// first occurrence. Any malformed identifier rejects the whole request.
///
/// # Errors
///
/// - [`CoreError::EmptyIdentifierList`] when nothing remains after skipping blanks.
/// - [`CoreError::TooManyIdentifiers`] when the distinct count exceeds `max_identifiers`.
/// - [`CoreError::InvalidIdentifier`] for the first malformed entry.
/// - [`CoreError::InvalidCriteria`] for an unknown relationship value.
pub fn validate_request(
    request: ExtractRequest,
    max_identifiers: usize,
) -> Result<ValidatedRequest, CoreError> {
    let mut seen = HashSet::new();
    let mut identifiers = Vec::new();

    for raw in &request.identifiers {
        if raw.trim().is_empty() {
            continue;
        }
        let id = Identifier::parse(raw)?;
        if seen.insert(id.clone()) {
            identifiers.push(id);
        }
    }

    if identifiers.is_empty() {
        return Err(CoreError::EmptyIdentifierList);
    }
    if identifiers.len() > max_identifiers {
        return Err(CoreError::TooManyIdentifiers {
            count: identifiers.len(),
            max: max_identifiers,
        });
    }

    let criteria = normalize_criteria(
        request
            .filter_criteria
            .map(CriteriaInput::into_list)
            .unwrap_or_default(),
    )?;

    Ok(ValidatedRequest {
        identifiers,
        criteria,
    })
}
