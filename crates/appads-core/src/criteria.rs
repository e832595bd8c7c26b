use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Relationship values accepted in filters and declaration lines.
pub const RELATIONSHIPS: [&str; 2] = ["DIRECT", "RESELLER"];

/// One structured constraint set tested against declaration entries.
///
/// Every field is optional; unspecified fields act as wildcards. A request
/// carries an ordered list of these and a document matches when any one set
/// matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
}

impl FilterCriteria {
    /// Trims every field, drops blank ones, and upper-cases the relationship.
    #[must_use]
    pub fn normalized(&self) -> Self {
        fn clean(value: Option<&String>) -> Option<String> {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(ToOwned::to_owned)
        }

        Self {
            domain: clean(self.domain.as_ref()),
            publisher_id: clean(self.publisher_id.as_ref()),
            relationship: clean(self.relationship.as_ref()).map(|r| r.to_ascii_uppercase()),
            tag_id: clean(self.tag_id.as_ref()),
        }
    }

    /// `true` when no field carries a non-blank value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.domain,
            &self.publisher_id,
            &self.relationship,
            &self.tag_id,
        ]
        .iter()
        .all(|f| f.as_deref().is_none_or(|v| v.trim().is_empty()))
    }

    /// Human-readable summary, e.g. `domain: appnexus.com, relationship: DIRECT`.
    #[must_use]
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("domain", &self.domain),
            ("publisherId", &self.publisher_id),
            ("relationship", &self.relationship),
            ("tagId", &self.tag_id),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| format!("{label}: {v}")))
        .collect();
        parts.join(", ")
    }
}

/// Wire form of `filterCriteria`: a single set or an ordered list of sets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CriteriaInput {
    One(FilterCriteria),
    Many(Vec<FilterCriteria>),
}

impl CriteriaInput {
    #[must_use]
    pub fn into_list(self) -> Vec<FilterCriteria> {
        match self {
            Self::One(c) => vec![c],
            Self::Many(list) => list,
        }
    }
}

/// Normalizes a criteria list, silently dropping empty sets.
///
/// # Errors
///
/// Returns [`CoreError::InvalidCriteria`] when a set names a relationship
/// other than `DIRECT` or `RESELLER`.
pub fn normalize_criteria(list: Vec<FilterCriteria>) -> Result<Vec<FilterCriteria>, CoreError> {
    let mut out = Vec::with_capacity(list.len());
    for criteria in list {
        let normalized = criteria.normalized();
        if normalized.is_empty() {
            continue;
        }
        if let Some(rel) = normalized.relationship.as_deref() {
            if !RELATIONSHIPS.contains(&rel) {
                return Err(CoreError::InvalidCriteria(format!(
                    "relationship must be DIRECT or RESELLER, got \"{rel}\""
                )));
            }
        }
        out.push(normalized);
    }
    Ok(out)
}
