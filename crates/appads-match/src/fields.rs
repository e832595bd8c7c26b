//! Per-field comparison rules shared by strict and fallback matching.

use appads_core::FilterCriteria;

use crate::parse::{split_lines, DeclarationEntry};

/// Separators accepted between alternative publisher ids in a filter value.
const PUBLISHER_ID_DELIMITERS: [char; 2] = ['+', '|'];

/// Borrowed view of one candidate line, strict or loosely split.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryView<'a> {
    pub domain: &'a str,
    pub publisher_id: &'a str,
    pub relationship: &'a str,
    pub tag_id: Option<&'a str>,
    pub line_number: usize,
    pub raw: &'a str,
}

impl<'a> From<&'a DeclarationEntry> for EntryView<'a> {
    fn from(entry: &'a DeclarationEntry) -> Self {
        Self {
            domain: &entry.domain,
            publisher_id: &entry.publisher_id,
            relationship: entry.relationship.as_str(),
            tag_id: entry.tag_id.as_deref(),
            line_number: entry.line_number,
            raw: &entry.raw_text,
        }
    }
}

/// Manual line/comma split used when strict parsing yields nothing: no
/// comment stripping and no relationship validation.
pub(crate) fn loose_split(text: &str) -> Vec<EntryView<'_>> {
    split_lines(text)
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() < 3 {
                return None;
            }
            Some(EntryView {
                domain: fields[0],
                publisher_id: fields[1],
                relationship: fields[2],
                tag_id: fields.get(3).copied().filter(|t| !t.is_empty()),
                line_number: idx + 1,
                raw: line,
            })
        })
        .collect()
}

/// One specified field of a criteria set.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FieldFilter<'c> {
    Domain(&'c str),
    PublisherId(&'c str),
    Relationship(&'c str),
    TagId(&'c str),
}

impl FieldFilter<'_> {
    pub(crate) fn matches(&self, entry: &EntryView<'_>) -> bool {
        match *self {
            FieldFilter::Domain(f) => domain_matches(entry.domain, f),
            FieldFilter::PublisherId(f) => publisher_id_matches(entry.publisher_id, f),
            FieldFilter::Relationship(f) => relationship_matches(entry.relationship, f),
            FieldFilter::TagId(f) => entry.tag_id.is_some_and(|t| tag_id_matches(t, f)),
        }
    }
}

/// Specified (non-blank) fields of `criteria`, in declaration order.
pub(crate) fn specified_fields(criteria: &FilterCriteria) -> Vec<FieldFilter<'_>> {
    fn non_blank(value: Option<&String>) -> Option<&str> {
        value.map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    let mut fields = Vec::with_capacity(4);
    if let Some(v) = non_blank(criteria.domain.as_ref()) {
        fields.push(FieldFilter::Domain(v));
    }
    if let Some(v) = non_blank(criteria.publisher_id.as_ref()) {
        fields.push(FieldFilter::PublisherId(v));
    }
    if let Some(v) = non_blank(criteria.relationship.as_ref()) {
        fields.push(FieldFilter::Relationship(v));
    }
    if let Some(v) = non_blank(criteria.tag_id.as_ref()) {
        fields.push(FieldFilter::TagId(v));
    }
    fields
}

/// Exact or either-direction substring match, case-insensitive.
///
/// Loose on purpose to absorb subdomain variance; it also lets `ad.com`
/// match `notad.com`.
pub(crate) fn domain_matches(entry: &str, filter: &str) -> bool {
    let entry = entry.trim().to_ascii_lowercase();
    let filter = filter.trim().to_ascii_lowercase();
    if entry.is_empty() || filter.is_empty() {
        return false;
    }
    entry == filter || entry.contains(&filter) || filter.contains(&entry)
}

pub(crate) fn publisher_id_matches(entry: &str, filter: &str) -> bool {
    let entry = entry.trim();
    if entry.is_empty() {
        return false;
    }
    let relaxed_entry = strip_whitespace(entry);

    publisher_id_candidates(filter).any(|candidate| {
            entry.eq_ignore_ascii_case(candidate)
                || relaxed_entry.eq_ignore_ascii_case(&strip_whitespace(candidate))
        })
}

/// The whole filter value followed by each `+`/`|` separated alternative.
pub(crate) fn publisher_id_candidates(filter: &str) -> impl Iterator<Item = &str> {
    std::iter::once(filter)
        .chain(filter.split(PUBLISHER_ID_DELIMITERS))
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
}

pub(crate) fn relationship_matches(entry: &str, filter: &str) -> bool {
    let entry = entry.trim();
    !entry.is_empty() && entry.to_ascii_uppercase() == filter.trim().to_ascii_uppercase()
}

pub(crate) fn tag_id_matches(entry: &str, filter: &str) -> bool {
    let entry = entry.trim();
    !entry.is_empty() && entry.eq_ignore_ascii_case(filter.trim())
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}
