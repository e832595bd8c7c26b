//! Criteria evaluation against a declaration document.
//!
//! A document matches when any criteria set matches. A set matches when
//! every field it specifies is satisfied by *some* entry; the fields need
//! not be satisfied by the same entry. Evaluation falls back in three steps:
//!
//! 1. strict entries from [`parse_declaration`];
//! 2. when strict parsing yields nothing, a loose line/comma split of the
//!    raw text;
//! 3. for sets still unmatched that name both a domain and a publisher id,
//!    a case-insensitive search for the domain and one publisher id
//!    candidate within a single non-comment raw line. Like step 2 it only
//!    runs when strict parsing yields nothing.

use std::collections::HashSet;

use appads_core::{FilterCriteria, MatchInfo, MatchedLine, TermResult};

use crate::fields::{
    loose_split, publisher_id_candidates, specified_fields, EntryView, FieldFilter,
};
use crate::parse::{parse_declaration, split_lines, DeclarationEntry};

/// Evaluates an ordered, disjunctive list of criteria sets.
///
/// Pure: the same document and criteria always produce the same
/// [`MatchInfo`].
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    criteria: Vec<FilterCriteria>,
}

impl MatchEngine {
    /// Builds an engine, normalizing every set and dropping empty ones.
    #[must_use]
    pub fn new(criteria: &[FilterCriteria]) -> Self {
        let criteria: Vec<FilterCriteria> = criteria
            .iter()
            .map(FilterCriteria::normalized)
            .filter(|c| {
                let empty = c.is_empty();
                if empty {
                    tracing::debug!("ignoring criteria set with no fields");
                }
                !empty
            })
            .collect();
        Self { criteria }
    }

    /// `true` when there is nothing to evaluate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    #[must_use]
    pub fn criteria(&self) -> &[FilterCriteria] {
        &self.criteria
    }

    /// Parses `text` and evaluates every criteria set against it.
    #[must_use]
    pub fn evaluate(&self, text: &str) -> MatchInfo {
        let parsed = parse_declaration(text);
        self.evaluate_entries(&parsed.entries, Some(text))
    }

    /// Evaluates pre-parsed entries. `raw` enables the loose and last-resort
    /// fallbacks.
    #[must_use]
    pub fn evaluate_entries(&self, entries: &[DeclarationEntry], raw: Option<&str>) -> MatchInfo {
        let raw = raw.filter(|r| !r.trim().is_empty());
        let fallback_raw = raw.filter(|_| entries.is_empty());

        let views: Vec<EntryView<'_>> = if entries.is_empty() {
            raw.map(loose_split).unwrap_or_default()
        } else {
            entries.iter().map(EntryView::from).collect()
        };

        let mut info = MatchInfo::default();
        for criteria in &self.criteria {
            let fields = specified_fields(criteria);
            let term = match_fields(&fields, &views)
                .or_else(|| fallback_raw.and_then(|r| last_resort(&fields, r)));

            if let Some(matches) = term {
                info.count += 1;
                info.term_results.push(TermResult {
                    term: criteria.describe(),
                    matches,
                });
            }
        }

        tracing::trace!(
            entries = views.len(),
            criteria = self.criteria.len(),
            matched = info.count,
            "evaluated declaration"
        );
        info
    }

    /// Convenience for callers that only need the verdict.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.evaluate(text).is_match()
    }
}

/// Returns the reported lines when every field is satisfied by some entry.
///
/// Reported lines are the entries satisfying all fields at once; when no
/// single entry does, every entry satisfying at least one field.
fn match_fields(fields: &[FieldFilter<'_>], views: &[EntryView<'_>]) -> Option<Vec<MatchedLine>> {
    if fields.is_empty() || views.is_empty() {
        return None;
    }
    if !fields.iter().all(|f| views.iter().any(|v| f.matches(v))) {
        return None;
    }

    let same_entry: Vec<&EntryView<'_>> = views
        .iter()
        .filter(|v| fields.iter().all(|f| f.matches(v)))
        .collect();

    let reported = if same_entry.is_empty() {
        views
            .iter()
            .filter(|v| fields.iter().any(|f| f.matches(v)))
            .collect()
    } else {
        same_entry
    };

    Some(dedup_lines(
        reported.into_iter().map(|v| (v.line_number, v.raw)),
    ))
}

fn last_resort(fields: &[FieldFilter<'_>], raw: &str) -> Option<Vec<MatchedLine>> {
    let domain = fields.iter().find_map(|f| match *f {
        FieldFilter::Domain(d) => Some(d.to_lowercase()),
        _ => None,
    })?;
    let candidates: Vec<String> = fields
        .iter()
        .find_map(|f| match *f {
            FieldFilter::PublisherId(p) => Some(publisher_id_candidates(p)),
            _ => None,
        })?
        .map(str::to_lowercase)
        .collect();

    let hits: Vec<(usize, &str)> = split_lines(raw)
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| {
            if line.is_empty() || line.starts_with('#') {
                return false;
            }
            let lower = line.to_lowercase();
            lower.contains(&domain) && candidates.iter().any(|c| lower.contains(c.as_str()))
        })
        .collect();

    if hits.is_empty() {
        return None;
    }
    tracing::debug!(lines = hits.len(), "criteria matched by raw line search");
    Some(dedup_lines(hits.into_iter()))
}

fn dedup_lines<'a>(lines: impl Iterator<Item = (usize, &'a str)>) -> Vec<MatchedLine> {
    let mut seen = HashSet::new();
    lines
        .filter(|(_, content)| seen.insert(*content))
        .map(|(line_number, content)| MatchedLine {
            line_number,
            content: content.to_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(
        domain: Option<&str>,
        publisher_id: Option<&str>,
        relationship: Option<&str>,
        tag_id: Option<&str>,
    ) -> FilterCriteria {
        FilterCriteria {
            domain: domain.map(ToOwned::to_owned),
            publisher_id: publisher_id.map(ToOwned::to_owned),
            relationship: relationship.map(ToOwned::to_owned),
            tag_id: tag_id.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn empty_sets_are_dropped() {
        let engine = MatchEngine::new(&[criteria(Some("  "), None, None, None)]);
        assert!(engine.is_empty());
        assert_eq!(engine.evaluate("a.com, 1, DIRECT"), MatchInfo::default());
    }

    #[test]
    fn single_domain_criteria_matches_one_line() {
        let engine = MatchEngine::new(&[criteria(Some("appnexus.com"), None, None, None)]);
        let info = engine.evaluate("appnexus.com, 12447, DIRECT");
        assert_eq!(info.count, 1);
        assert_eq!(info.term_results.len(), 1);
        assert!(info.term_results[0].term.contains("appnexus.com"));
        assert_eq!(info.term_results[0].matches[0].line_number, 1);
    }

    #[test]
    fn fields_may_match_different_entries() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), Some("999"), None, None)]);
        let info = engine.evaluate("a.com, 1, DIRECT\nb.com, 999, RESELLER");
        assert_eq!(info.count, 1);
        assert_eq!(info.term_results[0].matches.len(), 2);
    }

    #[test]
    fn same_entry_lines_are_preferred_when_present() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), None, Some("DIRECT"), None)]);
        let info = engine.evaluate("a.com, 1, DIRECT\nb.com, 2, DIRECT\na.com, 3, RESELLER");
        let lines: Vec<usize> = info.term_results[0]
            .matches
            .iter()
            .map(|m| m.line_number)
            .collect();
        assert_eq!(lines, [1]);
    }

    #[test]
    fn unmatched_field_fails_the_set() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), None, None, Some("deadbeef"))]);
        assert_eq!(engine.evaluate("a.com, 1, DIRECT, cafebabe").count, 0);
    }

    #[test]
    fn sets_are_disjunctive_and_counted_individually() {
        let engine = MatchEngine::new(&[
            criteria(Some("missing.com"), None, None, None),
            criteria(Some("a.com"), None, None, None),
            criteria(None, None, Some("reseller"), None),
        ]);
        let info = engine.evaluate("a.com, 1, DIRECT\nb.com, 2, RESELLER");
        assert_eq!(info.count, 2);
        assert_eq!(info.term_results[0].term, "domain: a.com");
        assert_eq!(info.term_results[1].term, "relationship: RESELLER");
    }

    #[test]
    fn loose_split_is_used_when_nothing_parses() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), None, None, None)]);
        let info = engine.evaluate("a.com, 1, PARTNER");
        assert_eq!(info.count, 1);
    }

    #[test]
    fn last_resort_finds_tokens_in_one_raw_line() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), Some("12447"), None, None)]);
        let info = engine.evaluate("a.com 12447 DIRECT\nb.com 1");
        assert_eq!(info.count, 1);
        assert_eq!(info.term_results[0].matches[0].content, "a.com 12447 DIRECT");
    }

    #[test]
    fn last_resort_ignores_commented_out_lines() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), Some("12447"), None, None)]);
        assert_eq!(engine.evaluate("a.com 12447
# a.com 12447 removed").count, 1);
        assert_eq!(engine.evaluate("foo
# a.com, 12447, DIRECT removed").count, 0);
    }

    #[test]
    fn last_resort_is_skipped_when_entries_parse() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), Some("12447"), None, None)]);
        let info = engine.evaluate("a.com, 1, DIRECT
# a.com, 12447, DIRECT removed 2024
");
        assert_eq!(info.count, 0);
    }

    #[test]
    fn last_resort_searches_domain_and_publisher_only() {
        let engine = MatchEngine::new(&[criteria(
            Some("a.com"),
            Some("12447"),
            Some("DIRECT"),
            None,
        )]);
        assert_eq!(engine.evaluate("a.com 12447").count, 1);
    }

    #[test]
    fn last_resort_accepts_any_publisher_candidate() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), Some("111+222"), None, None)]);
        let info = engine.evaluate("a.com 222 direct");
        assert_eq!(info.count, 1);
        assert_eq!(info.term_results[0].matches[0].content, "a.com 222 direct");
        assert_eq!(engine.evaluate("a.com 333 direct").count, 0);
    }

    #[test]
    fn last_resort_needs_domain_and_publisher() {
        let engine = MatchEngine::new(&[criteria(Some("a.com"), None, None, None)]);
        assert_eq!(engine.evaluate("a.com 12447 DIRECT").count, 0);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let engine = MatchEngine::new(&[
            criteria(Some("google.com"), Some("pub-1+pub-2"), None, None),
            criteria(None, None, Some("DIRECT"), None),
        ]);
        let doc = "google.com, pub-2, RESELLER\nappnexus.com, 1, DIRECT";
        assert_eq!(engine.evaluate(doc), engine.evaluate(doc));
    }

    #[test]
    fn evaluate_entries_uses_pre_parsed_input() {
        let parsed = parse_declaration("a.com, 1, DIRECT");
        let engine = MatchEngine::new(&[criteria(None, Some("1"), None, None)]);
        let info = engine.evaluate_entries(&parsed.entries, None);
        assert_eq!(info.count, 1);
    }
}
