//! End-to-end matching scenarios over realistic declaration documents.

use appads_core::{normalize_criteria, CriteriaInput, FilterCriteria};
use appads_match::MatchEngine;

const DECLARATION: &str = "\u{feff}# app-ads.txt for example.com
contact=adops@example.com
OWNERDOMAIN=example.com

appnexus.com, 12447, DIRECT, f5ab79cb980f11d1
google.com, pub-3940256099942544, DIRECT, f08c47fec0942fa0 # primary
Rubiconproject.com, 17130, reseller, 0bfd66d529a55807
indexexchange.com, 184349, RESELLER
this line is not a record
";

fn engine_from_json(raw: &str) -> MatchEngine {
    let input: CriteriaInput = serde_json::from_str(raw).expect("valid criteria json");
    let criteria = normalize_criteria(input.into_list()).expect("criteria should normalize");
    MatchEngine::new(&criteria)
}

#[test]
fn appnexus_domain_scenario() {
    let engine = engine_from_json(r#"[{"domain": "appnexus.com"}]"#);
    let info = engine.evaluate("appnexus.com, 12447, DIRECT");

    assert_eq!(info.count, 1);
    assert_eq!(info.term_results.len(), 1);
    assert!(info.term_results[0].term.contains("appnexus.com"));
}

#[test]
fn single_object_criteria_is_accepted() {
    let engine = engine_from_json(r#"{"domain": "google.com", "publisherId": "pub-3940256099942544"}"#);
    let info = engine.evaluate(DECLARATION);

    assert_eq!(info.count, 1);
    assert_eq!(
        info.term_results[0].term,
        "domain: google.com, publisherId: pub-3940256099942544"
    );
    assert_eq!(info.term_results[0].matches[0].line_number, 6);
    assert!(info.term_results[0].matches[0].content.ends_with("# primary"));
}

#[test]
fn case_insensitive_domain_and_relationship() {
    let engine = engine_from_json(r#"[{"domain": "rubiconproject.com", "relationship": "RESELLER"}]"#);
    assert!(engine.matches(DECLARATION));

    let engine = engine_from_json(r#"[{"domain": "EXAMPLE.com"}]"#);
    assert!(engine.matches("Example.com, 1, direct"));
}

#[test]
fn multi_value_publisher_id() {
    let engine = engine_from_json(r#"[{"publisherId": "111+222"}]"#);
    assert!(engine.matches("a.com, 222, DIRECT"));
    assert!(!engine.matches("a.com, 333, DIRECT"));
}

#[test]
fn tag_id_must_match_exactly() {
    let engine = engine_from_json(r#"[{"tagId": "f5ab79cb980f11d1"}]"#);
    assert!(engine.matches(DECLARATION));

    let engine = engine_from_json(r#"[{"tagId": "f5ab79cb980f11d"}]"#);
    assert!(!engine.matches(DECLARATION));
}

#[test]
fn any_matching_set_is_a_document_match() {
    let engine = engine_from_json(
        r#"[{"domain": "openx.com"}, {"domain": "indexexchange.com", "publisherId": "184349"}]"#,
    );
    let info = engine.evaluate(DECLARATION);

    assert_eq!(info.count, 1);
    assert_eq!(info.term_results[0].matches.len(), 1);
    assert_eq!(info.term_results[0].matches[0].line_number, 8);
}

#[test]
fn matching_lines_are_deduplicated_across_sets() {
    let engine = engine_from_json(
        r#"[{"domain": "appnexus.com"}, {"publisherId": "12447"}, {"relationship": "direct"}]"#,
    );
    let info = engine.evaluate(DECLARATION);

    assert_eq!(info.count, 3);
    let lines: Vec<usize> = info.matching_lines().iter().map(|l| l.line_number).collect();
    assert_eq!(lines, [5, 6]);
}

#[test]
fn evaluation_is_idempotent() {
    let engine = engine_from_json(
        r#"[{"domain": "google.com"}, {"publisherId": "17130|184349", "relationship": "reseller"}]"#,
    );
    let first = engine.evaluate(DECLARATION);
    let second = engine.evaluate(DECLARATION);
    assert_eq!(first, second);
    assert_eq!(first.count, 2);
}

#[test]
fn document_without_records_uses_raw_fallbacks() {
    let engine = MatchEngine::new(&[FilterCriteria {
        domain: Some("partner.io".into()),
        publisher_id: Some("77".into()),
        ..FilterCriteria::default()
    }]);

    assert!(engine.matches("partner.io, 77, PARTNER"));
    assert!(engine.matches("see partner.io account 77 for details"));
    assert!(!engine.matches("partner.io\n77"));
}

#[test]
fn empty_document_never_matches() {
    let engine = engine_from_json(r#"[{"domain": "appnexus.com"}]"#);
    let info = engine.evaluate("   \n");
    assert_eq!(info.count, 0);
    assert!(info.term_results.is_empty());
}
