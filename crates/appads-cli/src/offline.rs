//! `match`: evaluate criteria against a local `app-ads.txt` file.

use std::path::Path;

use anyhow::Context;
use appads_core::{FilterCriteria, MatchInfo};
use appads_match::{parse_declaration, MatchEngine};
use serde::Serialize;

use crate::input::CriteriaArgs;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MatchReport {
    pub entries: usize,
    pub variables: usize,
    pub skipped_lines: usize,
    pub matched: bool,
    pub match_info: MatchInfo,
}

pub(crate) fn evaluate(text: &str, criteria: &[FilterCriteria]) -> anyhow::Result<MatchReport> {
    let engine = MatchEngine::new(criteria);
    if engine.is_empty() {
        anyhow::bail!(
            "no criteria given; use --domain, --publisher-id, --relationship, --tag-id or --criteria-file"
        );
    }

    let parsed = parse_declaration(text);
    let match_info = engine.evaluate_entries(&parsed.entries, Some(text));
    Ok(MatchReport {
        entries: parsed.entries.len(),
        variables: parsed.variables.len(),
        skipped_lines: parsed.skipped_lines,
        matched: match_info.is_match(),
        match_info,
    })
}

pub(crate) fn run_match(file: &Path, criteria: &CriteriaArgs) -> anyhow::Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let text = String::from_utf8_lossy(&raw);
    let report = evaluate(&text, &criteria.load()?)?;

    tracing::info!(
        entries = report.entries,
        skipped = report.skipped_lines,
        matched = report.matched,
        "declaration evaluated"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
