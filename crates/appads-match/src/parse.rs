//! Line-oriented parsing of `app-ads.txt` declaration documents.
//!
//! ## Record lines
//! `<domain>, <publisher id>, <relationship>[, <tag id>]`, e.g.
//! `appnexus.com, 12447, DIRECT, f5ab79cb980f11d1`. Fields are trimmed.
//! The relationship is case-insensitive in the wild (`direct`, `Reseller`)
//! and is stored upper-cased.
//!
//! ## Comments
//! A line starting with `#` is ignored. Anything after a `#` on a record
//! line is an inline comment and is dropped before splitting.
//!
//! ## Variables
//! `key=value` lines without commas (`contact=ads@example.com`,
//! `OWNERDOMAIN=example.com`) are collected separately.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relationship {
    Direct,
    Reseller,
}

impl Relationship {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Relationship::Direct => "DIRECT",
            Relationship::Reseller => "RESELLER",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown relationship \"{0}\"")]
pub struct UnknownRelationship(pub String);

impl FromStr for Relationship {
    type Err = UnknownRelationship;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Ok(Relationship::Direct),
            "RESELLER" => Ok(Relationship::Reseller),
            _ => Err(UnknownRelationship(s.trim().to_owned())),
        }
    }
}

/// One parsed record line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationEntry {
    pub domain: String,
    pub publisher_id: String,
    pub relationship: Relationship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    /// 1-based line number in the source document.
    pub line_number: usize,
    /// The trimmed source line, inline comment included.
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationVariable {
    /// Lower-cased variable name.
    pub key: String,
    pub value: String,
    pub line_number: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDeclaration {
    pub entries: Vec<DeclarationEntry>,
    pub variables: Vec<DeclarationVariable>,
    /// Non-blank, non-comment lines that were neither records nor variables.
    pub skipped_lines: usize,
}

impl ParsedDeclaration {
    /// Values of every variable named `key` (case-insensitive).
    pub fn variable<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.variables
            .iter()
            .filter(move |v| v.key.eq_ignore_ascii_case(key))
            .map(|v| v.value.as_str())
    }
}

/// Splits on `\r\n`, `\n`, or a bare `\r`.
pub(crate) fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').flat_map(|line| {
        let line = line.strip_suffix('\r').unwrap_or(line);
        line.split('\r')
    })
}

fn strip_inline_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}

/// Parses a declaration document into structured entries.
///
/// Never fails: malformed lines are counted in
/// [`ParsedDeclaration::skipped_lines`] and otherwise ignored.
#[must_use]
pub fn parse_declaration(text: &str) -> ParsedDeclaration {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut parsed = ParsedDeclaration::default();

    for (idx, raw_line) in split_lines(text).enumerate() {
        let line_number = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let content = strip_inline_comment(trimmed).trim();
        if content.is_empty() {
            continue;
        }

        if !content.contains(',') {
            match content.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    parsed.variables.push(DeclarationVariable {
                        key: key.trim().to_ascii_lowercase(),
                        value: value.trim().to_owned(),
                        line_number,
                    });
                }
                _ => parsed.skipped_lines += 1,
            }
            continue;
        }

        let fields: Vec<&str> = content.split(',').map(str::trim).collect();
        if fields.len() < 3 || fields[0].is_empty() || fields[1].is_empty() {
            parsed.skipped_lines += 1;
            continue;
        }

        let Ok(relationship) = fields[2].parse::<Relationship>() else {
            parsed.skipped_lines += 1;
            continue;
        };

        let tag_id = fields
            .get(3)
            .filter(|t| !t.is_empty())
            .map(|t| (*t).to_owned());

        parsed.entries.push(DeclarationEntry {
            domain: fields[0].to_owned(),
            publisher_id: fields[1].to_owned(),
            relationship,
            tag_id,
            line_number,
            raw_text: trimmed.to_owned(),
        });
    }

    parsed
}
