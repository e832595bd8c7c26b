//! Declaration parsing and structured criteria matching.
//!
//! [`parse_declaration`] turns `app-ads.txt` text into [`DeclarationEntry`]
//! values; [`MatchEngine`] evaluates an ordered, disjunctive list of
//! [`appads_core::FilterCriteria`] against a document and builds the
//! [`appads_core::MatchInfo`] attached to each lookup result.

pub mod engine;
mod fields;
pub mod parse;

pub use engine::MatchEngine;
pub use parse::{
    parse_declaration, DeclarationEntry, DeclarationVariable, ParsedDeclaration, Relationship,
};
