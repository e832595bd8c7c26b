//! Request inputs shared by the `extract`, `export` and `match` commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use appads_core::{
    normalize_criteria, validate_request, CriteriaInput, ExtractRequest, FilterCriteria,
};
use clap::Args;

/// One criteria set from flags, plus any sets from `--criteria-file`.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct CriteriaArgs {
    /// Advertising system domain, e.g. `appnexus.com`.
    #[arg(long)]
    pub domain: Option<String>,
    /// Seller account id; `111+222` or `111|222` accepts either.
    #[arg(long)]
    pub publisher_id: Option<String>,
    /// `DIRECT` or `RESELLER`.
    #[arg(long)]
    pub relationship: Option<String>,
    /// Certification authority id.
    #[arg(long)]
    pub tag_id: Option<String>,
    /// JSON file holding one criteria object or an array of them.
    #[arg(long)]
    pub criteria_file: Option<PathBuf>,
}

impl CriteriaArgs {
    /// File sets first, then the flag set. Empty sets are dropped.
    pub(crate) fn load(&self) -> anyhow::Result<Vec<FilterCriteria>> {
        let mut list = match &self.criteria_file {
            Some(path) => read_criteria_file(path)?,
            None => Vec::new(),
        };

        let flags = FilterCriteria {
            domain: self.domain.clone(),
            publisher_id: self.publisher_id.clone(),
            relationship: self.relationship.clone(),
            tag_id: self.tag_id.clone(),
        };
        if !flags.is_empty() {
            list.push(flags);
        }

        Ok(normalize_criteria(list)?)
    }
}

fn read_criteria_file(path: &Path) -> anyhow::Result<Vec<FilterCriteria>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read criteria file {}", path.display()))?;
    let input: CriteriaInput = serde_json::from_str(&raw)
        .with_context(|| format!("criteria file {} is not a criteria object or array", path.display()))?;
    Ok(input.into_list())
}

#[derive(Debug, Clone, Args)]
pub(crate) struct RequestArgs {
    /// Base URL of the appads server.
    #[arg(long, env = "APPADS_SERVER_URL", default_value = "http://localhost:3000")]
    pub server: String,
    /// Store identifier; repeat for several.
    #[arg(long = "id")]
    pub ids: Vec<String>,
    /// File with one identifier per line (`#` starts a comment line).
    #[arg(long)]
    pub ids_file: Option<PathBuf>,
    #[command(flatten)]
    pub criteria: CriteriaArgs,
}

/// A request body that passed local validation, with the number of
/// results the server should send back.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub body: ExtractRequest,
    pub expected: usize,
}

impl RequestArgs {
    pub(crate) fn prepare(&self) -> anyhow::Result<PreparedRequest> {
        let mut identifiers = self.ids.clone();
        if let Some(path) = &self.ids_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read identifier file {}", path.display()))?;
            identifiers.extend(identifier_lines(&text));
        }
        if identifiers.is_empty() {
            anyhow::bail!("no identifiers given; use --id or --ids-file");
        }

        let criteria = self.criteria.load()?;
        let request = ExtractRequest {
            identifiers,
            filter_criteria: Some(CriteriaInput::Many(criteria)),
        };
        // The server enforces its own limit; locally only shape is checked.
        let validated = validate_request(request, usize::MAX)?;

        let body = ExtractRequest {
            identifiers: validated
                .identifiers
                .iter()
                .map(|id| id.as_str().to_owned())
                .collect(),
            filter_criteria: (!validated.criteria.is_empty())
                .then(|| CriteriaInput::Many(validated.criteria)),
        };
        Ok(PreparedRequest {
            expected: body.identifiers.len(),
            body,
        })
    }
}

fn identifier_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
}
