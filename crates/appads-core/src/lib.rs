pub mod app_config;
pub mod config;
pub mod criteria;
pub mod error;
pub mod identifier;
pub mod result;
pub mod run;
pub mod validation;

pub use app_config::{AppConfig, Environment, ResolverSource, MAX_CONCURRENCY_LIMIT};
pub use config::{load_app_config, load_app_config_from_env};
pub use criteria::{normalize_criteria, CriteriaInput, FilterCriteria, RELATIONSHIPS};
pub use error::{ConfigError, CoreError};
pub use identifier::Identifier;
pub use result::{
    Declaration, DeclarationStatus, LookupOutcome, LookupResult, LookupResultWire, MatchInfo,
    MatchedLine, StoreType, TermResult,
};
pub use run::RunState;
pub use validation::{validate_request, ExtractRequest, ValidatedRequest};
