//! Lookup collaborators: store resolution and declaration retrieval, plus the
//! per-identifier pipeline that combines them with the match engine.

pub mod client;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod resolver;
mod retry;

pub use client::HttpSettings;
pub use domain::normalize_domain;
pub use error::LookupError;
pub use fetcher::{DeclarationFetcher, FetchedDeclaration, HttpDeclarationFetcher};
pub use pipeline::LookupPipeline;
pub use resolver::{HttpStoreResolver, ResolvedApp, StaticStoreResolver, StoreResolver};
