//! drugquery-agent: Request-level operations over the DrugQuery engine.
//!
//! `DrugQueryService` ties the repository, the best-result resolver, the
//! score table parser, the similarity search engine and the exporter
//! together behind the operations a front end calls.

pub mod service;

pub use service::{user_message, CompoundDetail, DrugQueryService, GeneDetail, UploadOutcome};
