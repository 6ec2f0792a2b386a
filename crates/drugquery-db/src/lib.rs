//! DrugQuery Database Layer
//!
//! Defines the `Repository` boundary through which every other crate reads
//! and writes genes, structures, targets, pockets, compounds, dockings,
//! uploads and jobs, together with an in-memory implementation that can be
//! seeded from (and saved back to) a JSON catalog.
//!
//! # Example
//!
//! ```rust,no_run
//! use drugquery_db::{Catalog, InMemoryRepository, Repository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::load("./data/catalog.json").await?;
//!     let repo = InMemoryRepository::from_catalog(catalog)?;
//!     println!("{} compounds", repo.compounds().await?.len());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod memory;
pub mod repository;

pub use catalog::Catalog;
pub use error::{DbError, Result};
pub use memory::InMemoryRepository;
pub use repository::{EntityCounts, Repository};
