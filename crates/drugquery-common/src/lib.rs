//! drugquery-common: Shared types, errors, and configuration used across all DrugQuery crates.

pub mod config;
pub mod entities;
pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use entities::{
    BestResult, BestResultSnapshot, Compound, CompoundId, Docking, DockingId, Gene, GeneId, Job,
    Pocket, PocketId, ProteinStructure, StructureId, Target, TargetId, Upload, UploadId,
};
pub use error::{DrugQueryError, Result};
