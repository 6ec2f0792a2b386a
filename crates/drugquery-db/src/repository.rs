//! Repository boundary for docking entities.
//!
//! Lookups return `Result`s instead of nullable references so that a missing
//! link in the ancestry chain surfaces as an error at the first hop that fails.

use async_trait::async_trait;
use std::path::PathBuf;

use drugquery_common::{
    BestResult, Compound, CompoundId, Docking, DockingId, Gene, GeneId, Job, Pocket, PocketId,
    ProteinStructure, StructureId, Target, TargetId, Upload, UploadId,
};

use crate::error::Result;

/// Entity totals shown on the overview page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityCounts {
    pub genes: usize,
    pub targets: usize,
    pub pockets: usize,
    pub compounds: usize,
}

/// Persistence and querying of docking entities.
#[async_trait]
pub trait Repository: Send + Sync {
    // ── Lookups ──────────────────────────────────────────────────────────────

    async fn gene(&self, id: GeneId) -> Result<Gene>;

    async fn gene_by_name(&self, name: &str) -> Result<Gene>;

    async fn structure(&self, id: StructureId) -> Result<ProteinStructure>;

    async fn target(&self, id: TargetId) -> Result<Target>;

    async fn pocket(&self, id: PocketId) -> Result<Pocket>;

    async fn docking(&self, id: DockingId) -> Result<Docking>;

    async fn compound(&self, id: CompoundId) -> Result<Compound>;

    /// Find a compound by SMILES. Any spelling of the same molecule matches.
    async fn compound_by_smiles(&self, smiles: &str) -> Result<Option<Compound>>;

    async fn upload(&self, id: UploadId) -> Result<Upload>;

    // ── Listings ─────────────────────────────────────────────────────────────

    /// All compounds, in id order.
    async fn compounds(&self) -> Result<Vec<Compound>>;

    /// All dockings of one compound, in id order.
    async fn dockings_for_compound(&self, compound_id: CompoundId) -> Result<Vec<Docking>>;

    async fn genes(&self) -> Result<Vec<Gene>>;

    async fn targets(&self) -> Result<Vec<Target>>;

    async fn jobs(&self) -> Result<Vec<Job>>;

    async fn counts(&self) -> Result<EntityCounts>;

    // ── Writes ───────────────────────────────────────────────────────────────

    async fn insert_gene(&self, name: &str) -> Result<Gene>;

    async fn insert_structure(&self, gene_id: GeneId, pdb_code: &str) -> Result<ProteinStructure>;

    async fn insert_target(
        &self,
        structure_id: StructureId,
        name: &str,
        target_file: PathBuf,
    ) -> Result<Target>;

    async fn insert_pocket(&self, target_id: TargetId, index: u32) -> Result<Pocket>;

    /// Insert a compound under its canonical SMILES. Fails with `Duplicate`
    /// if another spelling of the same molecule is already stored.
    async fn insert_compound(&self, smiles: &str, name: Option<&str>) -> Result<Compound>;

    async fn set_structure_file(&self, compound_id: CompoundId, path: PathBuf) -> Result<()>;

    async fn set_score_file(&self, compound_id: CompoundId, path: PathBuf) -> Result<()>;

    /// Insert a docking. A compound cached as `NoDockings` is reset to
    /// `Unresolved`; a resolved snapshot is left as is (it may go stale).
    async fn insert_docking(
        &self,
        compound_id: CompoundId,
        pocket_id: PocketId,
        top_score: f64,
        docking_file: PathBuf,
    ) -> Result<Docking>;

    /// Delete a docking. Any compound whose snapshot references it is reset
    /// to `Unresolved` in the same write.
    async fn delete_docking(&self, id: DockingId) -> Result<Docking>;

    async fn insert_upload(&self, smiles: &str, email: &str) -> Result<Upload>;

    /// Enqueue a docking job for the external worker.
    async fn create_job(&self, compound_id: CompoundId, email: &str) -> Result<Job>;

    /// Persist a compound's best-result snapshot as one write.
    async fn save_best_result(&self, compound_id: CompoundId, best: &BestResult) -> Result<()>;

    /// Reset a compound's snapshot to `Unresolved` so the next read re-derives it.
    async fn clear_best_result(&self, compound_id: CompoundId) -> Result<()>;
}
