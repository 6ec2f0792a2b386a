//! Best docking resolution with a memoized snapshot on the compound.
//!
//! Resolution fills the cache, it never refreshes it: a compound whose
//! snapshot is already set is returned as is, even if dockings were added
//! since. Re-derivation only happens after the snapshot has been cleared
//! (explicitly, or by the repository when a referenced docking is deleted).

use std::sync::Arc;
use tracing::{debug, info};

use drugquery_common::{
    BestResult, BestResultSnapshot, Compound, CompoundId, Docking, DrugQueryError, Result,
};
use drugquery_db::{DbError, Repository};

pub struct BestResultResolver {
    repo: Arc<dyn Repository>,
}

impl BestResultResolver {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Load the compound and resolve it.
    pub async fn resolve_id(&self, compound_id: CompoundId) -> Result<BestResult> {
        let compound = self.repo.compound(compound_id).await?;
        self.resolve(&compound).await
    }

    /// Return the compound's best result, computing and persisting it on a
    /// cache miss. A miss costs exactly one `save_best_result`; a hit costs
    /// no write.
    pub async fn resolve(&self, compound: &Compound) -> Result<BestResult> {
        if !compound.best.is_unresolved() {
            debug!(compound_id = compound.id, "Best result cache hit");
            return Ok(compound.best.clone());
        }

        let dockings = self.repo.dockings_for_compound(compound.id).await?;
        let best = match select_best(&dockings) {
            None => BestResult::NoDockings,
            Some(docking) => {
                BestResult::Resolved(Box::new(self.ancestry(docking.clone()).await?))
            }
        };

        self.repo.save_best_result(compound.id, &best).await?;
        info!(
            compound_id = compound.id,
            dockings = dockings.len(),
            best_docking = ?best.snapshot().map(|s| s.docking.id),
            "Resolved best result"
        );
        Ok(best)
    }

    /// Walk docking → pocket → target → structure → gene, failing at the
    /// first missing link.
    async fn ancestry(&self, docking: Docking) -> Result<BestResultSnapshot> {
        let docking_id = docking.id;
        let pocket = self
            .repo
            .pocket(docking.pocket_id)
            .await
            .map_err(|e| broken_link(e, docking_id, "pocket"))?;
        let target = self
            .repo
            .target(pocket.target_id)
            .await
            .map_err(|e| broken_link(e, docking_id, "target"))?;
        let structure = self
            .repo
            .structure(target.structure_id)
            .await
            .map_err(|e| broken_link(e, docking_id, "structure"))?;
        let gene = self
            .repo
            .gene(structure.gene_id)
            .await
            .map_err(|e| broken_link(e, docking_id, "gene"))?;

        Ok(BestResultSnapshot {
            docking,
            pocket,
            target,
            structure,
            gene,
        })
    }
}

/// Lowest `top_score` wins; equal scores go to the lowest docking id.
pub fn select_best(dockings: &[Docking]) -> Option<&Docking> {
    dockings.iter().min_by(|a, b| {
        a.top_score
            .total_cmp(&b.top_score)
            .then_with(|| a.id.cmp(&b.id))
    })
}

fn broken_link(err: DbError, docking_id: i64, hop: &str) -> DrugQueryError {
    if err.is_not_found() {
        DrugQueryError::BrokenAncestry {
            docking_id,
            missing: hop.to_string(),
        }
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn docking(id: i64, score: f64) -> Docking {
        Docking {
            id,
            compound_id: 1,
            pocket_id: 1,
            top_score: score,
            docking_file: PathBuf::from(format!("dockings/{id}.pdbqt")),
        }
    }

    #[test]
    fn test_select_best_picks_minimum() {
        let dockings = vec![docking(1, 3.2), docking(2, 1.1), docking(3, 5.0)];
        assert_eq!(select_best(&dockings).map(|d| d.id), Some(2));
    }

    #[test]
    fn test_select_best_ties_go_to_lowest_id() {
        let dockings = vec![docking(7, -4.0), docking(3, -4.0), docking(5, -1.0)];
        assert_eq!(select_best(&dockings).map(|d| d.id), Some(3));
    }

    #[test]
    fn test_select_best_handles_negative_scores() {
        let dockings = vec![docking(1, -6.5), docking(2, -9.1), docking(3, 0.0)];
        assert_eq!(select_best(&dockings).map(|d| d.id), Some(2));
    }

    #[test]
    fn test_select_best_empty() {
        assert!(select_best(&[]).is_none());
    }
}
