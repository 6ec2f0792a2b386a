//! In-memory repository.
//!
//! Backs the CLI (seeded from a JSON catalog) and the test suites. Entities
//! are kept in `BTreeMap`s so every listing comes back in id order.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use drugquery_chem::canonicalize;
use drugquery_common::{
    BestResult, Compound, CompoundId, Docking, DockingId, Gene, GeneId, Job, Pocket, PocketId,
    ProteinStructure, StructureId, Target, TargetId, Upload, UploadId,
};

use crate::catalog::Catalog;
use crate::error::{DbError, Result};
use crate::repository::{EntityCounts, Repository};

#[derive(Debug, Default)]
struct Store {
    genes: BTreeMap<GeneId, Gene>,
    structures: BTreeMap<StructureId, ProteinStructure>,
    targets: BTreeMap<TargetId, Target>,
    pockets: BTreeMap<PocketId, Pocket>,
    compounds: BTreeMap<CompoundId, Compound>,
    /// canonical SMILES → compound
    smiles_index: HashMap<String, CompoundId>,
    dockings: BTreeMap<DockingId, Docking>,
    uploads: BTreeMap<UploadId, Upload>,
    jobs: Vec<Job>,
    next_id: i64,
}

impl Store {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// `Repository` over process memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
    snapshot_writes: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from a catalog, keeping the catalog's ids.
    pub fn from_catalog(catalog: Catalog) -> Result<Self> {
        let mut store = Store::default();
        let mut max_id = 0;

        macro_rules! load {
            ($items:expr, $map:expr, $kind:literal) => {
                for item in $items {
                    max_id = max_id.max(item.id);
                    if $map.insert(item.id, item).is_some() {
                        return Err(DbError::Duplicate(format!("{} id in catalog", $kind)));
                    }
                }
            };
        }

        load!(catalog.genes, store.genes, "gene");
        load!(catalog.structures, store.structures, "structure");
        load!(catalog.targets, store.targets, "target");
        load!(catalog.pockets, store.pockets, "pocket");
        load!(catalog.compounds, store.compounds, "compound");
        load!(catalog.dockings, store.dockings, "docking");
        load!(catalog.uploads, store.uploads, "upload");

        for compound in store.compounds.values() {
            let key = smiles_key(&compound.smiles);
            if store.smiles_index.insert(key, compound.id).is_some() {
                return Err(DbError::Duplicate(format!("compound smiles {}", compound.smiles)));
            }
        }

        store.jobs = catalog.jobs;
        store.next_id = max_id;

        Ok(Self {
            store: RwLock::new(store),
            snapshot_writes: AtomicUsize::new(0),
        })
    }

    /// Export the current contents as a catalog.
    pub async fn to_catalog(&self) -> Catalog {
        let store = self.store.read().await;
        Catalog {
            genes: store.genes.values().cloned().collect(),
            structures: store.structures.values().cloned().collect(),
            targets: store.targets.values().cloned().collect(),
            pockets: store.pockets.values().cloned().collect(),
            compounds: store.compounds.values().cloned().collect(),
            dockings: store.dockings.values().cloned().collect(),
            uploads: store.uploads.values().cloned().collect(),
            jobs: store.jobs.clone(),
        }
    }

    /// Number of `save_best_result` calls served so far.
    pub fn snapshot_write_count(&self) -> usize {
        self.snapshot_writes.load(Ordering::SeqCst)
    }
}

/// Key a compound is stored under: its canonical SMILES, or the trimmed
/// text when it does not parse.
fn smiles_key(smiles: &str) -> String {
    canonicalize(smiles).unwrap_or_else(|_| smiles.trim().to_string())
}

fn lookup<T: Clone>(map: &BTreeMap<i64, T>, kind: &str, id: i64) -> Result<T> {
    map.get(&id).cloned().ok_or_else(|| DbError::not_found(kind, id))
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn gene(&self, id: GeneId) -> Result<Gene> {
        lookup(&self.store.read().await.genes, "gene", id)
    }

    async fn gene_by_name(&self, name: &str) -> Result<Gene> {
        let store = self.store.read().await;
        store
            .genes
            .values()
            .find(|g| g.name == name)
            .cloned()
            .ok_or_else(|| DbError::not_found("gene", name))
    }

    async fn structure(&self, id: StructureId) -> Result<ProteinStructure> {
        lookup(&self.store.read().await.structures, "structure", id)
    }

    async fn target(&self, id: TargetId) -> Result<Target> {
        lookup(&self.store.read().await.targets, "target", id)
    }

    async fn pocket(&self, id: PocketId) -> Result<Pocket> {
        lookup(&self.store.read().await.pockets, "pocket", id)
    }

    async fn docking(&self, id: DockingId) -> Result<Docking> {
        lookup(&self.store.read().await.dockings, "docking", id)
    }

    async fn compound(&self, id: CompoundId) -> Result<Compound> {
        lookup(&self.store.read().await.compounds, "compound", id)
    }

    async fn compound_by_smiles(&self, smiles: &str) -> Result<Option<Compound>> {
        let key = smiles_key(smiles);
        let store = self.store.read().await;
        Ok(store
            .smiles_index
            .get(&key)
            .and_then(|id| store.compounds.get(id))
            .cloned())
    }

    async fn upload(&self, id: UploadId) -> Result<Upload> {
        lookup(&self.store.read().await.uploads, "upload", id)
    }

    async fn compounds(&self) -> Result<Vec<Compound>> {
        Ok(self.store.read().await.compounds.values().cloned().collect())
    }

    async fn dockings_for_compound(&self, compound_id: CompoundId) -> Result<Vec<Docking>> {
        let store = self.store.read().await;
        Ok(store
            .dockings
            .values()
            .filter(|d| d.compound_id == compound_id)
            .cloned()
            .collect())
    }

    async fn genes(&self) -> Result<Vec<Gene>> {
        Ok(self.store.read().await.genes.values().cloned().collect())
    }

    async fn targets(&self) -> Result<Vec<Target>> {
        Ok(self.store.read().await.targets.values().cloned().collect())
    }

    async fn jobs(&self) -> Result<Vec<Job>> {
        Ok(self.store.read().await.jobs.clone())
    }

    async fn counts(&self) -> Result<EntityCounts> {
        let store = self.store.read().await;
        Ok(EntityCounts {
            genes: store.genes.len(),
            targets: store.targets.len(),
            pockets: store.pockets.len(),
            compounds: store.compounds.len(),
        })
    }

    async fn insert_gene(&self, name: &str) -> Result<Gene> {
        let mut store = self.store.write().await;
        if store.genes.values().any(|g| g.name == name) {
            return Err(DbError::Duplicate(format!("gene {name}")));
        }
        let gene = Gene { id: store.allocate_id(), name: name.to_string() };
        store.genes.insert(gene.id, gene.clone());
        Ok(gene)
    }

    async fn insert_structure(&self, gene_id: GeneId, pdb_code: &str) -> Result<ProteinStructure> {
        let mut store = self.store.write().await;
        let structure = ProteinStructure {
            id: store.allocate_id(),
            gene_id,
            pdb_code: pdb_code.to_string(),
        };
        store.structures.insert(structure.id, structure.clone());
        Ok(structure)
    }

    async fn insert_target(
        &self,
        structure_id: StructureId,
        name: &str,
        target_file: PathBuf,
    ) -> Result<Target> {
        let mut store = self.store.write().await;
        let target = Target {
            id: store.allocate_id(),
            structure_id,
            name: name.to_string(),
            target_file,
        };
        store.targets.insert(target.id, target.clone());
        Ok(target)
    }

    async fn insert_pocket(&self, target_id: TargetId, index: u32) -> Result<Pocket> {
        let mut store = self.store.write().await;
        let pocket = Pocket { id: store.allocate_id(), target_id, index };
        store.pockets.insert(pocket.id, pocket.clone());
        Ok(pocket)
    }

    async fn insert_compound(&self, smiles: &str, name: Option<&str>) -> Result<Compound> {
        let key = smiles_key(smiles);
        let mut store = self.store.write().await;
        if store.smiles_index.contains_key(&key) {
            return Err(DbError::Duplicate(format!("compound smiles {key}")));
        }
        let mut compound = Compound::new(store.allocate_id(), &key);
        compound.name = name.map(str::to_string);
        store.smiles_index.insert(key, compound.id);
        store.compounds.insert(compound.id, compound.clone());
        debug!(compound_id = compound.id, smiles = %compound.smiles, "Inserted compound");
        Ok(compound)
    }

    async fn set_structure_file(&self, compound_id: CompoundId, path: PathBuf) -> Result<()> {
        let mut store = self.store.write().await;
        let compound = store
            .compounds
            .get_mut(&compound_id)
            .ok_or_else(|| DbError::not_found("compound", compound_id))?;
        compound.structure_file = Some(path);
        Ok(())
    }

    async fn set_score_file(&self, compound_id: CompoundId, path: PathBuf) -> Result<()> {
        let mut store = self.store.write().await;
        let compound = store
            .compounds
            .get_mut(&compound_id)
            .ok_or_else(|| DbError::not_found("compound", compound_id))?;
        compound.score_file = Some(path);
        Ok(())
    }

    async fn insert_docking(
        &self,
        compound_id: CompoundId,
        pocket_id: PocketId,
        top_score: f64,
        docking_file: PathBuf,
    ) -> Result<Docking> {
        if !top_score.is_finite() {
            return Err(DbError::InvalidQuery(format!("non-finite top_score {top_score}")));
        }
        let mut store = self.store.write().await;
        let compound = store
            .compounds
            .get_mut(&compound_id)
            .ok_or_else(|| DbError::not_found("compound", compound_id))?;
        if compound.best == BestResult::NoDockings {
            compound.best = BestResult::Unresolved;
        }
        let docking = Docking {
            id: store.allocate_id(),
            compound_id,
            pocket_id,
            top_score,
            docking_file,
        };
        store.dockings.insert(docking.id, docking.clone());
        Ok(docking)
    }

    async fn delete_docking(&self, id: DockingId) -> Result<Docking> {
        let mut store = self.store.write().await;
        let docking = store
            .dockings
            .remove(&id)
            .ok_or_else(|| DbError::not_found("docking", id))?;

        for compound in store.compounds.values_mut() {
            if compound.best.references_docking(id) {
                debug!(compound_id = compound.id, docking_id = id, "Invalidating best result");
                compound.best = BestResult::Unresolved;
            }
        }
        Ok(docking)
    }

    async fn insert_upload(&self, smiles: &str, email: &str) -> Result<Upload> {
        let mut store = self.store.write().await;
        let upload = Upload {
            id: store.allocate_id(),
            smiles: smiles.trim().to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        store.uploads.insert(upload.id, upload.clone());
        Ok(upload)
    }

    async fn create_job(&self, compound_id: CompoundId, email: &str) -> Result<Job> {
        let mut store = self.store.write().await;
        if !store.compounds.contains_key(&compound_id) {
            return Err(DbError::not_found("compound", compound_id));
        }
        let job = Job::new(compound_id, email);
        store.jobs.push(job.clone());
        Ok(job)
    }

    async fn save_best_result(&self, compound_id: CompoundId, best: &BestResult) -> Result<()> {
        let mut store = self.store.write().await;
        let compound = store
            .compounds
            .get_mut(&compound_id)
            .ok_or_else(|| DbError::not_found("compound", compound_id))?;
        compound.best = best.clone();
        self.snapshot_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_best_result(&self, compound_id: CompoundId) -> Result<()> {
        let mut store = self.store.write().await;
        let compound = store
            .compounds
            .get_mut(&compound_id)
            .ok_or_else(|| DbError::not_found("compound", compound_id))?;
        compound.best = BestResult::Unresolved;
        Ok(())
    }
}
