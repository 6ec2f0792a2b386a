//! Request-level operations.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use drugquery_chem::{canonical_smiles, parse_smiles, to_mol_block, SimilarityHit, SimilaritySearchEngine};
use drugquery_common::{
    BestResult, Compound, CompoundId, Config, DrugQueryError, Gene, Job, Result, Target, UploadId,
};
use drugquery_db::{DbError, EntityCounts, Repository};
use drugquery_export::{DownloadResponse, ResultExporter, SelectionPolicy};
use drugquery_ranker::{BestResultResolver, Predictions, ScoreTableParser};

/// Everything the compound page shows.
#[derive(Debug, Clone, Serialize)]
pub struct CompoundDetail {
    pub compound: Compound,
    pub best: BestResult,
    pub predictions: Predictions,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneDetail {
    pub gene: Gene,
    pub targets: Vec<Target>,
}

/// Result of validating an upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub compound: Compound,
    pub job: Job,
    /// False when the upload matched an existing compound.
    pub created: bool,
}

pub struct DrugQueryService {
    config: Config,
    repo: Arc<dyn Repository>,
    resolver: BestResultResolver,
    scores: ScoreTableParser,
    search: SimilaritySearchEngine,
    exporter: ResultExporter,
}

impl DrugQueryService {
    pub fn new(config: Config, repo: Arc<dyn Repository>) -> Self {
        Self {
            resolver: BestResultResolver::new(repo.clone()),
            scores: ScoreTableParser::new(config.scores.clone(), config.storage.media_root.clone()),
            search: SimilaritySearchEngine::new(config.search.clone()),
            exporter: ResultExporter::new(repo.clone(), &config),
            config,
            repo,
        }
    }

    /// Swap the exporter, e.g. to pin its clock.
    pub fn with_exporter(mut self, exporter: ResultExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Overview & listings ─────────────────────────────────────────────────

    pub async fn stats(&self) -> Result<EntityCounts> {
        Ok(self.repo.counts().await?)
    }

    pub async fn compounds(&self) -> Result<Vec<Compound>> {
        Ok(self.repo.compounds().await?)
    }

    /// Jobs, newest first.
    pub async fn jobs(&self) -> Result<Vec<Job>> {
        let mut jobs = self.repo.jobs().await?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Genes ordered by name.
    pub async fn genes(&self) -> Result<Vec<Gene>> {
        let mut genes = self.repo.genes().await?;
        genes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genes)
    }

    /// A gene and the targets derived from its structures.
    pub async fn gene_detail(&self, name: &str) -> Result<GeneDetail> {
        let gene = self.repo.gene_by_name(name).await?;
        let mut targets = Vec::new();
        for target in self.repo.targets().await? {
            let structure = self.repo.structure(target.structure_id).await?;
            if structure.gene_id == gene.id {
                targets.push(target);
            }
        }
        Ok(GeneDetail { gene, targets })
    }

    // ── Compound page ───────────────────────────────────────────────────────

    /// Resolve the best result and read the score table. A corrupt score
    /// file is shown as "no predictions" rather than failing the page.
    pub async fn compound_detail(&self, compound_id: CompoundId) -> Result<CompoundDetail> {
        let mut compound = self.repo.compound(compound_id).await?;
        let best = self.resolver.resolve(&compound).await?;
        compound.best = best.clone();

        let predictions = match self.scores.parse(compound.score_file.as_deref()).await {
            Ok(predictions) => predictions,
            Err(e @ DrugQueryError::CorruptScoreFile { .. }) => {
                warn!(compound_id, error = %e, "Ignoring corrupt score file");
                Predictions::NoPredictions
            }
            Err(e) => return Err(e),
        };

        Ok(CompoundDetail {
            compound,
            best,
            predictions,
        })
    }

    pub async fn resolve(&self, compound_id: CompoundId) -> Result<BestResult> {
        self.resolver.resolve_id(compound_id).await
    }

    /// Score table without the corrupt-file fallback.
    pub async fn scores(&self, compound_id: CompoundId) -> Result<Predictions> {
        let compound = self.repo.compound(compound_id).await?;
        self.scores.parse(compound.score_file.as_deref()).await
    }

    // ── Search ──────────────────────────────────────────────────────────────

    /// Rank every stored compound against `query`.
    pub async fn search_compounds(&self, query: &str) -> Result<Vec<SimilarityHit>> {
        // validate before loading the corpus
        self.search.fingerprint(query)?;
        let corpus = self.repo.compounds().await?;
        self.search.search(query, &corpus)
    }

    // ── Uploads & jobs ──────────────────────────────────────────────────────

    /// Record an upload and validate it in one step.
    pub async fn submit_upload(&self, smiles: &str, email: &str) -> Result<UploadOutcome> {
        let upload = self.repo.insert_upload(smiles, email).await?;
        self.validate_upload(upload.id).await
    }

    /// Turn an upload into a compound (reusing one that is the same molecule,
    /// however it was spelled) and queue a docking job for it.
    pub async fn validate_upload(&self, upload_id: UploadId) -> Result<UploadOutcome> {
        let upload = self.repo.upload(upload_id).await?;
        let molecule = parse_smiles(&upload.smiles)?;
        let smiles = canonical_smiles(&molecule);

        let (compound, created) = match self.repo.compound_by_smiles(&smiles).await? {
            Some(existing) => (existing, false),
            None => match self.repo.insert_compound(&smiles, None).await {
                Ok(compound) => {
                    let compound = self.initialize(compound, &molecule).await?;
                    (compound, true)
                }
                // lost a race with another upload of the same molecule
                Err(DbError::Duplicate(_)) => {
                    let existing = self
                        .repo
                        .compound_by_smiles(&smiles)
                        .await?
                        .ok_or_else(|| DrugQueryError::NotFound(format!("compound {smiles}")))?;
                    (existing, false)
                }
                Err(e) => return Err(e.into()),
            },
        };

        let job = self.repo.create_job(compound.id, &upload.email).await?;
        info!(upload_id, compound_id = compound.id, created, job = %job.id, "Upload validated");
        Ok(UploadOutcome { compound, job, created })
    }

    /// Queue another docking run for an existing compound.
    pub async fn redock_compound(&self, compound_id: CompoundId) -> Result<Job> {
        self.repo.compound(compound_id).await?;
        let job = self
            .repo
            .create_job(compound_id, &self.config.jobs.redock_contact)
            .await?;
        info!(compound_id, job = %job.id, "Re-dock queued");
        Ok(job)
    }

    /// Write the compound's canonical structure file and record it.
    async fn initialize(
        &self,
        mut compound: Compound,
        molecule: &drugquery_chem::Molecule,
    ) -> Result<Compound> {
        let relative = PathBuf::from("compounds").join(format!("{}.mol", compound.file_stem()));
        let path = self.config.storage.media_root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, to_mol_block(molecule, &compound.smiles)).await?;
        self.repo.set_structure_file(compound.id, relative.clone()).await?;
        debug!(compound_id = compound.id, path = %path.display(), "Wrote structure file");

        compound.structure_file = Some(relative);
        Ok(compound)
    }

    // ── Downloads ───────────────────────────────────────────────────────────

    pub async fn download_scores(&self, compound_id: CompoundId) -> Result<DownloadResponse> {
        let compound = self.repo.compound(compound_id).await?;
        self.download_media(compound.score_file.as_deref(), "score file", compound_id)
            .await
    }

    pub async fn download_structure(&self, compound_id: CompoundId) -> Result<DownloadResponse> {
        let compound = self.repo.compound(compound_id).await?;
        self.download_media(compound.structure_file.as_deref(), "structure file", compound_id)
            .await
    }

    /// Archive of the configured number of best dockings.
    pub async fn download_top_dockings(&self, compound_id: CompoundId) -> Result<DownloadResponse> {
        self.exporter
            .export_download(compound_id, self.exporter.top_policy())
            .await
    }

    pub async fn download_all_dockings(&self, compound_id: CompoundId) -> Result<DownloadResponse> {
        self.exporter
            .export_download(compound_id, SelectionPolicy::All)
            .await
    }

    /// Export with an explicit policy and return the archive path.
    pub async fn export(&self, compound_id: CompoundId, policy: SelectionPolicy) -> Result<PathBuf> {
        self.exporter.export(compound_id, policy).await
    }

    async fn download_media(
        &self,
        relative: Option<&Path>,
        what: &str,
        compound_id: CompoundId,
    ) -> Result<DownloadResponse> {
        let relative = relative
            .ok_or_else(|| DrugQueryError::NotFound(format!("{what} for compound {compound_id}")))?;
        DownloadResponse::open(self.config.storage.media_root.join(relative)).await
    }
}

/// Message to show an end user for a failed request.
pub fn user_message(err: &DrugQueryError) -> String {
    match err {
        DrugQueryError::InvalidQueryStructure(_) => {
            "Error: query is not a valid SMILES string".to_string()
        }
        DrugQueryError::NotFound(what) => format!("Not found: {what}"),
        DrugQueryError::ExportConflict(_) => {
            "Another export of this compound is in progress, try again in a moment".to_string()
        }
        DrugQueryError::CorruptScoreFile { .. } => "Predictions for this compound are unreadable".to_string(),
        DrugQueryError::BrokenAncestry { .. } | DrugQueryError::InvalidTargetName(_) => {
            "The stored docking data for this compound is inconsistent".to_string()
        }
        other => format!("Internal error: {other}"),
    }
}
