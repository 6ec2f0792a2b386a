//! Grouped export of a compound's docking artifacts.
//!
//! Layout of the produced archive, `<compound>__<timestamp>.zip`:
//!
//! ```text
//! T1/
//!     T1.pdb            reference structure, once per target
//!     phenol_1.pdbqt    one file per selected docking
//! T2/
//!     ...
//! ```
//!
//! The scratch directory the archive is built from lives under the tmp root
//! and is removed once the archive is written, or as soon as any step fails.

use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use drugquery_common::config::ExportConfig;
use drugquery_common::{
    Compound, CompoundId, Config, Docking, DrugQueryError, Result, Target, TargetId,
};
use drugquery_db::{DbError, Repository};

use crate::archive::zip_directory;
use crate::download::DownloadResponse;

/// Which dockings of a compound go into an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    All,
    /// The `n` lowest-scoring dockings; equal scores keep docking id order.
    TopN(usize),
}

/// Source of the timestamp embedded in export names.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// One target directory of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGroup {
    pub target: Target,
    pub dockings: Vec<Docking>,
}

/// Sort `(target, docking)` pairs by target name, then collect each
/// contiguous run of one target into a group.
///
/// The sort has to come first: grouping contiguous runs of an unsorted list
/// would split a target into several groups.
pub fn group_by_target(mut pairs: Vec<(Target, Docking)>) -> Vec<TargetGroup> {
    pairs.sort_by(|(ta, da), (tb, db)| {
        ta.name
            .cmp(&tb.name)
            .then(ta.id.cmp(&tb.id))
            .then(da.top_score.total_cmp(&db.top_score))
            .then(da.id.cmp(&db.id))
    });

    let mut groups: Vec<TargetGroup> = Vec::new();
    for (target, docking) in pairs {
        match groups.last_mut() {
            Some(group) if group.target.id == target.id => group.dockings.push(docking),
            _ => groups.push(TargetGroup {
                target,
                dockings: vec![docking],
            }),
        }
    }
    groups
}

pub struct ResultExporter {
    repo: Arc<dyn Repository>,
    config: ExportConfig,
    media_root: PathBuf,
    tmp_root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ResultExporter {
    pub fn new(repo: Arc<dyn Repository>, config: &Config) -> Self {
        Self {
            repo,
            config: config.export.clone(),
            media_root: config.storage.media_root.clone(),
            tmp_root: config.storage.tmp_root.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configured "top dockings" policy.
    pub fn top_policy(&self) -> SelectionPolicy {
        SelectionPolicy::TopN(self.config.top_n)
    }

    /// Build the export archive for `compound_id` and return its path.
    pub async fn export(&self, compound_id: CompoundId, policy: SelectionPolicy) -> Result<PathBuf> {
        let compound = self.repo.compound(compound_id).await?;
        let groups = self.plan(&compound, policy).await?;

        let stamp = self.config.stamp(&self.clock.now())?;
        let base = format!("{}__{}", compound.file_stem(), stamp);
        let work_dir = self.tmp_root.join(&base);
        let archive = self.tmp_root.join(format!("{base}.zip"));

        tokio::fs::create_dir_all(&self.tmp_root).await?;
        if tokio::fs::try_exists(&archive).await? {
            return Err(DrugQueryError::ExportConflict(archive));
        }
        // create_dir, not create_dir_all: an existing directory means another
        // export owns this name
        match tokio::fs::create_dir(&work_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DrugQueryError::ExportConflict(work_dir));
            }
            Err(e) => return Err(e.into()),
        }
        debug!(compound_id, dir = %work_dir.display(), "Created export directory");

        match self.finish_export(&groups, &work_dir, &archive).await {
            Ok(files) => {
                info!(
                    compound_id,
                    targets = groups.len(),
                    files,
                    archive = %archive.display(),
                    "Export archive written"
                );
                Ok(archive)
            }
            Err(e) => {
                warn!(compound_id, error = %e, "Export aborted");
                Err(e)
            }
        }
    }

    /// Copy the groups into `work_dir`, zip it to `archive` and remove
    /// `work_dir` whatever happened. An archive that appeared in the meantime
    /// is another export's and is never touched.
    async fn finish_export(
        &self,
        groups: &[TargetGroup],
        work_dir: &Path,
        archive: &Path,
    ) -> Result<usize> {
        let zipped = match self.materialize(groups, work_dir).await {
            Ok(()) => compress(work_dir, archive).await,
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
            warn!(dir = %work_dir.display(), error = %e, "Failed to remove export directory");
        }
        zipped
    }

    /// Export and open the archive for streaming.
    pub async fn export_download(
        &self,
        compound_id: CompoundId,
        policy: SelectionPolicy,
    ) -> Result<DownloadResponse> {
        let archive = self.export(compound_id, policy).await?;
        DownloadResponse::open(archive).await
    }

    /// Select dockings, attach their targets and group them. Every conflict
    /// is detected here, before anything touches the disk.
    async fn plan(&self, compound: &Compound, policy: SelectionPolicy) -> Result<Vec<TargetGroup>> {
        let dockings = select(self.repo.dockings_for_compound(compound.id).await?, policy);

        let mut targets: HashMap<TargetId, Target> = HashMap::new();
        let mut pairs = Vec::with_capacity(dockings.len());
        for docking in dockings {
            let pocket = self
                .repo
                .pocket(docking.pocket_id)
                .await
                .map_err(|e| broken_link(e, docking.id, "pocket"))?;
            let target = match targets.get(&pocket.target_id) {
                Some(target) => target.clone(),
                None => {
                    let target = self
                        .repo
                        .target(pocket.target_id)
                        .await
                        .map_err(|e| broken_link(e, docking.id, "target"))?;
                    targets.insert(target.id, target.clone());
                    target
                }
            };
            pairs.push((target, docking));
        }

        let groups = group_by_target(pairs);
        check_layout(&groups, &self.tmp_root)?;
        Ok(groups)
    }

    async fn materialize(&self, groups: &[TargetGroup], work_dir: &Path) -> Result<()> {
        for group in groups {
            let dir = work_dir.join(&group.target.name);
            tokio::fs::create_dir(&dir).await?;

            self.copy_into(&group.target.target_file, &dir).await?;
            for docking in &group.dockings {
                self.copy_into(&docking.docking_file, &dir).await?;
            }
            debug!(target = %group.target.name, dockings = group.dockings.len(), "Copied target group");
        }
        Ok(())
    }

    async fn copy_into(&self, relative: &Path, dir: &Path) -> Result<()> {
        let src = self.media_root.join(relative);
        let dest = dir.join(file_name(relative)?);
        tokio::fs::copy(&src, &dest).await.map_err(|e| {
            warn!(src = %src.display(), error = %e, "Copy failed");
            DrugQueryError::Io(e)
        })?;
        Ok(())
    }
}

fn select(mut dockings: Vec<Docking>, policy: SelectionPolicy) -> Vec<Docking> {
    if let SelectionPolicy::TopN(n) = policy {
        dockings.sort_by(|a, b| a.top_score.total_cmp(&b.top_score).then(a.id.cmp(&b.id)));
        dockings.truncate(n);
    }
    dockings
}

async fn compress(work_dir: &Path, archive: &Path) -> Result<usize> {
    let src = work_dir.to_path_buf();
    let dest = archive.to_path_buf();
    tokio::task::spawn_blocking(move || zip_directory(&src, &dest))
        .await
        .map_err(|e| DrugQueryError::Archive(format!("archive task failed: {e}")))?
}

/// Reject layouts that would make two files or directories collide.
fn check_layout(groups: &[TargetGroup], tmp_root: &Path) -> Result<()> {
    let mut dir_names = HashSet::new();
    for group in groups {
        let name = &group.target.name;
        if !group.target.has_filesystem_safe_name() {
            return Err(DrugQueryError::InvalidTargetName(name.clone()));
        }
        if !dir_names.insert(name.as_str()) {
            return Err(DrugQueryError::ExportConflict(tmp_root.join(name)));
        }

        let mut file_names = HashSet::new();
        let files = std::iter::once(&group.target.target_file)
            .chain(group.dockings.iter().map(|d| &d.docking_file));
        for file in files {
            let base = file_name(file)?;
            if !file_names.insert(base.clone()) {
                return Err(DrugQueryError::ExportConflict(Path::new(name).join(base)));
            }
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DrugQueryError::NotFound(format!("file name in {}", path.display())))
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
