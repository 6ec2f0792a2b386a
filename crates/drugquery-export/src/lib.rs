//! drugquery-export: Per-compound docking export archives and downloads.
//!
//! An export selects a compound's dockings, lays them out in a scratch
//! directory with one folder per target, zips that directory next to itself
//! and removes the scratch tree. Downloads wrap a file handle with the
//! headers a browser needs to save it.

pub mod archive;
pub mod download;
pub mod exporter;

pub use download::{DownloadResponse, FORCE_DOWNLOAD};
pub use exporter::{group_by_target, Clock, ResultExporter, SelectionPolicy, SystemClock, TargetGroup};
