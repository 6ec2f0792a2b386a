//! Zip archiving of a directory tree.
//!
//! Blocking; callers on the runtime go through `spawn_blocking`.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use drugquery_common::{DrugQueryError, Result};

/// Compress the contents of `src` into a new zip file at `dest`.
///
/// Entry names are relative to `src`, so the archive's top level mirrors the
/// directory's children. Entries are written in name order. Returns the
/// number of files stored.
///
/// An existing `dest` belongs to someone else: it is left alone and reported
/// as `ExportConflict`. A partial archive this call created is removed when
/// writing fails.
pub fn zip_directory(src: &Path, dest: &Path) -> Result<usize> {
    let file = match File::options().write(true).create_new(true).open(dest) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(DrugQueryError::ExportConflict(dest.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let written = write_archive(file, src);
    if written.is_err() {
        if let Err(e) = fs::remove_file(dest) {
            warn!(path = %dest.display(), error = %e, "Could not remove partial archive");
        }
    }
    written
}

fn write_archive(file: File, src: &Path) -> Result<usize> {
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let files = add_dir(&mut writer, src, "", options)?;
    writer.finish().map_err(archive_err)?;
    Ok(files)
}

fn add_dir(
    writer: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<usize> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    let mut files = 0;
    for entry in entries {
        let name = format!("{prefix}{}", entry.file_name().to_string_lossy());
        if entry.file_type()?.is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(archive_err)?;
            files += add_dir(writer, &entry.path(), &format!("{name}/"), options)?;
        } else {
            writer.start_file(name, options).map_err(archive_err)?;
            io::copy(&mut File::open(entry.path())?, writer)?;
            files += 1;
        }
    }
    Ok(files)
}

fn archive_err(err: zip::result::ZipError) -> DrugQueryError {
    DrugQueryError::Archive(err.to_string())
}
