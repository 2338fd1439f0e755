use anyhow::Context;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::{FetchError, Result};

/// Directory holding transient output files
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the staging directory if it is missing. Idempotent.
    pub fn ensure(&self) -> Result<()> {
        fs_err::create_dir_all(&self.dir)
            .map_err(|e| FetchError::Staging(e.to_string()))
            .with_context(|| {
                format!("Failed to prepare staging directory {}", self.dir.display())
            })?;

        tracing::debug!(dir = %self.dir.display(), "Staging directory ready");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Claim a fresh unique id for one acquisition
    pub fn reserve(&self) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            dir: self.dir.clone(),
            committed: false,
        }
    }

    /// Names of all regular files currently staged
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs_err::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// A claimed output name that has not produced a file yet.
///
/// Dropping an uncommitted reservation removes every staged file whose name starts
/// with the reserved id, which covers failed and cancelled acquisitions that left
/// `.part` or intermediate files behind.
#[derive(Debug)]
pub struct Reservation {
    id: Uuid,
    dir: PathBuf,
    committed: bool,
}

impl Reservation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// yt-dlp output template, e.g. `/tmp/downloads/<id>.%(ext)s`
    pub fn output_template(&self) -> String {
        self.dir
            .join(format!("{}.%(ext)s", self.id))
            .to_string_lossy()
            .into_owned()
    }

    /// Path for this reservation with a concrete extension
    pub fn path_with_extension(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.id, extension))
    }

    /// Find a produced file named `<id>.<ext>` in the staging directory
    pub fn find_output(&self) -> Option<PathBuf> {
        let prefix = format!("{}.", self.id);
        fs_err::read_dir(&self.dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with(&prefix) && !name.ends_with(".part"))
                    .unwrap_or(false)
            })
    }

    /// Hand ownership of the produced file to a [`StagedFile`] guard
    pub fn commit(mut self, path: PathBuf) -> StagedFile {
        self.committed = true;
        StagedFile { path }
    }

    fn sweep(&self) {
        let prefix = self.id.to_string();
        let entries = match fs_err::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to scan staging directory: {}", e);
                }
                return;
            }
        };

        for entry in entries.filter_map(|entry| entry.ok()) {
            let matches = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(&prefix))
                .unwrap_or(false);
            if matches {
                remove_quietly(&entry.path());
            }
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            self.sweep();
        }
    }
}

/// A produced file owned by exactly one request. Deleted on drop.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Server-computed download name, e.g. `3f2c...e1.mp3`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download.bin".to_string())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        remove_quietly(&self.path);
    }
}

fn remove_quietly(path: &Path) {
    match fs_err::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed staged file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove staged file: {}", e),
    }
}
