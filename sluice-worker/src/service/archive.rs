//! Archival collaborator
//!
//! Once a summary image exists, every artifact belonging to that image is
//! sorted out of the watched directory into a per-image staging folder, and
//! the staging folder is then promoted into the image database. Both actions
//! are scoped to one image identifier; nothing else in the staging area is
//! touched.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::config::Config;

static IMAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"P\d+-T\d+-R\d+-S\d+(?:-B\d+)?(?:-\d+)?").expect("image id pattern is valid")
});

/// Suffixes of the artifacts that belong in an image's archive folder
const ARCHIVED_SUFFIXES: [&str; 5] = [
    "_8bit_downsampled.v3draw",
    "_8bit.v3draw",
    ".v3draw.8bit",
    "_MIP.tif",
    ".pyramid.h5",
];

const SUMMARY_SUFFIX: &str = "_MIP.tif";

/// Extracts the image identifier (`P<n>-T<n>-R<n>-S<n>[-B<n>][-<n>]`) from a file name
pub fn image_id(file_name: &str) -> Option<&str> {
    IMAGE_ID.find(file_name).map(|m| m.as_str())
}

/// Sample-level identifier: the image id without its trailing tile segment
///
/// A fifth segment is kept only when it is a `B` segment; a sixth segment is
/// always dropped.
pub(crate) fn ptrs_id(image_id: &str) -> String {
    let segments: Vec<&str> = image_id.split('-').collect();
    match segments.len() {
        5 if !segments[4].starts_with('B') => segments[..4].join("-"),
        6 => segments[..5].join("-"),
        _ => image_id.to_string(),
    }
}

fn is_archived_kind(file_name: &str, image_id: &str) -> bool {
    ARCHIVED_SUFFIXES
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
        || file_name == format!("{}.v3draw", image_id)
}

/// File-sorting and directory-promotion actions for one image
///
/// Implementations are synchronous; async callers run them on the blocking
/// pool.
pub trait Archiver: Send + Sync {
    /// Moves the image's artifacts from the watched directory into staging
    ///
    /// # Returns
    /// Number of files moved
    fn sort(&self, image_id: &str) -> Result<usize>;

    /// Moves the image's staging folder into the database
    fn promote(&self, image_id: &str) -> Result<()>;
}

/// Filesystem implementation of Archiver
pub struct FsArchiver {
    watch_dir: PathBuf,
    staging_dir: PathBuf,
    database_dir: PathBuf,
    sample_preparation_dir: PathBuf,
}

impl FsArchiver {
    pub fn new(config: &Config) -> Self {
        Self {
            watch_dir: config.watch_dir.clone(),
            staging_dir: config.archive_staging_dir.clone(),
            database_dir: config.archive_database_dir.clone(),
            sample_preparation_dir: config.sample_preparation_dir.clone(),
        }
    }

    fn copy_to_sample_preparation(&self, source: &Path, image_id: &str) -> Result<()> {
        let dir = self
            .sample_preparation_dir
            .join(ptrs_id(image_id))
            .join(image_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let file_name = source.file_name().context("Summary image has no file name")?;
        let copy = dir.join(file_name);
        if !copy.exists() {
            std::fs::copy(source, &copy).with_context(|| {
                format!("Failed to copy {} to {}", source.display(), dir.display())
            })?;
        }

        Ok(())
    }

    fn sort_file(&self, source: &Path, file_name: &str, image_id: &str) -> Result<()> {
        if file_name.ends_with(SUMMARY_SUFFIX) {
            self.copy_to_sample_preparation(source, image_id)?;
        }

        let target = self.staging_dir.join(image_id);
        std::fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        move_path(source, &target.join(file_name))?;
        debug!("Archived {} into {}", file_name, target.display());

        Ok(())
    }
}

impl Archiver for FsArchiver {
    fn sort(&self, image_id: &str) -> Result<usize> {
        let entries = std::fs::read_dir(&self.watch_dir)
            .with_context(|| format!("Failed to read {}", self.watch_dir.display()))?;

        // A file that cannot be sorted is left in place; the rest still move
        let mut moved = 0;
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            if self::image_id(&file_name) != Some(image_id) || !is_archived_kind(&file_name, image_id)
            {
                continue;
            }

            match self.sort_file(&entry.path(), &file_name, image_id) {
                Ok(()) => moved += 1,
                Err(e) => warn!("Failed to archive {}: {:#}", file_name, e),
            }
        }

        info!("Sorted {} file(s) for image {}", moved, image_id);
        Ok(moved)
    }

    fn promote(&self, image_id: &str) -> Result<()> {
        let staged = self.staging_dir.join(image_id);
        if !staged.is_dir() {
            anyhow::bail!("Nothing staged for image {}", image_id);
        }

        let destination = self.database_dir.join(image_id);
        if !destination.exists() {
            std::fs::create_dir_all(&self.database_dir)
                .with_context(|| format!("Failed to create {}", self.database_dir.display()))?;
            move_path(&staged, &destination)?;
        } else {
            // Merge into an existing database folder, replacing same-named files
            for entry in std::fs::read_dir(&staged)? {
                let entry = entry?;
                move_path(&entry.path(), &destination.join(entry.file_name()))?;
            }
            std::fs::remove_dir(&staged)
                .with_context(|| format!("Failed to remove {}", staged.display()))?;
        }

        info!("Promoted image {} to {}", image_id, destination.display());
        Ok(())
    }
}

/// Renames, falling back to copy-and-delete for files across filesystems
fn move_path(source: &Path, destination: &Path) -> Result<()> {
    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    if source.is_file() {
        std::fs::copy(source, destination).with_context(|| {
            format!(
                "Failed to move {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        std::fs::remove_file(source)
            .with_context(|| format!("Failed to remove {}", source.display()))?;
        return Ok(());
    }

    anyhow::bail!(
        "Failed to move {} to {}",
        source.display(),
        destination.display()
    )
}
