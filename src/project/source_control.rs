//! Hook for keeping version control in step with room file changes.

use std::path::{Path, PathBuf};

use bevy::log::debug;

/// Notified before room files are renamed or deleted on disk.
///
/// Returning an error vetoes the operation.
pub trait SourceControlProvider: Send + Sync {
    fn rename_files(&self, moves: &[(PathBuf, PathBuf)]) -> Result<(), String>;

    fn delete_files(&self, files: &[PathBuf]) -> Result<(), String>;
}

/// Used when the project is not under source control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSourceControl;

impl SourceControlProvider for NoSourceControl {
    fn rename_files(&self, moves: &[(PathBuf, PathBuf)]) -> Result<(), String> {
        debug!("No source control: {} renames", moves.len());
        Ok(())
    }

    fn delete_files(&self, files: &[PathBuf]) -> Result<(), String> {
        debug!("No source control: {} deletions", files.len());
        Ok(())
    }
}

pub(crate) fn existing(files: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    files.into_iter().filter(|f| Path::exists(f)).collect()
}
