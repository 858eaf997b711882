//! Per-request staging directories.
//!
//! Every execution gets its own freshly created temporary directory holding a
//! single entry-point file. The directory is bind-mounted into the container
//! and removed once the run is over.

use crate::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Allocates [`Workspace`]s under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: Option<PathBuf>,
    entry_file: String,
}

impl WorkspaceManager {
    /// Stage workspaces in the system temporary directory.
    pub fn new(entry_file: impl Into<String>) -> Self {
        Self {
            root: None,
            entry_file: entry_file.into(),
        }
    }

    /// Stage workspaces under `root`, creating it on first use.
    ///
    /// The root must be visible to the container runtime at the same path,
    /// which matters when the runtime daemon runs on another host or VM.
    pub fn with_root(root: impl Into<PathBuf>, entry_file: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            entry_file: entry_file.into(),
        }
    }

    /// Name of the entry-point file written into each workspace.
    pub fn entry_file(&self) -> &str {
        &self.entry_file
    }

    /// Write `source` into a new, uniquely named workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or entry file cannot be created.
    pub fn stage(&self, source: &str) -> io::Result<Workspace> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(env::WORKSPACE_DIR_PREFIX);

        let dir = match &self.root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let entry_path = dir.path().join(&self.entry_file);
        fs::write(&entry_path, source)?;
        make_container_readable(dir.path(), &entry_path)?;

        // Docker requires an absolute source path for bind mounts.
        let host_path = dir.path().canonicalize()?;
        debug!(
            "Staged {} bytes of source in {}",
            source.len(),
            host_path.display()
        );

        Ok(Workspace {
            dir,
            host_path,
            entry_file: self.entry_file.clone(),
        })
    }
}

#[cfg(unix)]
fn make_container_readable(dir: &Path, entry: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))?;
    fs::set_permissions(entry, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_container_readable(_dir: &Path, _entry: &Path) -> io::Result<()> {
    Ok(())
}

/// A staged source directory owned by exactly one execution.
///
/// Dropping a workspace removes it as well; [`Workspace::release`] does the
/// same but reports failures.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    host_path: PathBuf,
    entry_file: String,
}

impl Workspace {
    /// Canonical host path of the workspace directory.
    pub fn path(&self) -> &Path {
        &self.host_path
    }

    /// File name of the entry point inside the workspace.
    pub fn entry_file(&self) -> &str {
        &self.entry_file
    }

    /// Host path of the entry-point file.
    pub fn entry_path(&self) -> PathBuf {
        self.host_path.join(&self.entry_file)
    }

    /// Remove the workspace directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory could not be deleted.
    pub fn release(self) -> io::Result<()> {
        let path = self.host_path;
        self.dir.close()?;
        debug!("Released workspace {}", path.display());
        Ok(())
    }
}
