use std::env;
#[cfg(test)]
use std::path::Path;
use std::path::PathBuf;

use log::{debug, warn};
use tempfile::TempDir;

use crate::Result;

/// Switches the process working directory into a fresh temporary directory
/// and switches back on drop, then deletes the directory with everything the
/// engine wrote into it.
pub(crate) struct ScratchDir {
    original: PathBuf,
    dir: TempDir,
}

impl ScratchDir {
    pub(crate) fn enter(entry_point: &str) -> Result<Self> {
        let original = env::current_dir()?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("piqtree_{}", entry_point))
            .tempdir()?;
        env::set_current_dir(dir.path())?;
        debug!("Running {} in {}", entry_point, dir.path().display());
        Ok(Self { original, dir })
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.original) {
            warn!(
                "Could not return to working directory {}: {}",
                self.original.display(),
                e
            );
        }
    }
}
