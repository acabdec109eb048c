//! Run-time loading of the engine library.

use std::path::{Path, PathBuf};

use anyhow::bail;
use libloading::Library;
use log::{debug, info};

use crate::errors::LibraryError;
use crate::ffi::EngineApi;
use crate::Result;

/// A loaded engine library.
pub(crate) struct NativeLibrary {
    library: Library,
    path: PathBuf,
}

impl NativeLibrary {
    /// Loads a shared library from a path. A bare file name is looked up on
    /// the platform's library search path.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        info!("Loading engine library {}", path.display());
        // safety: loading runs the library's initialisers, which is the
        // contract of linking against the engine in the first place
        let library = match unsafe { Library::new(path) } {
            Ok(library) => library,
            Err(e) => bail!(LibraryError::new(format!(
                "Failed to load engine library '{}': {}",
                path.display(),
                e
            ))),
        };
        Ok(Self {
            library,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn platform_lib_name(name: &str) -> String {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "windows")] {
                format!("{}.dll", name)
            } else if #[cfg(target_os = "macos")] {
                format!("lib{}.dylib", name)
            } else {
                format!("lib{}.so", name)
            }
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// # Safety
    /// `F` must match the signature of the exported symbol.
    unsafe fn symbol<F: Copy>(&self, name: &str) -> Result<F> {
        match self.library.get::<F>(name.as_bytes()) {
            Ok(symbol) => {
                debug!("Resolved engine symbol {}", name);
                Ok(*symbol)
            }
            Err(e) => bail!(LibraryError::new(format!(
                "Function '{}' not found in '{}': {}",
                name,
                self.path.display(),
                e
            ))),
        }
    }

    /// Resolves the full engine function table. The returned pointers are
    /// only valid while `self` is alive.
    pub(crate) fn resolve_api(&self) -> Result<EngineApi> {
        // safety: the signatures below are the engine's C ABI
        unsafe {
            Ok(EngineApi {
                version: self.symbol("version")?,
                robinson_fould: self.symbol("robinson_fould")?,
                random_tree: self.symbol("random_tree")?,
                build_tree: self.symbol("build_tree")?,
                fit_tree: self.symbol("fit_tree")?,
                modelfinder: self.symbol("modelfinder")?,
                build_distmatrix: self.symbol("build_distmatrix")?,
                build_njtree: self.symbol("build_njtree")?,
                consensus_tree: self.symbol("consensus_tree")?,
                simulate_alignment: self.symbol("simulate_alignment")?,
                free_string: self.symbol("free_string")?,
                free_double_array: self.symbol("free_double_array")?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::downcast_error;

    #[test]
    fn platform_lib_name() {
        let name = NativeLibrary::platform_lib_name("iqtree2");
        #[cfg(target_os = "windows")]
        assert_eq!(name, "iqtree2.dll");
        #[cfg(target_os = "macos")]
        assert_eq!(name, "libiqtree2.dylib");
        #[cfg(target_os = "linux")]
        assert_eq!(name, "libiqtree2.so");
    }

    #[test]
    fn missing_library() {
        let lib = NativeLibrary::load(Path::new("/nonexistent/piqtree/libiqtree2.so"));
        let error = downcast_error::<LibraryError>(&lib);
        assert!(error
            .message()
            .starts_with("Failed to load engine library '/nonexistent/piqtree/libiqtree2.so'"));
    }
}
