use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::engine::loader::NativeLibrary;

/// Environment variable naming the engine library to load.
pub const ENGINE_ENV_VAR: &str = "PIQTREE_ENGINE";

/// Base name of the IQ-TREE library.
pub const DEFAULT_LIBRARY_NAME: &str = "iqtree2";

/// How to find and run the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Explicit path of the engine library.
    pub library: Option<PathBuf>,
    /// Run file-producing entry points inside a fresh temporary directory.
    pub scratch_dirs: bool,
    /// Send the engine's stdout and stderr to the null device during calls.
    pub silence_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library: None,
            scratch_dirs: true,
            silence_output: true,
        }
    }
}

impl EngineConfig {
    pub fn new(library: Option<PathBuf>) -> Self {
        Self {
            library,
            ..Self::default()
        }
    }

    pub fn scratch_dirs(mut self, enabled: bool) -> Self {
        self.scratch_dirs = enabled;
        self
    }

    pub fn silence_output(mut self, enabled: bool) -> Self {
        self.silence_output = enabled;
        self
    }

    /// Library to load: the explicit path, then the `PIQTREE_ENGINE`
    /// environment variable, then the platform file name of `iqtree2`.
    ///
    /// # Example
    /// ```
    /// use std::path::PathBuf;
    /// use piqtree::EngineConfig;
    /// let cfg = EngineConfig::new(Some(PathBuf::from("/opt/iqtree/libiqtree2.so")));
    /// assert_eq!(cfg.resolve_library(), PathBuf::from("/opt/iqtree/libiqtree2.so"));
    /// ```
    pub fn resolve_library(&self) -> PathBuf {
        if let Some(path) = &self.library {
            return path.clone();
        }
        match env::var_os(ENGINE_ENV_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(NativeLibrary::platform_lib_name(DEFAULT_LIBRARY_NAME)),
        }
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "engine library: {}, scratch directories: {}, engine output: {}",
            self.resolve_library().display(),
            if self.scratch_dirs { "on" } else { "off" },
            if self.silence_output { "hidden" } else { "shown" }
        )
    }
}
