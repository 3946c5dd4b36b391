//! Module Locator
//!
//! Turns a bare library name into a path using search paths and the
//! platform's shared-library file naming.

use std::path::{Path, PathBuf};

use super::{LoadError, Module};

/// Finds modules by name in a list of search paths
#[derive(Debug, Clone)]
pub struct ModuleLocator {
    /// Search paths, in priority order
    search_paths: Vec<PathBuf>,
}

impl ModuleLocator {
    /// Create a locator with the platform's default search paths
    pub fn new() -> Self {
        Self {
            search_paths: default_search_paths(),
        }
    }

    /// Create a locator that only searches `paths`
    pub fn with_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_paths: paths.into_iter().collect(),
        }
    }

    /// Add a search path, searched after the existing ones
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        self.search_paths.push(path.as_ref().to_path_buf());
    }

    /// Configured search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find a module by name or path
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        // If it's already a path, check if it exists
        let path = Path::new(name);
        if path.exists() {
            return Some(path.to_path_buf());
        }

        let candidates = [name.to_string(), library_filename(name)];
        for search_path in &self.search_paths {
            for candidate in &candidates {
                let full_path = search_path.join(candidate);
                if full_path.is_file() {
                    return Some(full_path);
                }
            }
        }

        None
    }

    /// Load a module by name.
    ///
    /// Names not found in the search paths are handed to the OS loader
    /// unchanged, so its own search rules (`LD_LIBRARY_PATH`, `PATH`, ...)
    /// still apply.
    ///
    /// # Safety
    ///
    /// See [`Module::load`].
    pub unsafe fn load(&self, name: &str) -> Result<Module, LoadError> {
        match self.find(name) {
            Some(path) => Module::load(path),
            None => {
                tracing::debug!(module = name, "not in search paths, deferring to OS loader");
                Module::load(name)
            }
        }
    }
}

impl Default for ModuleLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the default module search paths for this platform
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // Current directory
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/lib64"));
        paths.push(PathBuf::from("/lib"));
        paths.push(PathBuf::from("/lib64"));

        if let Ok(ld_path) = std::env::var("LD_LIBRARY_PATH") {
            paths.extend(ld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));
        paths.push(PathBuf::from("/usr/lib"));

        if let Ok(dyld_path) = std::env::var("DYLD_LIBRARY_PATH") {
            paths.extend(dyld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from("C:\\Windows\\System32"));

        if let Ok(path) = std::env::var("PATH") {
            paths.extend(path.split(';').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    paths
}

/// Construct the platform-specific library filename
pub fn library_filename(name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        if name.to_lowercase().ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }

    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if name.starts_with("lib") && name.contains(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }
}
