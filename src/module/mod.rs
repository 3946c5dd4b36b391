//! Loaded Modules
//!
//! A [`Module`] owns exactly one loaded native module and releases it exactly
//! once: on [`Module::close`] or when dropped.
//!
//! ```text
//! path ──► Loader::open ──► Module ──► resolve_address(name) ──► Address?
//!                              │
//!                              ├──► Binding::bind / Interface::bind_with
//!                              │
//!                              └──► enumerate_symbols (diagnostic only)
//! ```

mod loader;
mod locate;

pub use loader::{Address, LoadError, Loader, NativeLoader, UnloadError};
pub use locate::{library_filename, ModuleLocator};

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::binding::{BindError, BindPolicy};
use crate::interface::Interface;
use crate::symbols::{self, Symbol, SymbolProvider, SymbolSessionError};

/// A loaded native module
///
/// Not `Clone`: duplicating the handle would allow a double release.
pub struct Module<L: Loader = NativeLoader> {
    /// Path the module was loaded from
    path: PathBuf,
    /// OS loader that owns the handle
    loader: L,
    /// `Some` from load until release
    handle: Option<L::Handle>,
    /// Side table filled by `enumerate_symbols`
    symbols: HashMap<String, Symbol>,
}

impl Module<NativeLoader> {
    /// Load a module with the operating system's loader.
    ///
    /// # Safety
    ///
    /// Loading runs the module's initialisation routines, which may do
    /// anything.
    pub unsafe fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::load_with(NativeLoader, path)
    }
}

impl<L: Loader> Module<L> {
    /// Load a module through a specific loader.
    ///
    /// # Safety
    ///
    /// See [`Module::load`].
    pub unsafe fn load_with(loader: L, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let handle = loader.open(&path).map_err(|e| {
            tracing::debug!(module = %path.display(), error = %e, "module load failed");
            e
        })?;
        tracing::debug!(module = %path.display(), "loaded module");

        Ok(Self {
            path,
            loader,
            handle: Some(handle),
            symbols: HashMap::new(),
        })
    }

    /// Get the path this module was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address of an exported name
    ///
    /// Absence is an ordinary outcome: empty names, names with interior NULs
    /// and names the module does not export all give `None`.
    pub fn resolve_address(&self, name: &str) -> Option<Address> {
        if name.is_empty() {
            return None;
        }
        let c_name = match CString::new(name) {
            Ok(c_name) => c_name,
            Err(_) => {
                tracing::debug!(symbol = name, "symbol name contains NUL");
                return None;
            }
        };
        let handle = self.handle.as_ref()?;
        let address = self.loader.symbol(handle, &c_name);
        tracing::trace!(
            module = %self.path.display(),
            symbol = name,
            found = address.is_some(),
            "resolve symbol"
        );
        address
    }

    /// Bind a declared interface against this module with the default policy.
    ///
    /// # Safety
    ///
    /// Every exported function the interface names must match its declared
    /// signature and calling convention.
    pub unsafe fn bind<'m, I: Interface<'m>>(&'m self) -> Result<I, BindError> {
        I::bind_with(self, BindPolicy::default())
    }

    /// Enumerate the module's exported symbols into its side table.
    ///
    /// The symbol session is scoped to this call and always closed before it
    /// returns. Enumeration never affects [`Module::resolve_address`].
    pub fn enumerate_symbols<P: SymbolProvider>(
        &mut self,
        provider: &P,
        mask: &str,
    ) -> Result<&HashMap<String, Symbol>, SymbolSessionError> {
        self.symbols.clear();
        let count = match symbols::enumerate(provider, &self.path, mask, &mut self.symbols) {
            Ok(count) => count,
            Err(e) => {
                // A failed walk leaves no partial table behind.
                self.symbols.clear();
                return Err(e);
            }
        };
        tracing::debug!(module = %self.path.display(), count, mask, "enumerated symbols");
        Ok(&self.symbols)
    }

    /// Symbols collected by the last [`Module::enumerate_symbols`]
    pub fn symbols(&self) -> &HashMap<String, Symbol> {
        &self.symbols
    }

    /// Release the module now, reporting an unload failure
    pub fn close(mut self) -> Result<(), UnloadError> {
        match self.handle.take() {
            Some(handle) => self.loader.close(handle),
            None => Ok(()),
        }
    }
}

impl<L: Loader> Drop for Module<L> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.loader.close(handle) {
                tracing::warn!(module = %self.path.display(), error = %e, "failed to unload module");
            }
        }
    }
}

impl<L: Loader> fmt::Debug for Module<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("path", &self.path)
            .field("loaded", &self.handle.is_some())
            .field("symbols", &self.symbols.len())
            .finish()
    }
}
