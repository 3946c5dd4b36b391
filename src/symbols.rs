//! Symbol Enumeration
//!
//! Diagnostic walk over a module's export table. It runs in a symbol session
//! that is opened for one enumeration and closed on every exit path:
//!
//! ```text
//! open ──► SessionOpen ──load_module──► Walking ──► SessionOpen
//!               │                                       │
//!               └──────────── drop / close ─────────────┴──► SessionClosed
//! ```
//!
//! Nothing here participates in binding; [`crate::Module::resolve_address`]
//! goes straight to the OS loader.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use glob::Pattern;
use memmap2::Mmap;
use object::{BinaryFormat, Object, ObjectSymbol};
use thiserror::Error;

/// Errors from a symbol session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolSessionError {
    /// The session could not be opened
    #[error("could not open symbol session: {0}")]
    Open(String),

    /// The module could not be loaded into the session
    #[error("could not load '{}' into the symbol session: {reason}", .path.display())]
    LoadModule {
        /// Module path
        path: PathBuf,
        /// Provider's description of the failure
        reason: String,
    },

    /// The export table walk failed
    #[error("enumerating symbols of '{}' failed", .path.display())]
    Enumerate {
        /// Module path
        path: PathBuf,
    },

    /// The symbol mask is not a valid glob
    #[error("invalid symbol mask '{mask}': {reason}")]
    InvalidMask {
        /// Mask as given
        mask: String,
        /// Parser message
        reason: String,
    },
}

/// Kind of an exported symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Executable code
    Text,
    /// Data object
    Data,
    /// Thread-local storage
    Tls,
    /// Anything else
    Unknown,
}

impl From<object::SymbolKind> for SymbolKind {
    fn from(kind: object::SymbolKind) -> Self {
        match kind {
            object::SymbolKind::Text => SymbolKind::Text,
            object::SymbolKind::Data => SymbolKind::Data,
            object::SymbolKind::Tls => SymbolKind::Tls,
            _ => SymbolKind::Unknown,
        }
    }
}

/// Raw symbol table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolRecord {
    /// Address relative to the image, as recorded in the table
    pub address: u64,
    /// Size recorded in the table (0 when unknown)
    pub size: u64,
    /// Symbol kind
    pub kind: SymbolKind,
}

/// An exported symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Exported name, as passed to the OS loader
    pub name: String,
    /// Table entry
    pub record: SymbolRecord,
    /// `record.size`, or the distance to the next exported address when the
    /// table has no size
    pub estimated_size: u64,
}

/// Opaque identifier of a module loaded into a symbol session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleBase(pub u64);

/// Debug-symbol facility
///
/// `close` is called exactly once for every token `open` returned.
pub trait SymbolProvider {
    /// Open session state
    type Token;

    /// Open a session
    fn open(&self) -> Result<Self::Token, SymbolSessionError>;

    /// Load the module at `path` into the session
    fn load_module(&self, token: &mut Self::Token, path: &Path)
        -> Result<ModuleBase, SymbolSessionError>;

    /// Visit every exported symbol whose name matches `mask`.
    ///
    /// The visitor returns `false` to stop early. Returns `false` if the walk
    /// itself failed.
    fn enumerate(
        &self,
        token: &Self::Token,
        base: ModuleBase,
        mask: &str,
        visitor: &mut dyn FnMut(Symbol) -> bool,
    ) -> bool;

    /// Close the session
    fn close(&self, token: Self::Token);
}

/// Lifecycle state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opened, not walking
    SessionOpen,
    /// Inside an export table walk
    Walking,
    /// Closed; terminal
    SessionClosed,
}

/// A scoped symbol session; closes itself when dropped
pub struct Session<'p, P: SymbolProvider> {
    provider: &'p P,
    token: Option<P::Token>,
    state: SessionState,
    path: Option<PathBuf>,
}

impl<'p, P: SymbolProvider> Session<'p, P> {
    /// Open a session on `provider`
    pub fn open(provider: &'p P) -> Result<Self, SymbolSessionError> {
        let token = provider.open()?;
        tracing::trace!("symbol session open");
        Ok(Self {
            provider,
            token: Some(token),
            state: SessionState::SessionOpen,
            path: None,
        })
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Load a module into the session
    pub fn load_module(&mut self, path: &Path) -> Result<ModuleBase, SymbolSessionError> {
        let token = self.token.as_mut().ok_or_else(|| SymbolSessionError::LoadModule {
            path: path.to_path_buf(),
            reason: "session is closed".to_string(),
        })?;
        let base = self.provider.load_module(token, path)?;
        self.path = Some(path.to_path_buf());
        Ok(base)
    }

    /// Walk the export table of a loaded module
    pub fn walk(
        &mut self,
        base: ModuleBase,
        mask: &str,
        visitor: &mut dyn FnMut(Symbol) -> bool,
    ) -> Result<(), SymbolSessionError> {
        let path = self.path.clone().unwrap_or_default();
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| SymbolSessionError::Enumerate { path: path.clone() })?;

        self.state = SessionState::Walking;
        let ok = self.provider.enumerate(token, base, mask, visitor);
        self.state = SessionState::SessionOpen;

        if ok {
            Ok(())
        } else {
            Err(SymbolSessionError::Enumerate { path })
        }
    }

    /// Close the session now
    pub fn close(mut self) -> SessionState {
        self.shutdown();
        self.state
    }

    fn shutdown(&mut self) {
        if let Some(token) = self.token.take() {
            self.provider.close(token);
            self.state = SessionState::SessionClosed;
            tracing::trace!("symbol session closed");
        }
    }
}

impl<P: SymbolProvider> Drop for Session<'_, P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Enumerate the exports of the module at `path` into `table`.
///
/// Returns the number of symbols recorded. The session is closed on every
/// path out of this function, including errors.
pub fn enumerate<P: SymbolProvider>(
    provider: &P,
    path: &Path,
    mask: &str,
    table: &mut HashMap<String, Symbol>,
) -> Result<usize, SymbolSessionError> {
    Pattern::new(mask).map_err(|e| SymbolSessionError::InvalidMask {
        mask: mask.to_string(),
        reason: e.to_string(),
    })?;

    let mut session = Session::open(provider)?;
    let base = session.load_module(path)?;

    let mut count = 0usize;
    session.walk(base, mask, &mut |symbol| {
        tracing::trace!(symbol = %symbol.name, address = symbol.record.address, "export");
        table.insert(symbol.name.clone(), symbol);
        count += 1;
        true
    })?;
    session.close();

    Ok(count)
}

/// Fill in `estimated_size` for symbols whose table entry has no size
pub fn estimate_sizes(symbols: &mut [Symbol]) {
    let mut addresses: Vec<u64> = symbols.iter().map(|s| s.record.address).collect();
    addresses.sort_unstable();
    addresses.dedup();

    for symbol in symbols.iter_mut() {
        symbol.estimated_size = if symbol.record.size > 0 {
            symbol.record.size
        } else {
            let next = addresses.partition_point(|&a| a <= symbol.record.address);
            addresses
                .get(next)
                .map(|&a| a - symbol.record.address)
                .unwrap_or(0)
        };
    }
}

/// [`SymbolProvider`] that reads export tables from module files on disk
///
/// Handles ELF, PE and Mach-O images through the `object` crate. Each loaded
/// module is memory-mapped for the lifetime of the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSymbolProvider;

/// Session state of [`ObjectSymbolProvider`]
#[derive(Debug, Default)]
pub struct ObjectSession {
    images: Vec<Image>,
}

#[derive(Debug)]
struct Image {
    path: PathBuf,
    map: Mmap,
}

impl SymbolProvider for ObjectSymbolProvider {
    type Token = ObjectSession;

    fn open(&self) -> Result<ObjectSession, SymbolSessionError> {
        Ok(ObjectSession::default())
    }

    fn load_module(
        &self,
        token: &mut ObjectSession,
        path: &Path,
    ) -> Result<ModuleBase, SymbolSessionError> {
        let load_error = |reason: String| SymbolSessionError::LoadModule {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
        // Safety: the map is read-only and private to the session; a module
        // file rewritten underneath us yields garbage symbols, not UB in safe
        // code, because `object` bounds-checks every read.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| load_error(e.to_string()))?;
        object::File::parse(&*map).map_err(|e| load_error(e.to_string()))?;

        token.images.push(Image {
            path: path.to_path_buf(),
            map,
        });
        Ok(ModuleBase(token.images.len() as u64))
    }

    fn enumerate(
        &self,
        token: &ObjectSession,
        base: ModuleBase,
        mask: &str,
        visitor: &mut dyn FnMut(Symbol) -> bool,
    ) -> bool {
        let Some(image) = base
            .0
            .checked_sub(1)
            .and_then(|index| token.images.get(index as usize))
        else {
            return false;
        };
        let Ok(pattern) = Pattern::new(mask) else {
            return false;
        };
        let file = match object::File::parse(&*image.map) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(module = %image.path.display(), error = %e, "reparse failed");
                return false;
            }
        };

        let mut symbols = exported_symbols(&file);
        estimate_sizes(&mut symbols);
        for symbol in symbols {
            if pattern.matches(&symbol.name) && !visitor(symbol) {
                break;
            }
        }
        true
    }

    fn close(&self, token: ObjectSession) {
        drop(token);
    }
}

/// Exported definitions of an image, from the most specific table available
fn exported_symbols(file: &object::File<'_>) -> Vec<Symbol> {
    let format = file.format();
    if prefers_export_table(format) {
        let symbols = collect_exports(file, format);
        if !symbols.is_empty() {
            return symbols;
        }
    }

    let mut symbols = collect_definitions(file.dynamic_symbols(), format);
    if symbols.is_empty() {
        symbols = collect_definitions(file.symbols(), format);
    }
    if symbols.is_empty() {
        symbols = collect_exports(file, format);
    }
    symbols
}

/// PE images have no dynamic symbol table, and their COFF table also lists
/// globals the DLL does not export.
fn prefers_export_table(format: BinaryFormat) -> bool {
    format == BinaryFormat::Pe
}

fn collect_exports(file: &object::File<'_>, format: BinaryFormat) -> Vec<Symbol> {
    let Ok(exports) = file.exports() else {
        return Vec::new();
    };
    exports
        .iter()
        .map(|export| Symbol {
            name: exported_name(&String::from_utf8_lossy(export.name()), format),
            record: SymbolRecord {
                address: export.address(),
                size: 0,
                kind: SymbolKind::Unknown,
            },
            estimated_size: 0,
        })
        .collect()
}

fn collect_definitions<'data, S>(table: impl Iterator<Item = S>, format: BinaryFormat) -> Vec<Symbol>
where
    S: ObjectSymbol<'data>,
{
    table
        .filter(|symbol| symbol.is_definition() && symbol.is_global())
        .filter_map(|symbol| {
            let name = symbol.name().ok().filter(|name| !name.is_empty())?;
            Some(Symbol {
                name: exported_name(name, format),
                record: SymbolRecord {
                    address: symbol.address(),
                    size: symbol.size(),
                    kind: symbol.kind().into(),
                },
                estimated_size: symbol.size(),
            })
        })
        .collect()
}

/// Mach-O prefixes C names with an underscore that `dlsym` does not expect
fn exported_name(name: &str, format: BinaryFormat) -> String {
    match format {
        BinaryFormat::MachO => name.strip_prefix('_').unwrap_or(name).to_string(),
        _ => name.to_string(),
    }
}
