//! Test doubles for the OS loader and symbol-session collaborators.
//!
//! `CountingLoader` stands in for the operating system's module loader and
//! serves addresses of Rust `extern "C"` functions, so bindings can be
//! exercised end to end without a native library on disk.

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use glob::Pattern;

use crate::module::{Address, LoadError, Loader, Module, UnloadError};
use crate::symbols::{ModuleBase, Symbol, SymbolProvider, SymbolSessionError};

static NOOP_CALLS: AtomicI32 = AtomicI32::new(0);

extern "C" fn fixture_add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

extern "C" fn fixture_noop() {
    NOOP_CALLS.fetch_add(1, Ordering::SeqCst);
}

extern "C" fn fixture_noop_count() -> i32 {
    NOOP_CALLS.load(Ordering::SeqCst)
}

extern "C" fn fixture_scale(value: f64, factor: f64) -> f64 {
    value * factor
}

fn address_of(function: *const ()) -> Address {
    Address::new(function as *mut c_void).expect("function addresses are non-null")
}

/// Calls recorded by a [`CountingLoader`]
#[derive(Debug, Default)]
pub struct LoaderLog {
    pub opened: usize,
    pub closed: usize,
    pub lookups: Vec<String>,
}

/// Loader double that counts opens, closes and lookups
#[derive(Debug, Clone, Default)]
pub struct CountingLoader {
    exports: Arc<HashMap<String, Address>>,
    log: Arc<Mutex<LoaderLog>>,
    fail_open: bool,
    fail_close: bool,
}

impl CountingLoader {
    /// A loader whose modules export nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader whose modules export `add`, `noop`, `noop_count` and `scale`
    pub fn with_fixture_exports() -> Self {
        let exports = HashMap::from([
            ("add".to_string(), address_of(fixture_add as *const ())),
            ("noop".to_string(), address_of(fixture_noop as *const ())),
            ("noop_count".to_string(), address_of(fixture_noop_count as *const ())),
            ("scale".to_string(), address_of(fixture_scale as *const ())),
        ]);
        Self {
            exports: Arc::new(exports),
            ..Self::default()
        }
    }

    /// A loader on which every open fails
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Make every close report an error (the close is still counted)
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn lookups(&self) -> Vec<String> {
        self.log.lock().unwrap().lookups.clone()
    }
}

impl Loader for CountingLoader {
    type Handle = usize;

    unsafe fn open(&self, path: &Path) -> Result<usize, LoadError> {
        if self.fail_open {
            return Err(LoadError::new(path, "simulated load failure", Some(2)));
        }
        let mut log = self.log.lock().unwrap();
        log.opened += 1;
        Ok(log.opened)
    }

    fn symbol(&self, _handle: &usize, name: &CStr) -> Option<Address> {
        let name = name.to_string_lossy().into_owned();
        let address = self.exports.get(&name).copied();
        self.log.lock().unwrap().lookups.push(name);
        address
    }

    fn close(&self, _handle: usize) -> Result<(), UnloadError> {
        self.log.lock().unwrap().closed += 1;
        if self.fail_close {
            return Err(UnloadError {
                reason: "simulated unload failure".to_string(),
                os_code: None,
            });
        }
        Ok(())
    }
}

/// Load a module named "fixture" through `loader`
pub fn fixture_module(loader: &CountingLoader) -> Module<CountingLoader> {
    unsafe { Module::load_with(loader.clone(), "fixture") }.expect("counting loader opens")
}

/// Where a [`RecordingProvider`] should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFault {
    Open,
    LoadModule,
    Enumerate,
}

#[derive(Debug, Default)]
struct ProviderLog {
    opened: usize,
    closed: usize,
    walks: usize,
}

/// Symbol-session double that serves a fixed symbol list
#[derive(Debug, Default)]
pub struct RecordingProvider {
    symbols: Vec<Symbol>,
    fault: Option<ProviderFault>,
    log: Mutex<ProviderLog>,
}

impl RecordingProvider {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            ..Self::default()
        }
    }

    pub fn failing(fault: ProviderFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    /// Serve `symbols`, then fail the walk once they have been visited
    pub fn failing_after(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            fault: Some(ProviderFault::Enumerate),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn walks(&self) -> usize {
        self.log.lock().unwrap().walks
    }
}

impl SymbolProvider for RecordingProvider {
    type Token = ();

    fn open(&self) -> Result<(), SymbolSessionError> {
        if self.fault == Some(ProviderFault::Open) {
            return Err(SymbolSessionError::Open("simulated open failure".to_string()));
        }
        self.log.lock().unwrap().opened += 1;
        Ok(())
    }

    fn load_module(&self, _token: &mut (), path: &Path) -> Result<ModuleBase, SymbolSessionError> {
        if self.fault == Some(ProviderFault::LoadModule) {
            return Err(SymbolSessionError::LoadModule {
                path: path.to_path_buf(),
                reason: "simulated load failure".to_string(),
            });
        }
        Ok(ModuleBase(1))
    }

    fn enumerate(
        &self,
        _token: &(),
        _base: ModuleBase,
        mask: &str,
        visitor: &mut dyn FnMut(Symbol) -> bool,
    ) -> bool {
        self.log.lock().unwrap().walks += 1;
        let Ok(pattern) = Pattern::new(mask) else {
            return false;
        };
        for symbol in self.symbols.iter().filter(|s| pattern.matches(&s.name)) {
            if !visitor(symbol.clone()) {
                break;
            }
        }
        self.fault != Some(ProviderFault::Enumerate)
    }

    fn close(&self, _token: ()) {
        self.log.lock().unwrap().closed += 1;
    }
}
