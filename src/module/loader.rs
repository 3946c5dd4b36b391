//! OS Loader Boundary
//!
//! The [`Loader`] trait is everything the crate needs from the operating
//! system's module loader. [`NativeLoader`] implements it with `libloading`.

use std::error::Error as _;
use std::ffi::{c_void, CStr};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;
use thiserror::Error;

/// A module failed to map into the process
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not load module '{}': {reason}{}", .path.display(), os_suffix(.os_code))]
pub struct LoadError {
    /// Path that was requested
    pub path: PathBuf,
    /// Loader's description of the failure
    pub reason: String,
    /// Raw OS error code, where the platform reports one
    pub os_code: Option<i32>,
}

impl LoadError {
    /// Create a load error
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>, os_code: Option<i32>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            os_code,
        }
    }

    fn from_libloading(path: &Path, err: &libloading::Error) -> Self {
        Self::new(path, err.to_string(), os_code(err))
    }
}

/// Releasing a module failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not unload module: {reason}")]
pub struct UnloadError {
    /// Loader's description of the failure
    pub reason: String,
    /// Raw OS error code, where the platform reports one
    pub os_code: Option<i32>,
}

fn os_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (os error {})", c)).unwrap_or_default()
}

/// Walk the error's source chain for an OS error code (Windows reports one,
/// `dlopen` does not)
fn os_code(err: &libloading::Error) -> Option<i32> {
    let mut source = err.source();
    while let Some(current) = source {
        if let Some(code) = current.downcast_ref::<io::Error>().and_then(io::Error::raw_os_error) {
            return Some(code);
        }
        source = current.source();
    }
    None
}

/// A non-null address exported by a module
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(NonNull<c_void>);

// An address is a plain number; dereferencing or calling it is what needs care.
unsafe impl Send for Address {}
unsafe impl Sync for Address {}

impl Address {
    /// Wrap a raw address; `None` for null
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Address)
    }

    /// The raw pointer
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// The address as an integer
    pub fn as_usize(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.as_usize())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.as_usize())
    }
}

/// Operating-system module loader
///
/// `close` is called at most once per handle; implementations may assume it.
pub trait Loader {
    /// Loaded module handle
    type Handle;

    /// Map the module at `path` into the process.
    ///
    /// # Safety
    ///
    /// Loading runs the module's initialisation code.
    unsafe fn open(&self, path: &Path) -> Result<Self::Handle, LoadError>;

    /// Address of the exported `name`, or `None` when it is not exported
    fn symbol(&self, handle: &Self::Handle, name: &CStr) -> Option<Address>;

    /// Release the module
    fn close(&self, handle: Self::Handle) -> Result<(), UnloadError>;
}

/// [`Loader`] backed by `dlopen`/`LoadLibraryExW` through `libloading`
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLoader;

impl Loader for NativeLoader {
    type Handle = Library;

    unsafe fn open(&self, path: &Path) -> Result<Library, LoadError> {
        Library::new(path).map_err(|e| LoadError::from_libloading(path, &e))
    }

    fn symbol(&self, handle: &Library, name: &CStr) -> Option<Address> {
        // Safety: only the symbol's address is read; nothing at it is
        // dereferenced or called here.
        let symbol = unsafe { handle.get::<*mut c_void>(name.to_bytes_with_nul()) }.ok()?;
        Address::new(*symbol)
    }

    fn close(&self, handle: Library) -> Result<(), UnloadError> {
        handle.close().map_err(|e| UnloadError {
            reason: e.to_string(),
            os_code: os_code(&e),
        })
    }
}
