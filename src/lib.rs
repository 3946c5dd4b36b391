//! Dynbind - Typed Bindings to Native Modules
//!
//! Declare once which functions a dynamically loaded module must export, and
//! get back an aggregate of ready-to-call, strongly typed function values.
//! Each name is resolved when the interface is bound, never on every call.
//!
//! # Features
//!
//! - **Type-level signature resolution**: `fn(A, B) -> R` plus a calling
//!   convention marker maps to the concrete `extern` function pointer type
//! - **Declarative interfaces**: [`interface!`] generates a struct with one
//!   [`Binding`] per entry, bound in declaration order
//! - **Scoped ownership**: bindings borrow the [`Module`] they came from and
//!   the module is released exactly once
//! - **Explicit absence**: missing exports are `None`/[`BindError`], never a
//!   null pointer
//! - **Runtime manifests**: TOML interface manifests resolve to untyped
//!   [`RawBinding`]s
//! - **Export enumeration**: read a module's export table for diagnostics
//!
//! # Example
//!
//! ```no_run
//! use dynbind::{interface, BindPolicy, Module};
//!
//! interface! {
//!     pub struct Fixture {
//!         fn add(a: i32, b: i32) -> i32;
//!         extern "C" fn noop();
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let module = unsafe { Module::load("./libfixture.so")? };
//! let api = unsafe { Fixture::bind_with(&module, BindPolicy::Strict)? };
//!
//! assert_eq!(api.add(2, 3)?, 5);
//! api.noop()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   interface!     │  struct of Binding<'m, fn(..) -> R, Conv>
//! └────────┬─────────┘
//!          │ bind (declaration order)
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │     Binding      │────►│ Resolve<Conv>    │  fn(..) -> R  =>  extern "C" fn(..) -> R
//! └────────┬─────────┘     └──────────────────┘
//!          │ resolve_address
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │     Module       │────►│ Loader           │  libloading (dlopen / LoadLibrary)
//! └────────┬─────────┘     └──────────────────┘
//!          │ enumerate_symbols (diagnostic)
//!          ▼
//! ┌──────────────────┐
//! │ SymbolProvider   │  object + memmap2
//! └──────────────────┘
//! ```

pub mod binding;
pub mod config;
pub mod convention;
pub mod interface;
pub mod manifest;
pub mod module;
pub mod signature;
pub mod symbols;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use binding::{BindError, BindPolicy, Binding};
pub use config::{ConfigError, ConfigResult, DynbindConfig};
pub use convention::{CallingConvention, Cdecl, Convention, DefaultCall, Stdcall};
pub use interface::{EntryDescriptor, Interface, InterfaceDescriptor, RawBinding, ResolvedInterface};
pub use manifest::{InterfaceManifest, ManifestEntry, ManifestError};
pub use module::{
    library_filename, Address, LoadError, Loader, Module, ModuleLocator, NativeLoader, UnloadError,
};
pub use signature::{resolve_signature, Callable, Resolve, ResolvedSignature, Signature};
pub use symbols::{
    ObjectSymbolProvider, SessionState, Symbol, SymbolKind, SymbolProvider, SymbolRecord,
    SymbolSessionError,
};
pub use types::{SignatureInfo, ValueType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
