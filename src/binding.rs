//! Typed Bindings
//!
//! A [`Binding`] is one exported name resolved against one [`Module`] and
//! reinterpreted as the concrete function pointer for its signature and
//! calling convention.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::convention::{Convention, DefaultCall};
use crate::module::{Loader, Module};
use crate::signature::Resolve;

/// Errors raised while resolving or using bindings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The calling convention has no ABI on this target, or is unknown
    #[error("unsupported calling convention: {0}")]
    UnsupportedConvention(String),

    /// A binding was used whose exported name was not found
    #[error("symbol '{0}' is not exported by the module")]
    SymbolAbsent(String),

    /// Strict binding found names the module does not export
    #[error("interface '{interface}' is missing symbols: {}", .names.join(", "))]
    MissingSymbols {
        /// Interface being bound
        interface: String,
        /// Absent exported names, in declaration order
        names: Vec<String>,
    },

    /// Unknown binding policy name
    #[error("unknown binding policy: {0}")]
    UnknownPolicy(String),
}

/// What to do when an exported name is not found while binding an interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindPolicy {
    /// Keep the absent binding; calling it reports [`BindError::SymbolAbsent`]
    #[default]
    Lenient,
    /// Fail the whole interface with [`BindError::MissingSymbols`]
    Strict,
}

impl BindPolicy {
    /// Apply the policy to the absent names collected while binding
    pub fn enforce(self, interface: &str, absent: Vec<String>) -> Result<(), BindError> {
        if absent.is_empty() {
            return Ok(());
        }
        match self {
            BindPolicy::Lenient => {
                tracing::warn!(
                    interface,
                    missing = %absent.join(", "),
                    "binding interface with absent symbols"
                );
                Ok(())
            }
            BindPolicy::Strict => Err(BindError::MissingSymbols {
                interface: interface.to_string(),
                names: absent,
            }),
        }
    }
}

impl FromStr for BindPolicy {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(BindPolicy::Lenient),
            "strict" => Ok(BindPolicy::Strict),
            _ => Err(BindError::UnknownPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for BindPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindPolicy::Lenient => write!(f, "lenient"),
            BindPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// A resolved, typed function exported by a module
///
/// `S` is the abstract signature (`fn(i32, i32) -> i32`), `Conv` the calling
/// convention marker. The binding borrows the module for `'m`, so it cannot
/// outlive the code it points into.
pub struct Binding<'m, S, Conv = DefaultCall>
where
    S: Resolve<Conv>,
    Conv: Convention,
{
    name: String,
    callable: Option<S::Callable>,
    _module: PhantomData<&'m ()>,
    _convention: PhantomData<Conv>,
}

impl<'m, S, Conv> Binding<'m, S, Conv>
where
    S: Resolve<Conv>,
    Conv: Convention,
{
    /// Resolve `name` in `module` and reinterpret it as `S` under `Conv`.
    ///
    /// An absent name produces an unresolved binding, not an error.
    ///
    /// # Safety
    ///
    /// If the name resolves, the exported code must implement `S` with the
    /// `Conv` calling convention. The module cannot check this.
    pub unsafe fn bind<L: Loader>(module: &'m Module<L>, name: &str) -> Self {
        let callable = module
            .resolve_address(name)
            .map(|address| S::from_address(address));

        tracing::debug!(
            module = %module.path().display(),
            symbol = name,
            convention = %Conv::KIND,
            resolved = callable.is_some(),
            "bound symbol"
        );

        Self {
            name: name.to_string(),
            callable,
            _module: PhantomData,
            _convention: PhantomData,
        }
    }

    /// The exported name this binding was resolved from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the exported name was found
    pub fn is_resolved(&self) -> bool {
        self.callable.is_some()
    }

    /// The function pointer, if the name was found
    pub fn get(&self) -> Option<&S::Callable> {
        self.callable.as_ref()
    }

    /// The function pointer, or [`BindError::SymbolAbsent`]
    pub fn require(&self) -> Result<&S::Callable, BindError> {
        self.callable
            .as_ref()
            .ok_or_else(|| BindError::SymbolAbsent(self.name.clone()))
    }

    /// Call the bound function with its arguments as a tuple
    pub fn call(&self, args: S::Params) -> Result<S::Return, BindError> {
        let callable = *self.require()?;
        Ok(S::invoke(callable, args))
    }
}

impl<S, Conv> Clone for Binding<'_, S, Conv>
where
    S: Resolve<Conv>,
    Conv: Convention,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            callable: self.callable,
            _module: PhantomData,
            _convention: PhantomData,
        }
    }
}

impl<S, Conv> fmt::Debug for Binding<'_, S, Conv>
where
    S: Resolve<Conv>,
    Conv: Convention,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("convention", &Conv::KIND)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
