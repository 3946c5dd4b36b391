//! Declarative Interfaces
//!
//! An interface is an ordered list of exported functions a caller depends on.
//! Declared with [`interface!`](crate::interface!), it becomes a struct with
//! one typed [`Binding`](crate::Binding) field per entry:
//!
//! ```no_run
//! dynbind::interface! {
//!     /// Functions exported by libmath
//!     pub struct MathApi {
//!         fn add(a: i32, b: i32) -> i32;
//!         extern "C" fn noop();
//!         fn scale(value: f64, factor: f64) -> f64 as "math_scale";
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let module = unsafe { dynbind::Module::load("libmath.so")? };
//! let math = unsafe { MathApi::bind(&module)? };
//! assert_eq!(math.add(2, 3)?, 5);
//! math.noop()?;
//! # Ok(())
//! # }
//! ```
//!
//! Interfaces only known at run time (manifests) use
//! [`InterfaceDescriptor::resolve`], which yields untyped [`RawBinding`]s
//! keyed by field name.

use std::collections::HashMap;
use std::marker::PhantomData;

use crate::binding::{BindError, BindPolicy};
use crate::convention::{CallingConvention, Convention};
use crate::module::{Address, Loader, Module};
use crate::signature::{resolve_signature, Resolve, ResolvedSignature};
use crate::types::SignatureInfo;

/// One entry of an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Field name in the interface
    pub field: String,
    /// Exported name looked up in the module
    pub symbol: String,
    /// Signature shape
    pub signature: SignatureInfo,
    /// Calling convention
    pub convention: CallingConvention,
}

impl EntryDescriptor {
    /// Create an entry from runtime parts
    pub fn new(
        field: impl Into<String>,
        symbol: impl Into<String>,
        signature: SignatureInfo,
        convention: CallingConvention,
    ) -> Self {
        Self {
            field: field.into(),
            symbol: symbol.into(),
            signature,
            convention,
        }
    }

    /// Describe a typed entry
    pub fn of<S, Conv>(field: &str, symbol: &str) -> Self
    where
        S: Resolve<Conv>,
        Conv: Convention,
    {
        Self::new(field, symbol, S::describe(), Conv::KIND)
    }
}

/// Ordered description of an interface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    name: String,
    entries: Vec<EntryDescriptor>,
}

impl InterfaceDescriptor {
    /// Create an empty interface
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry
    pub fn with_entry(mut self, entry: EntryDescriptor) -> Self {
        self.entries.push(entry);
        self
    }

    /// Append an entry in place
    pub fn push(&mut self, entry: EntryDescriptor) {
        self.entries.push(entry);
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries in declaration order
    pub fn entries(&self) -> &[EntryDescriptor] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the interface declares no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry's signature against its convention, without
    /// touching any module
    pub fn validate(&self) -> Result<Vec<ResolvedSignature>, BindError> {
        self.entries
            .iter()
            .map(|entry| resolve_signature(&entry.signature, entry.convention))
            .collect()
    }

    /// Resolve every entry against `module`, in declaration order.
    ///
    /// Conventions are checked first; an unsupported one fails before any
    /// lookup. The result is returned only after every entry was attempted.
    pub fn resolve<'m, L: Loader>(
        &self,
        module: &'m Module<L>,
        policy: BindPolicy,
    ) -> Result<ResolvedInterface<'m>, BindError> {
        let signatures = self.validate()?;

        let mut bindings = Vec::with_capacity(self.entries.len());
        let mut absent = Vec::new();
        for (entry, signature) in self.entries.iter().zip(signatures) {
            let address = module.resolve_address(&entry.symbol);
            if address.is_none() {
                absent.push(entry.symbol.clone());
            }
            bindings.push(RawBinding {
                field: entry.field.clone(),
                symbol: entry.symbol.clone(),
                signature,
                address,
                _module: PhantomData,
            });
        }

        policy.enforce(&self.name, absent)?;
        Ok(ResolvedInterface::new(self.name.clone(), bindings))
    }
}

/// An untyped resolved entry
#[derive(Debug, Clone)]
pub struct RawBinding<'m> {
    /// Field name
    pub field: String,
    /// Exported name it was resolved from
    pub symbol: String,
    /// Signature fixed to its convention
    pub signature: ResolvedSignature,
    /// Address, if the name was found
    pub address: Option<Address>,
    _module: PhantomData<&'m ()>,
}

impl RawBinding<'_> {
    /// Whether the exported name was found
    pub fn is_resolved(&self) -> bool {
        self.address.is_some()
    }
}

/// Resolved runtime interface: field name to [`RawBinding`]
#[derive(Debug, Clone)]
pub struct ResolvedInterface<'m> {
    name: String,
    bindings: Vec<RawBinding<'m>>,
    index: HashMap<String, usize>,
}

impl<'m> ResolvedInterface<'m> {
    fn new(name: String, bindings: Vec<RawBinding<'m>>) -> Self {
        let index = bindings
            .iter()
            .enumerate()
            .map(|(i, binding)| (binding.field.clone(), i))
            .collect();
        Self {
            name,
            bindings,
            index,
        }
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binding for a field
    pub fn get(&self, field: &str) -> Option<&RawBinding<'m>> {
        self.index.get(field).map(|&i| &self.bindings[i])
    }

    /// Bindings in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &RawBinding<'m>> {
        self.bindings.iter()
    }

    /// Exported names that were not found, in declaration order
    pub fn missing(&self) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|b| !b.is_resolved())
            .map(|b| b.symbol.as_str())
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the interface has no entries
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A typed interface generated by [`interface!`](crate::interface!)
pub trait Interface<'m>: Sized {
    /// Declaration-ordered description of the interface
    fn descriptor() -> InterfaceDescriptor;

    /// Bind every entry against `module`.
    ///
    /// # Safety
    ///
    /// Every exported function the interface names must match its declared
    /// signature and calling convention.
    unsafe fn bind_with<L: Loader>(module: &'m Module<L>, policy: BindPolicy) -> Result<Self, BindError>;
}

/// Declare a typed interface to a native module.
///
/// Each entry is a function prototype with an optional `extern "C"` /
/// `extern "cdecl"` / `extern "stdcall"` ABI and an optional `as "name"`
/// giving the exported name when it differs from the field name. The
/// generated struct has a lifetime tied to the [`Module`](crate::Module) it
/// was bound from, a public [`Binding`](crate::Binding) field per entry, and
/// a method per entry that calls it.
#[macro_export]
macro_rules! interface {
    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $(extern $abi:tt)? fn $field:ident ( $($arg:ident : $ty:ty),* $(,)? )
                    $(-> $ret:ty)? $(as $symbol:literal)? ;
            )*
        }
    ) => {
        $(#[$struct_meta])*
        #[derive(Debug)]
        $vis struct $name<'m> {
            $(
                $(#[$field_meta])*
                pub $field: $crate::Binding<
                    'm,
                    fn($($ty),*) -> $crate::__interface_return!($($ret)?),
                    $crate::__interface_convention!($($abi)?),
                >,
            )*
            #[doc(hidden)]
            __module: ::std::marker::PhantomData<&'m ()>,
        }

        impl<'m> $name<'m> {
            /// Declaration-ordered description of this interface
            pub fn descriptor() -> $crate::InterfaceDescriptor {
                $crate::InterfaceDescriptor::new(::std::stringify!($name))
                $(
                    .with_entry($crate::EntryDescriptor::of::<
                        fn($($ty),*) -> $crate::__interface_return!($($ret)?),
                        $crate::__interface_convention!($($abi)?),
                    >(
                        ::std::stringify!($field),
                        $crate::__interface_symbol!($field $(, $symbol)?),
                    ))
                )*
            }

            /// Bind every entry with the default (lenient) policy.
            ///
            /// # Safety
            ///
            /// Every exported function must match its declared signature and
            /// calling convention.
            #[allow(dead_code)]
            pub unsafe fn bind<L: $crate::Loader>(
                module: &'m $crate::Module<L>,
            ) -> ::std::result::Result<Self, $crate::BindError> {
                <Self as $crate::Interface<'m>>::bind_with(module, $crate::BindPolicy::default())
            }

            /// Bind every entry, applying `policy` to absent symbols.
            ///
            /// # Safety
            ///
            /// Every exported function must match its declared signature and
            /// calling convention.
            #[allow(dead_code)]
            pub unsafe fn bind_with<L: $crate::Loader>(
                module: &'m $crate::Module<L>,
                policy: $crate::BindPolicy,
            ) -> ::std::result::Result<Self, $crate::BindError> {
                <Self as $crate::Interface<'m>>::bind_with(module, policy)
            }

            $(
                #[allow(dead_code)]
                pub fn $field(
                    &self,
                    $($arg: $ty),*
                ) -> ::std::result::Result<$crate::__interface_return!($($ret)?), $crate::BindError> {
                    self.$field.call(($($arg,)*))
                }
            )*
        }

        impl<'m> $crate::Interface<'m> for $name<'m> {
            fn descriptor() -> $crate::InterfaceDescriptor {
                $name::descriptor()
            }

            #[allow(unused_variables)]
            unsafe fn bind_with<L: $crate::Loader>(
                module: &'m $crate::Module<L>,
                policy: $crate::BindPolicy,
            ) -> ::std::result::Result<Self, $crate::BindError> {
                // Field initialisers run in declaration order.
                let interface = $name {
                    $(
                        $field: $crate::Binding::bind(
                            module,
                            $crate::__interface_symbol!($field $(, $symbol)?),
                        ),
                    )*
                    __module: ::std::marker::PhantomData,
                };

                #[allow(unused_mut)]
                let mut absent: ::std::vec::Vec<::std::string::String> = ::std::vec::Vec::new();
                $(
                    if !interface.$field.is_resolved() {
                        absent.push(interface.$field.name().to_string());
                    }
                )*
                policy.enforce(::std::stringify!($name), absent)?;
                ::std::result::Result::Ok(interface)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __interface_return {
    () => { () };
    ($ret:ty) => { $ret };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __interface_convention {
    () => { $crate::DefaultCall };
    ("C") => { $crate::Cdecl };
    ("cdecl") => { $crate::Cdecl };
    ("stdcall") => { $crate::Stdcall };
    ($other:tt) => {
        ::std::compile_error!(::std::concat!("unsupported calling convention: ", $other))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __interface_symbol {
    ($field:ident) => { ::std::stringify!($field) };
    ($field:ident, $symbol:literal) => { $symbol };
}

#[cfg(test)]
mod tests;
