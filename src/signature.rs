//! Signature Resolution
//!
//! Maps an abstract signature, written as a Rust `fn(A, B) -> R` type, plus a
//! [`Convention`] marker to the concrete `extern` function pointer type that
//! can be called at an exported address.
//!
//! ```
//! use dynbind::{Callable, Cdecl, DefaultCall};
//!
//! // Both resolve to `extern "C" fn(i32, i32) -> i32`.
//! let f: Callable<fn(i32, i32) -> i32, DefaultCall> = {
//!     extern "C" fn add(a: i32, b: i32) -> i32 { a + b }
//!     add
//! };
//! let g: Callable<fn(i32, i32) -> i32, Cdecl> = f;
//! assert_eq!(g(2, 3), 5);
//! ```
//!
//! A convention the target has no ABI for has no `Resolve` impl, so naming it
//! is a compile error rather than a call-time fault.

use std::ffi::c_void;
use std::fmt;

use crate::binding::BindError;
use crate::convention::{CallingConvention, Cdecl, Convention, DefaultCall};
#[cfg(target_arch = "x86")]
use crate::convention::Stdcall;
use crate::module::Address;
use crate::types::{SignatureInfo, ValueType};

/// An abstract native function signature
///
/// Implemented for `fn(A, ..) -> R` with up to twelve parameters. Only the
/// shape matters; the Rust ABI of the `fn` type itself is never used to call.
pub trait Signature: Copy + Send + Sync + 'static {
    /// Parameters as a tuple
    type Params;
    /// Return type (`()` for void)
    type Return;
    /// Number of parameters
    const ARITY: usize;

    /// Runtime description of this shape
    fn describe() -> SignatureInfo;
}

/// Resolution of a signature under one calling convention
pub trait Resolve<Conv: Convention>: Signature {
    /// Concrete function pointer type
    type Callable: Copy + Send + Sync + 'static;

    /// Reinterpret an exported address as the concrete pointer type.
    ///
    /// # Safety
    ///
    /// The code at `address` must implement this signature with this calling
    /// convention. Nothing checks it.
    unsafe fn from_address(address: Address) -> Self::Callable;

    /// Call through a resolved pointer
    fn invoke(callable: Self::Callable, args: Self::Params) -> Self::Return;
}

/// The concrete callable type for a signature and convention
pub type Callable<S, Conv = DefaultCall> = <S as Resolve<Conv>>::Callable;

/// Cast an address to a function pointer of the same width
///
/// # Safety
///
/// `F` must be a function pointer type.
unsafe fn cast_address<F: Copy>(address: Address) -> F {
    let raw: *mut c_void = address.as_ptr();
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
    std::mem::transmute_copy::<*mut c_void, F>(&raw)
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_resolve {
    (C => $conv:ty; $($arg:ident),*) => {
        impl<R: 'static, $($arg: 'static),*> Resolve<$conv> for fn($($arg),*) -> R {
            type Callable = extern "C" fn($($arg),*) -> R;

            unsafe fn from_address(address: Address) -> Self::Callable {
                cast_address(address)
            }

            #[allow(non_snake_case)]
            fn invoke(callable: Self::Callable, args: Self::Params) -> R {
                let ($($arg,)*) = args;
                callable($($arg),*)
            }
        }
    };
    (stdcall => $conv:ty; $($arg:ident),*) => {
        impl<R: 'static, $($arg: 'static),*> Resolve<$conv> for fn($($arg),*) -> R {
            type Callable = extern "stdcall" fn($($arg),*) -> R;

            unsafe fn from_address(address: Address) -> Self::Callable {
                cast_address(address)
            }

            #[allow(non_snake_case)]
            fn invoke(callable: Self::Callable, args: Self::Params) -> R {
                let ($($arg,)*) = args;
                callable($($arg),*)
            }
        }
    };
}

macro_rules! impl_signature {
    ($($arg:ident),*) => {
        impl<R: 'static, $($arg: 'static),*> Signature for fn($($arg),*) -> R {
            type Params = ($($arg,)*);
            type Return = R;
            const ARITY: usize = count!($($arg)*);

            fn describe() -> SignatureInfo {
                SignatureInfo::new(ValueType::of::<R>(), vec![$(ValueType::of::<$arg>()),*])
            }
        }

        impl_resolve!(C => DefaultCall; $($arg),*);
        impl_resolve!(C => Cdecl; $($arg),*);
        #[cfg(target_arch = "x86")]
        impl_resolve!(stdcall => Stdcall; $($arg),*);
    };
}

impl_signature!();
impl_signature!(A1);
impl_signature!(A1, A2);
impl_signature!(A1, A2, A3);
impl_signature!(A1, A2, A3, A4);
impl_signature!(A1, A2, A3, A4, A5);
impl_signature!(A1, A2, A3, A4, A5, A6);
impl_signature!(A1, A2, A3, A4, A5, A6, A7);
impl_signature!(A1, A2, A3, A4, A5, A6, A7, A8);
impl_signature!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
impl_signature!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
impl_signature!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
impl_signature!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);

/// A runtime signature fixed to a calling convention
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedSignature {
    /// Signature shape
    pub signature: SignatureInfo,
    /// Requested convention
    pub convention: CallingConvention,
    /// Rust ABI string used for the call
    pub abi: &'static str,
}

/// Resolve a runtime signature description under a calling convention.
///
/// Fails with [`BindError::UnsupportedConvention`] when the target has no ABI
/// for `convention`; no module is consulted.
pub fn resolve_signature(
    signature: &SignatureInfo,
    convention: CallingConvention,
) -> Result<ResolvedSignature, BindError> {
    let abi = convention.abi()?;
    Ok(ResolvedSignature {
        signature: signature.clone(),
        convention,
        abi,
    })
}

impl fmt::Display for ResolvedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extern \"{}\" {}", self.abi, self.signature)
    }
}
