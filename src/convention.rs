//! Calling Conventions
//!
//! Marker types select an ABI at compile time; [`CallingConvention`] names the
//! same set at run time. Adding a convention means adding one marker, one enum
//! variant and one arm in [`CallingConvention::abi`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::binding::BindError;

/// Compile-time calling convention tag
///
/// Implemented only by the marker types in this module.
pub trait Convention: Copy + Default + Send + Sync + 'static + private::Sealed {
    /// Runtime name of this convention
    const KIND: CallingConvention;
}

/// The platform's default convention for exported C functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DefaultCall;

/// The C calling convention (`cdecl` on 32-bit x86)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cdecl;

/// `stdcall`; only resolvable on 32-bit x86 targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Stdcall;

impl Convention for DefaultCall {
    const KIND: CallingConvention = CallingConvention::Default;
}

impl Convention for Cdecl {
    const KIND: CallingConvention = CallingConvention::C;
}

impl Convention for Stdcall {
    const KIND: CallingConvention = CallingConvention::Stdcall;
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::DefaultCall {}
    impl Sealed for super::Cdecl {}
    impl Sealed for super::Stdcall {}
}

/// Runtime name of a calling convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CallingConvention {
    /// Platform default (`extern "C"`)
    #[default]
    Default,
    /// C calling convention
    C,
    /// Callee-cleanup `stdcall`
    Stdcall,
}

impl CallingConvention {
    /// Every convention, in declaration order
    pub const ALL: [CallingConvention; 3] = [
        CallingConvention::Default,
        CallingConvention::C,
        CallingConvention::Stdcall,
    ];

    /// The Rust ABI string this convention resolves to on the current target
    pub fn abi(self) -> Result<&'static str, BindError> {
        match self {
            CallingConvention::Default | CallingConvention::C => Ok("C"),
            CallingConvention::Stdcall => {
                if cfg!(target_arch = "x86") {
                    Ok("stdcall")
                } else {
                    Err(BindError::UnsupportedConvention(self.to_string()))
                }
            }
        }
    }

    /// Whether bindings with this convention can be resolved on this target
    pub fn is_supported(self) -> bool {
        self.abi().is_ok()
    }

    /// Canonical lowercase name
    pub fn name(self) -> &'static str {
        match self {
            CallingConvention::Default => "default",
            CallingConvention::C => "c",
            CallingConvention::Stdcall => "stdcall",
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CallingConvention {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "defaultcall" => Ok(CallingConvention::Default),
            "c" | "cdecl" | "__cdecl" => Ok(CallingConvention::C),
            "stdcall" | "__stdcall" => Ok(CallingConvention::Stdcall),
            _ => Err(BindError::UnsupportedConvention(s.to_string())),
        }
    }
}

impl TryFrom<String> for CallingConvention {
    type Error = BindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CallingConvention> for String {
    fn from(value: CallingConvention) -> Self {
        value.name().to_string()
    }
}
