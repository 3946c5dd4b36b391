//! Signature Vocabulary
//!
//! Runtime descriptions of native function signatures. Typed bindings carry
//! their signature in the type system; these values describe the same shape
//! for diagnostics, manifests and the runtime descriptor path.

use std::any::{type_name, TypeId};
use std::ffi::c_void;
use std::fmt;
use std::os::raw::c_char;

/// Scalar types a native signature can be described with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Void (no value)
    Void,
    /// C `bool` / Rust `bool`
    Bool,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// Pointer-sized unsigned integer (size_t)
    Usize,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// Pointer-sized signed integer (ssize_t / intptr_t)
    Isize,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
    /// Untyped pointer (void*)
    Ptr,
    /// Null-terminated C string (const char*)
    CStr,
    /// Any other Rust type, described by its type name
    Opaque(&'static str),
}

impl ValueType {
    /// Describe a Rust type used in a binding signature
    pub fn of<T: 'static>() -> Self {
        let id = TypeId::of::<T>();
        let known = [
            (TypeId::of::<()>(), ValueType::Void),
            (TypeId::of::<bool>(), ValueType::Bool),
            (TypeId::of::<u8>(), ValueType::U8),
            (TypeId::of::<u16>(), ValueType::U16),
            (TypeId::of::<u32>(), ValueType::U32),
            (TypeId::of::<u64>(), ValueType::U64),
            (TypeId::of::<usize>(), ValueType::Usize),
            (TypeId::of::<i8>(), ValueType::I8),
            (TypeId::of::<i16>(), ValueType::I16),
            (TypeId::of::<i32>(), ValueType::I32),
            (TypeId::of::<i64>(), ValueType::I64),
            (TypeId::of::<isize>(), ValueType::Isize),
            (TypeId::of::<f32>(), ValueType::F32),
            (TypeId::of::<f64>(), ValueType::F64),
            (TypeId::of::<*mut c_void>(), ValueType::Ptr),
            (TypeId::of::<*const c_void>(), ValueType::Ptr),
            (TypeId::of::<*const c_char>(), ValueType::CStr),
            (TypeId::of::<*mut c_char>(), ValueType::CStr),
        ];

        known
            .iter()
            .find(|(known_id, _)| *known_id == id)
            .map(|(_, ty)| *ty)
            .unwrap_or_else(|| ValueType::Opaque(type_name::<T>()))
    }

    /// Get the size in bytes of this type, if it is one of the scalar types
    pub fn size(&self) -> Option<usize> {
        match self {
            ValueType::Void => Some(0),
            ValueType::Bool | ValueType::U8 | ValueType::I8 => Some(1),
            ValueType::U16 | ValueType::I16 => Some(2),
            ValueType::U32 | ValueType::I32 | ValueType::F32 => Some(4),
            ValueType::U64 | ValueType::I64 | ValueType::F64 => Some(8),
            ValueType::Usize | ValueType::Isize | ValueType::Ptr | ValueType::CStr => {
                Some(std::mem::size_of::<usize>())
            }
            ValueType::Opaque(_) => None,
        }
    }

    /// Check if this type is an integer type
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ValueType::U8
                | ValueType::U16
                | ValueType::U32
                | ValueType::U64
                | ValueType::Usize
                | ValueType::I8
                | ValueType::I16
                | ValueType::I32
                | ValueType::I64
                | ValueType::Isize
        )
    }

    /// Check if this type is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, ValueType::F32 | ValueType::F64)
    }

    /// Check if this type is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, ValueType::Ptr | ValueType::CStr)
    }

    /// Parse a C or Rust spelling of a scalar type
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_lowercase().as_str() {
            "void" | "()" => Some(ValueType::Void),
            "bool" | "_bool" => Some(ValueType::Bool),
            "u8" | "uint8" | "uint8_t" | "byte" | "unsigned char" => Some(ValueType::U8),
            "u16" | "uint16" | "uint16_t" | "unsigned short" => Some(ValueType::U16),
            "u32" | "uint32" | "uint32_t" | "unsigned" | "unsigned int" => Some(ValueType::U32),
            "u64" | "uint64" | "uint64_t" | "unsigned long long" => Some(ValueType::U64),
            "usize" | "size_t" | "uintptr_t" => Some(ValueType::Usize),
            "i8" | "int8" | "int8_t" | "char" | "signed char" => Some(ValueType::I8),
            "i16" | "int16" | "int16_t" | "short" => Some(ValueType::I16),
            "i32" | "int32" | "int32_t" | "int" => Some(ValueType::I32),
            "i64" | "int64" | "int64_t" | "long long" => Some(ValueType::I64),
            "isize" | "ssize_t" | "intptr_t" | "ptrdiff_t" => Some(ValueType::Isize),
            "f32" | "float" => Some(ValueType::F32),
            "f64" | "double" => Some(ValueType::F64),
            "ptr" | "pointer" | "void*" | "void *" | "const void*" | "const void *" => {
                Some(ValueType::Ptr)
            }
            "cstr" | "string" | "char*" | "char *" | "const char*" | "const char *" => {
                Some(ValueType::CStr)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Void => write!(f, "void"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::U8 => write!(f, "u8"),
            ValueType::U16 => write!(f, "u16"),
            ValueType::U32 => write!(f, "u32"),
            ValueType::U64 => write!(f, "u64"),
            ValueType::Usize => write!(f, "usize"),
            ValueType::I8 => write!(f, "i8"),
            ValueType::I16 => write!(f, "i16"),
            ValueType::I32 => write!(f, "i32"),
            ValueType::I64 => write!(f, "i64"),
            ValueType::Isize => write!(f, "isize"),
            ValueType::F32 => write!(f, "f32"),
            ValueType::F64 => write!(f, "f64"),
            ValueType::Ptr => write!(f, "ptr"),
            ValueType::CStr => write!(f, "cstr"),
            ValueType::Opaque(name) => write!(f, "{}", name),
        }
    }
}

/// Shape of a native function: return type plus ordered parameter types
///
/// Two signatures with the same shape compare equal; the exported name is
/// not part of the signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureInfo {
    /// Return type
    pub returns: ValueType,
    /// Parameter types, in call order
    pub params: Vec<ValueType>,
}

impl SignatureInfo {
    /// Create a new signature description
    pub fn new(returns: ValueType, params: Vec<ValueType>) -> Self {
        Self { returns, params }
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Parse a C-style prototype
    ///
    /// Format: `"return_type function_name(param1_type [name], ...)"`. Returns
    /// the function name alongside the signature. Variadic prototypes are
    /// rejected since a typed binding cannot express them.
    pub fn parse(prototype: &str) -> Option<(String, Self)> {
        let prototype = prototype.trim().trim_end_matches(';').trim();

        let paren_pos = prototype.find('(')?;
        let before_paren = prototype[..paren_pos].trim();
        let after_paren = prototype[paren_pos + 1..].trim();
        let params_str = after_paren.strip_suffix(')')?.trim();

        // Pointer stars may hug the name ("char *name"), so split at the last
        // whitespace or star.
        let split = before_paren.rfind(|c: char| c.is_whitespace() || c == '*')?;
        let name = before_paren[split + 1..].trim();
        let return_str = before_paren[..=split].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        let returns = ValueType::parse(return_str)?;

        let mut params = Vec::new();
        if !params_str.is_empty() && params_str != "void" {
            for param in params_str.split(',') {
                let param = param.trim();
                if param == "..." {
                    return None;
                }
                params.push(parse_param(param)?);
            }
        }

        Some((name.to_string(), Self { returns, params }))
    }
}

/// Parse one parameter, with or without a trailing parameter name
fn parse_param(param: &str) -> Option<ValueType> {
    if let Some(ty) = ValueType::parse(param) {
        return Some(ty);
    }
    let split = param.rfind(|c: char| c.is_whitespace() || c == '*')?;
    ValueType::parse(&param[..=split])
}

impl fmt::Display for SignatureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")?;
        if self.returns != ValueType::Void {
            write!(f, " -> {}", self.returns)?;
        }
        Ok(())
    }
}
