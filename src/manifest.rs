//! Interface Manifests
//!
//! A manifest declares an interface in TOML so it can be bound without
//! recompiling:
//!
//! ```toml
//! name = "math"
//! description = "libmath entry points"
//!
//! [[entry]]
//! signature = "i32 add(i32 a, i32 b)"
//!
//! [[entry]]
//! field = "tick"
//! symbol = "noop"
//! signature = "void noop()"
//! convention = "c"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::convention::CallingConvention;
use crate::interface::{EntryDescriptor, InterfaceDescriptor};
use crate::types::SignatureInfo;

/// Manifest errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Interface manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceManifest {
    /// Interface name
    pub name: String,

    /// Brief description
    #[serde(default)]
    pub description: String,

    /// Entries in declaration order
    #[serde(default, rename = "entry")]
    pub entries: Vec<ManifestEntry>,
}

/// One function in a manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    /// Field name; defaults to the prototype's function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Exported name; defaults to the prototype's function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// C-style prototype, e.g. `"double scale(double, double)"`
    pub signature: String,

    /// Calling convention
    #[serde(default)]
    pub convention: CallingConvention,
}

impl ManifestEntry {
    /// Create an entry from a prototype
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            field: None,
            symbol: None,
            signature: signature.into(),
            convention: CallingConvention::Default,
        }
    }

    /// Set the exported name
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Set the calling convention
    pub fn with_convention(mut self, convention: CallingConvention) -> Self {
        self.convention = convention;
        self
    }

    fn to_descriptor(&self) -> Result<EntryDescriptor, ManifestError> {
        let (name, signature) = SignatureInfo::parse(&self.signature).ok_or_else(|| {
            ManifestError::Validation(format!("invalid prototype '{}'", self.signature))
        })?;
        let field = self.field.clone().unwrap_or_else(|| name.clone());
        let symbol = self.symbol.clone().unwrap_or(name);
        Ok(EntryDescriptor::new(field, symbol, signature, self.convention))
    }
}

impl InterfaceManifest {
    /// Create an empty manifest
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            entries: Vec::new(),
        }
    }

    /// Load manifest from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Save manifest to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ManifestError> {
        std::fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Add an entry
    pub fn add_entry(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    /// Build the runtime descriptor.
    ///
    /// Fails on unparsable prototypes and duplicate field names.
    pub fn to_descriptor(&self) -> Result<InterfaceDescriptor, ManifestError> {
        let mut descriptor = InterfaceDescriptor::new(self.name.clone());
        let mut seen = HashSet::new();
        for entry in &self.entries {
            let entry = entry.to_descriptor()?;
            if !seen.insert(entry.field.clone()) {
                return Err(ManifestError::Validation(format!(
                    "duplicate field '{}'",
                    entry.field
                )));
            }
            descriptor.push(entry);
        }
        Ok(descriptor)
    }
}
