//! Core data model shared by the analysis database and the pipeline stages.
//!
//! Everything here is a plain value type:
//! - `TargetInfo`: what the binary was built for (arch, platform, endianness).
//! - `TypeDef` / `StructType`: structural type descriptors stored in the type registry.
//! - `DataObject` / `DataValue`: typed data at an address, decoded once at the boundary.
//! - `Tag` / `TagType`: user-visible annotations attached to addresses.

pub mod decode;

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

pub use decode::{DecodeError, Decoder};

/// Offset into the analysed binary's address space.
pub type Address = u64;

/// Byte order of the analysed binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    pub fn as_str(self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
        }
    }

    /// Parse the stored form; anything unrecognised is treated as little-endian.
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "big" | "be" => Endianness::Big,
            _ => Endianness::Little,
        }
    }
}

fn default_address_size() -> u8 {
    8
}

/// Target metadata of the analysed binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Architecture name (e.g., "x86_64", "aarch64"). `None` when unknown.
    pub arch: Option<String>,
    /// Platform name (e.g., "linux-x86_64", "windows-x86_64"); selects path syntax.
    pub platform: String,
    #[serde(default)]
    pub endianness: Endianness,
    /// Pointer width in bytes.
    #[serde(default = "default_address_size")]
    pub address_size: u8,
}

impl TargetInfo {
    pub fn new(arch: Option<String>, platform: impl Into<String>) -> Self {
        Self {
            arch,
            platform: platform.into(),
            endianness: Endianness::Little,
            address_size: default_address_size(),
        }
    }

    pub fn has_arch(&self) -> bool {
        self.arch.as_deref().is_some_and(|a| !a.is_empty())
    }
}

impl Default for TargetInfo {
    fn default() -> Self {
        Self::new(None, "unknown")
    }
}

/// Structural type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDef {
    /// Fixed-width integer (1, 2, 4 or 8 bytes).
    Integer {
        width: u8,
        #[serde(default)]
        signed: bool,
    },
    /// Target-width pointer.
    Pointer,
    /// Fat string reference: target-width data pointer followed by a target-width length.
    StringView,
    /// Raw byte array.
    Bytes { len: u64 },
    /// Character data expected to hold UTF-8 text.
    Utf8 { len: u64 },
    /// Reference to another registered type by name.
    Named { name: String },
    Struct(StructType),
}

impl TypeDef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeDef::Named { name: name.into() }
    }

    pub fn uint(width: u8) -> Self {
        TypeDef::Integer { width, signed: false }
    }

    /// Name of the referenced type when this is a named reference.
    pub fn as_named(&self) -> Option<&str> {
        match self {
            TypeDef::Named { name } => Some(name),
            _ => None,
        }
    }

    /// Short human-readable rendering used in logs and conflict messages.
    pub fn describe(&self) -> String {
        match self {
            TypeDef::Integer { width, signed: true } => format!("int{}_t", u32::from(*width) * 8),
            TypeDef::Integer { width, signed: false } => format!("uint{}_t", u32::from(*width) * 8),
            TypeDef::Pointer => "void*".to_string(),
            TypeDef::StringView => "string view".to_string(),
            TypeDef::Bytes { len } => format!("uint8_t[{len}]"),
            TypeDef::Utf8 { len } => format!("char[{len}]"),
            TypeDef::Named { name } => name.clone(),
            TypeDef::Struct(s) => {
                let fields: Vec<String> =
                    s.fields.iter().map(|f| format!("{} {}", f.ty.describe(), f.name)).collect();
                format!("struct {{ {} }}", fields.join("; "))
            }
        }
    }
}

/// Composite type with ordered fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    /// Packed structs place fields back to back with no padding.
    #[serde(default)]
    pub packed: bool,
    pub fields: Vec<StructField>,
}

impl StructType {
    pub fn packed() -> Self {
        Self { packed: true, fields: Vec::new() }
    }

    /// Builder-style helper to append a field.
    pub fn with_field(mut self, name: impl Into<String>, ty: TypeDef) -> Self {
        self.fields.push(StructField { name: name.into(), ty });
        self
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn first_field(&self) -> Option<&StructField> {
        self.fields.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDef,
}

/// Decoded value of a data object.
///
/// Produced once when the object is read from the model; consumers never look at
/// raw bytes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataValue {
    /// Integer bits, zero- or sign-extended to 64 bits.
    Integer(u64),
    Pointer(Address),
    StringView { address: Address, length: u64 },
    Bytes(Vec<u8>),
    Text(String),
    Struct(Vec<(String, DataValue)>),
}

impl DataValue {
    /// Look up a struct field by name.
    pub fn field(&self, name: &str) -> Option<&DataValue> {
        match self {
            DataValue::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    /// Address this value points at, for pointers and string views.
    pub fn back_reference(&self) -> Option<Address> {
        match self {
            DataValue::StringView { address, .. } | DataValue::Pointer(address) => Some(*address),
            _ => None,
        }
    }

    /// Length carried by a string view.
    pub fn view_length(&self) -> Option<u64> {
        match self {
            DataValue::StringView { length, .. } => Some(*length),
            _ => None,
        }
    }

    /// Interpret string data as UTF-8 text.
    pub fn decode_text(&self) -> Result<Cow<'_, str>, DecodeError> {
        match self {
            DataValue::Text(text) => Ok(Cow::Borrowed(text)),
            DataValue::Bytes(bytes) => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|e| DecodeError::InvalidUtf8 { valid_up_to: e.valid_up_to() }),
            _ => Err(DecodeError::NotText),
        }
    }

    /// Cut string data down to `len` bytes when it is longer.
    ///
    /// Text is only cut on a character boundary; otherwise it falls back to bytes.
    pub fn truncated(self, len: u64) -> DataValue {
        let Ok(len) = usize::try_from(len) else { return self };
        match self {
            DataValue::Bytes(mut bytes) if len < bytes.len() => {
                bytes.truncate(len);
                DataValue::Bytes(bytes)
            }
            DataValue::Text(text) if len < text.len() => {
                if text.is_char_boundary(len) {
                    DataValue::Text(text[..len].to_string())
                } else {
                    DataValue::Bytes(text.as_bytes()[..len].to_vec())
                }
            }
            other => other,
        }
    }
}

/// A typed data object at an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
    pub address: Address,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeDef,
    /// Decoded value; `None` when the backing bytes are unavailable or undecodable.
    pub value: Option<DataValue>,
    /// Whether the object was defined by a user action rather than automated analysis.
    pub user: bool,
}

impl DataObject {
    /// Name of the object's type when it is a registered (named) type.
    pub fn type_name(&self) -> Option<&str> {
        self.ty.as_named()
    }
}

/// Category of tags; tags of one type share a name and icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagType {
    pub name: String,
    pub icon: String,
}

/// Annotation attached to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub address: Address,
    pub tag_type: String,
    pub data: String,
    /// User tags survive re-analysis and are distinguishable from engine-generated ones.
    pub user: bool,
}

impl Tag {
    pub fn user(address: Address, tag_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { address, tag_type: tag_type.into(), data: data.into(), user: true }
    }
}

/// Code location referring to a data address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRef {
    pub from: Address,
    pub to: Address,
}
