//! Sizing and decoding of `TypeDef`s against raw bytes.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{DataValue, Endianness, StructType, TargetInfo, TypeDef};

/// Named references deeper than this are treated as a cycle.
const MAX_NAMED_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },
    #[error("value is not string data")]
    NotText,
    #[error("type `{0}` is not registered")]
    UnknownType(String),
    #[error("need {needed} bytes but only {available} are available")]
    Truncated { needed: u64, available: u64 },
    #[error("unsupported integer width {0}")]
    UnsupportedWidth(u8),
    #[error("named type `{0}` nests too deeply (cycle?)")]
    TooDeep(String),
}

/// Decodes bytes according to a type, given the registry and target layout.
pub struct Decoder<'a> {
    types: &'a HashMap<String, TypeDef>,
    endianness: Endianness,
    address_size: u8,
}

impl<'a> Decoder<'a> {
    pub fn new(types: &'a HashMap<String, TypeDef>, target: &TargetInfo) -> Self {
        Self { types, endianness: target.endianness, address_size: target.address_size }
    }

    /// Size in bytes of a value of type `ty`.
    pub fn size_of(&self, ty: &TypeDef) -> Result<u64, DecodeError> {
        self.size_of_at(ty, 0)
    }

    /// Decode a value of type `ty` from the start of `bytes`.
    pub fn decode(&self, ty: &TypeDef, bytes: &[u8]) -> Result<DataValue, DecodeError> {
        self.decode_at(ty, bytes, 0)
    }

    fn resolve(&self, name: &str, depth: usize) -> Result<&'a TypeDef, DecodeError> {
        if depth >= MAX_NAMED_DEPTH {
            return Err(DecodeError::TooDeep(name.to_string()));
        }
        self.types.get(name).ok_or_else(|| DecodeError::UnknownType(name.to_string()))
    }

    fn size_of_at(&self, ty: &TypeDef, depth: usize) -> Result<u64, DecodeError> {
        match ty {
            TypeDef::Integer { width, .. } => Ok(u64::from(*width)),
            TypeDef::Pointer => Ok(u64::from(self.address_size)),
            TypeDef::StringView => Ok(u64::from(self.address_size) * 2),
            TypeDef::Bytes { len } | TypeDef::Utf8 { len } => Ok(*len),
            TypeDef::Named { name } => self.size_of_at(self.resolve(name, depth)?, depth + 1),
            TypeDef::Struct(s) => Ok(self.struct_layout(s, depth)?.size),
        }
    }

    fn align_of(&self, ty: &TypeDef, depth: usize) -> Result<u64, DecodeError> {
        match ty {
            TypeDef::Integer { width, .. } => Ok(u64::from(*width).max(1)),
            TypeDef::Pointer | TypeDef::StringView => Ok(u64::from(self.address_size).max(1)),
            TypeDef::Bytes { .. } | TypeDef::Utf8 { .. } => Ok(1),
            TypeDef::Named { name } => self.align_of(self.resolve(name, depth)?, depth + 1),
            TypeDef::Struct(s) if s.packed => Ok(1),
            TypeDef::Struct(s) => s
                .fields
                .iter()
                .try_fold(1, |acc, f| Ok(acc.max(self.align_of(&f.ty, depth)?))),
        }
    }

    fn struct_layout(&self, s: &StructType, depth: usize) -> Result<StructLayout, DecodeError> {
        let mut offsets = Vec::with_capacity(s.fields.len());
        let mut offset = 0u64;
        let mut max_align = 1u64;
        for field in &s.fields {
            if !s.packed {
                let align = self.align_of(&field.ty, depth)?;
                max_align = max_align.max(align);
                offset = offset.next_multiple_of(align);
            }
            offsets.push(offset);
            offset += self.size_of_at(&field.ty, depth)?;
        }
        let size = if s.packed { offset } else { offset.next_multiple_of(max_align) };
        Ok(StructLayout { offsets, size })
    }

    fn decode_at(
        &self,
        ty: &TypeDef,
        bytes: &[u8],
        depth: usize,
    ) -> Result<DataValue, DecodeError> {
        let size = self.size_of_at(ty, depth)?;
        let window = take(bytes, 0, size)?;
        match ty {
            TypeDef::Integer { width, signed } => {
                let raw = read_uint(window, *width, self.endianness)?;
                Ok(DataValue::Integer(if *signed { sign_extend(raw, *width) } else { raw }))
            }
            TypeDef::Pointer => {
                Ok(DataValue::Pointer(read_uint(window, self.address_size, self.endianness)?))
            }
            TypeDef::StringView => {
                let width = usize::from(self.address_size);
                let address = read_uint(&window[..width], self.address_size, self.endianness)?;
                let length = read_uint(&window[width..], self.address_size, self.endianness)?;
                Ok(DataValue::StringView { address, length })
            }
            TypeDef::Bytes { .. } => Ok(DataValue::Bytes(window.to_vec())),
            TypeDef::Utf8 { .. } => Ok(match std::str::from_utf8(window) {
                Ok(text) => DataValue::Text(text.to_string()),
                Err(_) => DataValue::Bytes(window.to_vec()),
            }),
            TypeDef::Named { name } => self.decode_at(self.resolve(name, depth)?, bytes, depth + 1),
            TypeDef::Struct(s) => {
                let layout = self.struct_layout(s, depth)?;
                let mut fields = Vec::with_capacity(s.fields.len());
                for (field, offset) in s.fields.iter().zip(layout.offsets) {
                    let start = usize::try_from(offset).map_err(|_| truncated(offset, window))?;
                    let value = self.decode_at(&field.ty, &window[start..], depth)?;
                    fields.push((field.name.clone(), value));
                }
                Ok(DataValue::Struct(fields))
            }
        }
    }
}

struct StructLayout {
    offsets: Vec<u64>,
    size: u64,
}

fn truncated(needed: u64, available: &[u8]) -> DecodeError {
    DecodeError::Truncated { needed, available: available.len() as u64 }
}

fn take(bytes: &[u8], start: usize, len: u64) -> Result<&[u8], DecodeError> {
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| truncated(len, bytes))?;
    Ok(&bytes[start..end])
}

/// Read an unsigned integer of `width` bytes.
pub fn read_uint(bytes: &[u8], width: u8, endianness: Endianness) -> Result<u64, DecodeError> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(DecodeError::UnsupportedWidth(width));
    }
    let raw = take(bytes, 0, u64::from(width))?;
    let mut buf = [0u8; 8];
    Ok(match endianness {
        Endianness::Little => {
            buf[..raw.len()].copy_from_slice(raw);
            u64::from_le_bytes(buf)
        }
        Endianness::Big => {
            buf[8 - raw.len()..].copy_from_slice(raw);
            u64::from_be_bytes(buf)
        }
    })
}

fn sign_extend(raw: u64, width: u8) -> u64 {
    let bits = u32::from(width) * 8;
    if bits >= 64 {
        return raw;
    }
    let shift = 64 - bits;
    (((raw << shift) as i64) >> shift) as u64
}
