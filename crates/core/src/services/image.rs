//! Loading target metadata and section contents from ELF, PE and Mach-O files.

use std::fs;
use std::path::{Path, PathBuf};

use goblin::{elf, mach, pe, Object};
use thiserror::Error;

use crate::model::{Address, Endianness, TargetInfo};

/// `e_ident[EI_OSABI]` index and the FreeBSD ABI value.
const EI_OSABI: usize = 7;
const ELFOSABI_FREEBSD: u8 = 9;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read binary at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse binary: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("unsupported binary format")]
    Unsupported,
}

/// Loaded contents of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub start: Address,
    pub bytes: Vec<u8>,
}

/// Target metadata and initialised sections of a binary.
#[derive(Debug, Clone)]
pub struct BinaryImage {
    pub target: TargetInfo,
    pub segments: Vec<Segment>,
}

impl BinaryImage {
    pub fn load(path: &Path) -> Result<Self, ImageError> {
        let bytes =
            fs::read(path).map_err(|source| ImageError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        match Object::parse(bytes)? {
            Object::Elf(elf) => Ok(from_elf(&elf, bytes)),
            Object::PE(pe) => Ok(from_pe(&pe, bytes)),
            Object::Mach(mach::Mach::Binary(bin)) => Ok(from_mach(&bin)),
            _ => Err(ImageError::Unsupported),
        }
    }
}

fn target(arch: Option<&str>, os: &str, little_endian: bool, is_64: bool) -> TargetInfo {
    TargetInfo {
        arch: arch.map(str::to_string),
        platform: match arch {
            Some(arch) => format!("{os}-{arch}"),
            None => os.to_string(),
        },
        endianness: if little_endian { Endianness::Little } else { Endianness::Big },
        address_size: if is_64 { 8 } else { 4 },
    }
}

fn file_slice(bytes: &[u8], offset: u64, size: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(size).ok()?)?;
    bytes.get(start..end)
}

fn elf_arch(machine: u16) -> Option<&'static str> {
    match machine {
        elf::header::EM_X86_64 => Some("x86_64"),
        elf::header::EM_386 => Some("x86"),
        elf::header::EM_AARCH64 => Some("aarch64"),
        elf::header::EM_ARM => Some("armv7"),
        _ => None,
    }
}

fn from_elf(elf: &elf::Elf, bytes: &[u8]) -> BinaryImage {
    let os = match elf.header.e_ident[EI_OSABI] {
        ELFOSABI_FREEBSD => "freebsd",
        _ => "linux",
    };
    let target = target(elf_arch(elf.header.e_machine), os, elf.little_endian, elf.is_64);

    let segments = elf
        .section_headers
        .iter()
        .filter(|sh| {
            sh.sh_flags & u64::from(elf::section_header::SHF_ALLOC) != 0
                && sh.sh_type != elf::section_header::SHT_NOBITS
                && sh.sh_size > 0
        })
        .filter_map(|sh| {
            let data = file_slice(bytes, sh.sh_offset, sh.sh_size)?;
            Some(Segment {
                name: elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("").to_string(),
                start: sh.sh_addr,
                bytes: data.to_vec(),
            })
        })
        .collect();
    BinaryImage { target, segments }
}

fn from_pe(pe: &pe::PE, bytes: &[u8]) -> BinaryImage {
    let arch = match pe.header.coff_header.machine {
        pe::header::COFF_MACHINE_X86 => Some("x86"),
        pe::header::COFF_MACHINE_X86_64 => Some("x86_64"),
        pe::header::COFF_MACHINE_ARM => Some("armv7"),
        pe::header::COFF_MACHINE_ARM64 => Some("aarch64"),
        _ => None,
    };
    let target = target(arch, "windows", true, pe.is_64);
    let image_base = pe.image_base as u64;

    let segments = pe
        .sections
        .iter()
        .filter(|sec| sec.size_of_raw_data > 0)
        .filter_map(|sec| {
            let data = file_slice(
                bytes,
                u64::from(sec.pointer_to_raw_data),
                u64::from(sec.size_of_raw_data),
            )?;
            Some(Segment {
                name: sec.name().unwrap_or_default().to_string(),
                start: image_base + u64::from(sec.virtual_address),
                bytes: data.to_vec(),
            })
        })
        .collect();
    BinaryImage { target, segments }
}

fn from_mach(bin: &mach::MachO) -> BinaryImage {
    let arch = match bin.header.cputype {
        mach::cputype::CPU_TYPE_X86 => Some("x86"),
        mach::cputype::CPU_TYPE_X86_64 => Some("x86_64"),
        mach::cputype::CPU_TYPE_ARM => Some("armv7"),
        mach::cputype::CPU_TYPE_ARM64 => Some("aarch64"),
        _ => None,
    };
    let target = target(arch, "mac", bin.little_endian, bin.is_64);

    let segments = bin
        .segments
        .sections()
        .flatten()
        .filter_map(Result::ok)
        .filter(|(_, data)| !data.is_empty())
        .map(|(sec, data)| Segment {
            name: sec.name().unwrap_or("").to_string(),
            start: sec.addr,
            bytes: data.to_vec(),
        })
        .collect();
    BinaryImage { target, segments }
}
