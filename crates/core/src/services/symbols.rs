//! Section and architecture facts from a companion object file, with a
//! size-only fallback when there isn't one.

use std::path::Path;

use goblin::elf::section_header::{SHF_ALLOC, SHF_WRITE, SHT_NOBITS};
use goblin::pe::section_table::{
    IMAGE_SCN_CNT_CODE, IMAGE_SCN_CNT_INITIALIZED_DATA, IMAGE_SCN_CNT_UNINITIALIZED_DATA,
};
use goblin::{elf, pe, Object};
use tracing::debug;

use crate::model::{FirmwareImage, SectionEstimate, SectionSizes, SymbolInfo};
use crate::services::inspect::{InspectError, InspectWarning};
use crate::services::loader::read_companion;

/// Outcome of section analysis: measured facts when a companion parsed, the
/// fallback estimate otherwise, plus the reason for any downgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolAnalysis {
    pub symbols: Option<SymbolInfo>,
    pub sections: SectionEstimate,
    pub warning: Option<InspectWarning>,
}

/// Analyze `image`, reading the companion at `symbol_path` if one is given.
///
/// Never fails: an unreadable or unparseable companion falls back to the
/// estimate and is reported through `warning`.
pub fn analyze(
    image: &FirmwareImage,
    symbol_path: Option<&Path>,
    ram_estimate: u64,
) -> SymbolAnalysis {
    let Some(path) = symbol_path else {
        return analyze_symbol_bytes(image.size_bytes(), None, ram_estimate);
    };
    match read_companion(path) {
        Ok(bytes) => analyze_symbol_bytes(image.size_bytes(), Some((path, &bytes)), ram_estimate),
        Err(err) => SymbolAnalysis {
            symbols: None,
            sections: estimate(image.size_bytes(), ram_estimate),
            warning: Some(InspectWarning::SymbolFileUnreadable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }),
        },
    }
}

/// Same as [`analyze`] over companion bytes already in memory.
pub fn analyze_symbol_bytes(
    image_size: u64,
    companion: Option<(&Path, &[u8])>,
    ram_estimate: u64,
) -> SymbolAnalysis {
    let Some((path, bytes)) = companion else {
        return SymbolAnalysis {
            symbols: None,
            sections: estimate(image_size, ram_estimate),
            warning: None,
        };
    };
    match parse_object(path, bytes) {
        Ok(info) => SymbolAnalysis {
            sections: SectionEstimate::Measured(info.section_sizes),
            symbols: Some(info),
            warning: None,
        },
        Err(InspectError::UnparseableSymbolFile { path, reason }) => SymbolAnalysis {
            symbols: None,
            sections: estimate(image_size, ram_estimate),
            warning: Some(InspectWarning::UnparseableSymbolFile { path, reason }),
        },
        Err(other) => SymbolAnalysis {
            symbols: None,
            sections: estimate(image_size, ram_estimate),
            warning: Some(InspectWarning::UnparseableSymbolFile {
                path: path.to_path_buf(),
                reason: other.to_string(),
            }),
        },
    }
}

/// Fallback when no measured sizes exist: the whole image counts as text.
pub fn estimate(image_size: u64, ram_estimate: u64) -> SectionEstimate {
    SectionEstimate::Estimated { text: image_size, ram: ram_estimate }
}

/// Parse an ELF or PE object and pull out architecture, entry and section totals.
pub fn parse_object(path: &Path, bytes: &[u8]) -> Result<SymbolInfo, InspectError> {
    let unparseable = |reason: String| InspectError::UnparseableSymbolFile {
        path: path.to_path_buf(),
        reason,
    };
    match Object::parse(bytes) {
        Ok(Object::Elf(elf)) => {
            let info = elf_info(&elf);
            debug!(
                path = %path.display(),
                arch = %info.architecture,
                entry = info.entry_address,
                "parsed ELF companion"
            );
            Ok(info)
        }
        Ok(Object::PE(pe)) => {
            let info = pe_info(&pe);
            debug!(path = %path.display(), arch = %info.architecture, "parsed PE companion");
            Ok(info)
        }
        Ok(_) => Err(unparseable("unsupported object format".into())),
        Err(e) => Err(unparseable(e.to_string())),
    }
}

fn elf_info(elf: &elf::Elf) -> SymbolInfo {
    let mut sizes = SectionSizes::default();
    for shdr in &elf.section_headers {
        if shdr.sh_flags & u64::from(SHF_ALLOC) == 0 {
            continue;
        }
        if shdr.sh_type == SHT_NOBITS {
            sizes.bss += shdr.sh_size;
        } else if shdr.sh_flags & u64::from(SHF_WRITE) != 0 {
            sizes.data += shdr.sh_size;
        } else {
            sizes.text += shdr.sh_size;
        }
    }

    let machine = elf.header.e_machine;
    SymbolInfo {
        architecture: elf_arch_name(machine),
        entry_address: elf.entry,
        file_format: elf_format_name(machine, elf.is_64, elf.little_endian),
        section_sizes: sizes,
    }
}

fn elf_arch_name(machine: u16) -> String {
    match machine {
        elf::header::EM_ARM => "arm".into(),
        elf::header::EM_AARCH64 => "aarch64".into(),
        elf::header::EM_386 => "i386".into(),
        elf::header::EM_X86_64 => "i386:x86-64".into(),
        elf::header::EM_RISCV => "riscv".into(),
        elf::header::EM_MIPS => "mips".into(),
        elf::header::EM_PPC => "powerpc".into(),
        other => elf::header::machine_to_str(other).to_lowercase(),
    }
}

/// objdump-style target name, e.g. `elf32-littlearm`.
fn elf_format_name(machine: u16, is_64: bool, little_endian: bool) -> String {
    let bits = if is_64 { 64 } else { 32 };
    let endian = if little_endian { "little" } else { "big" };
    match machine {
        elf::header::EM_X86_64 => "elf64-x86-64".into(),
        elf::header::EM_386 => "elf32-i386".into(),
        elf::header::EM_MIPS => format!("elf{bits}-trad{endian}mips"),
        elf::header::EM_ARM => format!("elf32-{endian}arm"),
        elf::header::EM_AARCH64 => format!("elf64-{endian}aarch64"),
        elf::header::EM_RISCV => format!("elf{bits}-littleriscv"),
        other => format!("elf{bits}-{endian}{}", elf::header::machine_to_str(other).to_lowercase()),
    }
}

fn pe_info(pe: &pe::PE) -> SymbolInfo {
    let mut sizes = SectionSizes::default();
    for sec in &pe.sections {
        let size = if sec.virtual_size == 0 {
            u64::from(sec.size_of_raw_data)
        } else {
            u64::from(sec.virtual_size)
        };
        if sec.characteristics & IMAGE_SCN_CNT_CODE != 0 {
            sizes.text += size;
        } else if sec.characteristics & IMAGE_SCN_CNT_UNINITIALIZED_DATA != 0 {
            sizes.bss += size;
        } else if sec.characteristics & IMAGE_SCN_CNT_INITIALIZED_DATA != 0 {
            sizes.data += size;
        }
    }

    let (architecture, file_format) = match pe.header.coff_header.machine {
        pe::header::COFF_MACHINE_X86 => ("i386", "pei-i386"),
        pe::header::COFF_MACHINE_X86_64 => ("i386:x86-64", "pei-x86-64"),
        pe::header::COFF_MACHINE_ARM | pe::header::COFF_MACHINE_ARMNT => ("arm", "pei-arm-little"),
        pe::header::COFF_MACHINE_ARM64 => ("aarch64", "pei-aarch64-little"),
        _ => ("unknown", "pei-unknown"),
    };
    SymbolInfo {
        architecture: architecture.into(),
        entry_address: (pe.image_base as u64).wrapping_add(pe.entry as u64),
        file_format: file_format.into(),
        section_sizes: sizes,
    }
}
