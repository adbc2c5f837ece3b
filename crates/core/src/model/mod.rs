//! Core data model for firmware images and the facts derived from them.
//!
//! Every type here is plain data: loading lives in `services::loader`, and each
//! derivation (sections, vector table, strings, digests, capacity) lives in its
//! own service module.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::services::inspect::InspectWarning;
use crate::services::location::LocationReport;
use crate::services::metadata::EmbeddedMetadata;

/// A firmware image read once from disk.
///
/// The bytes are never mutated after load, so a `&FirmwareImage` can be shared
/// freely across the analysis stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FirmwareImage {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self { path: path.into(), bytes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exact byte count of the image.
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Metadata recovered from a companion object file (ELF or PE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub architecture: String,
    pub entry_address: u64,
    pub file_format: String,
    pub section_sizes: SectionSizes,
}

/// Berkeley-style section totals. Sections absent from the object count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSizes {
    pub text: u64,
    pub data: u64,
    pub bss: u64,
}

impl SectionSizes {
    /// Section sizes keyed by their conventional names.
    pub fn as_map(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([("text", self.text), ("data", self.data), ("bss", self.bss)])
    }

    pub fn total(&self) -> u64 {
        self.text + self.data + self.bss
    }
}

/// Section usage, either measured from a companion object or estimated from the
/// raw image alone. Callers have to match on the variant to get at the numbers,
/// so an estimate can't be mistaken for a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionEstimate {
    Measured(SectionSizes),
    /// `text` is the image size; `ram` is the configured RAM assumption.
    Estimated { text: u64, ram: u64 },
}

impl SectionEstimate {
    pub fn is_estimate(&self) -> bool {
        matches!(self, SectionEstimate::Estimated { .. })
    }

    pub fn text_bytes(&self) -> u64 {
        match self {
            SectionEstimate::Measured(sizes) => sizes.text,
            SectionEstimate::Estimated { text, .. } => *text,
        }
    }

    /// RAM footprint: `data + bss` when measured, the assumption otherwise.
    pub fn ram_bytes(&self) -> u64 {
        match self {
            SectionEstimate::Measured(sizes) => sizes.data + sizes.bss,
            SectionEstimate::Estimated { ram, .. } => *ram,
        }
    }
}

/// First two words of an ARM Cortex-M vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorTableInfo {
    pub initial_stack_pointer: u32,
    pub reset_handler_address: u32,
}

/// Keyword-classified printable strings, each list in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedStrings {
    pub project_matches: Vec<String>,
    pub version_matches: Vec<String>,
    pub board_matches: Vec<String>,
}

impl ExtractedStrings {
    pub fn is_empty(&self) -> bool {
        self.project_matches.is_empty()
            && self.version_matches.is_empty()
            && self.board_matches.is_empty()
    }
}

/// Hex-encoded digests of the full image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityDigest {
    pub md5: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityReport {
    pub used_bytes: u64,
    pub total_bytes: u64,
    /// `floor(used * 100 / total)`.
    pub usage_percent: u64,
    /// Set when `usage_percent > 80`.
    pub high_usage: bool,
}

/// Aggregate result of one inspection run.
///
/// `symbols` is present iff a companion object file was supplied and parsed.
/// `vector_table` is absent only for images shorter than eight bytes, in which
/// case `warnings` says so. Everything else is always filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub image_path: PathBuf,
    pub image_size: u64,
    /// Up to the first 32 bytes of the image, hex-encoded.
    pub header_bytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<SymbolInfo>,
    pub sections: SectionEstimate,
    pub vector_table: Option<VectorTableInfo>,
    pub strings: ExtractedStrings,
    pub digest: IntegrityDigest,
    pub capacity: CapacityReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_metadata: Option<EmbeddedMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<LocationReport>,
    pub warnings: Vec<InspectWarning>,
}
