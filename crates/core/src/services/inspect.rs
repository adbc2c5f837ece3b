use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::InspectionConfig;
use crate::model::{AnalysisReport, FirmwareImage};
use crate::services::integrity::{capacity, digest};
use crate::services::loader::{load, read_companion};
use crate::services::location::scan_locations;
use crate::services::metadata::extract_metadata;
use crate::services::strings::{extract_strings, StringFilter};
use crate::services::symbols::analyze_symbol_bytes;
use crate::services::vector_table::read_vector_table;

/// Number of leading image bytes echoed into the report.
pub const HEADER_DUMP_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Firmware image not found or unreadable at {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Image is {size} bytes; the vector table needs at least 8")]
    TruncatedImage { size: u64 },
    #[error("Unparseable symbol file {}: {reason}", .path.display())]
    UnparseableSymbolFile { path: PathBuf, reason: String },
    #[error("zlib decompression failed: {0}")]
    Decompress(#[source] io::Error),
    #[error("Metadata field `{field}` is not valid base64: {reason}")]
    BlobDecode { field: String, reason: String },
    #[error("No embedded firmware image in {}", .path.display())]
    NoEmbeddedImage { path: PathBuf },
}

/// Non-fatal conditions recorded while building a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InspectWarning {
    /// The companion file could not be read; sections were estimated.
    SymbolFileUnreadable { path: PathBuf, reason: String },
    /// The companion file is not a recognised object; sections were estimated.
    UnparseableSymbolFile { path: PathBuf, reason: String },
    /// The image is too short for a vector table.
    TruncatedImage { size: u64 },
}

impl InspectWarning {
    pub fn describe(&self) -> String {
        match self {
            InspectWarning::SymbolFileUnreadable { path, reason } => {
                format!("symbol file {} unreadable ({reason}); sections estimated", path.display())
            }
            InspectWarning::UnparseableSymbolFile { path, reason } => {
                format!("symbol file {} unparseable ({reason}); sections estimated", path.display())
            }
            InspectWarning::TruncatedImage { size } => {
                format!("image is {size} bytes; vector table skipped")
            }
        }
    }
}

/// Companion object file as read from disk, before parsing.
#[derive(Debug, Clone)]
pub struct Companion {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Load `image_path` (and `symbol_path` if given) and build a report.
///
/// Only a missing or unreadable image is fatal; every other problem degrades
/// into a warning on the report.
pub fn inspect(
    image_path: &Path,
    symbol_path: Option<&Path>,
    config: &InspectionConfig,
) -> Result<AnalysisReport, InspectError> {
    let image = load(image_path)?;
    Ok(inspect_loaded(&image, symbol_path, config))
}

/// Build a report for an image the caller already loaded (for example an
/// inflated zlib image), reading the companion at `symbol_path` if given.
pub fn inspect_loaded(
    image: &FirmwareImage,
    symbol_path: Option<&Path>,
    config: &InspectionConfig,
) -> AnalysisReport {
    let mut warnings = Vec::new();
    let companion = match symbol_path {
        Some(path) => match read_companion(path) {
            Ok(bytes) => Some(Companion { path: path.to_path_buf(), bytes }),
            Err(err) => {
                warnings.push(InspectWarning::SymbolFileUnreadable {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                });
                None
            }
        },
        None => None,
    };

    let mut report = inspect_image(image, companion.as_ref(), config);
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    for warning in &report.warnings {
        warn!(image = %image.path().display(), "{}", warning.describe());
    }
    info!(
        image = %image.path().display(),
        size = report.image_size,
        usage_percent = report.capacity.usage_percent,
        warnings = report.warnings.len(),
        "inspection finished"
    );
    report
}

/// Build a report for an image already in memory. Performs no I/O.
///
/// The stages only read the shared buffer, so they run on scoped threads.
pub fn inspect_image(
    image: &FirmwareImage,
    companion: Option<&Companion>,
    config: &InspectionConfig,
) -> AnalysisReport {
    let bytes = image.bytes();
    let filter = StringFilter::from_config(config);

    let (symbol_analysis, vector, strings, digests, metadata, locations) = thread::scope(|s| {
        let symbols = s.spawn(|| {
            debug!("analyzing sections");
            analyze_symbol_bytes(
                image.size_bytes(),
                companion.map(|c| (c.path.as_path(), c.bytes.as_slice())),
                config.ram_estimate,
            )
        });
        let strings = s.spawn(|| {
            debug!(min_run_length = config.min_run_length, "extracting strings");
            extract_strings(bytes, &filter)
        });
        let digests = s.spawn(|| {
            debug!("computing digests");
            digest(bytes)
        });
        let metadata = s.spawn(|| {
            debug!("searching for embedded metadata");
            extract_metadata(bytes, config.metadata_search_limit)
        });
        let locations = s.spawn(|| {
            if config.scan_locations {
                debug!("scanning for location data");
                Some(scan_locations(bytes))
            } else {
                None
            }
        });
        let vector = read_vector_table(image);

        (
            join_stage(symbols),
            vector,
            join_stage(strings),
            join_stage(digests),
            join_stage(metadata),
            join_stage(locations),
        )
    });

    let mut warnings = Vec::new();
    if let Some(w) = symbol_analysis.warning {
        warnings.push(w);
    }
    let vector_table = match vector {
        Ok(v) => Some(v),
        Err(InspectError::TruncatedImage { size }) => {
            warnings.push(InspectWarning::TruncatedImage { size });
            None
        }
        Err(_) => None,
    };

    AnalysisReport {
        image_path: image.path().to_path_buf(),
        image_size: image.size_bytes(),
        header_bytes: hex_prefix(bytes, HEADER_DUMP_LEN),
        symbols: symbol_analysis.symbols,
        sections: symbol_analysis.sections,
        vector_table,
        strings,
        digest: digests,
        capacity: capacity(image.size_bytes(), config.flash_capacity),
        embedded_metadata: metadata,
        locations,
        warnings,
    }
}

// Stage closures never panic on their own; re-raise if one does.
fn join_stage<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Hex-encode at most `len` leading bytes.
pub fn hex_prefix(bytes: &[u8], len: usize) -> String {
    bytes.iter().take(len).map(|b| format!("{b:02x}")).collect()
}
