//! Image loading. This is the only stage that touches the filesystem.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use serde_json::Value;
use tracing::{debug, info};

use crate::model::FirmwareImage;
use crate::services::inspect::InspectError;
use crate::services::metadata::{decode_blob, find_json_object};

/// Read the whole image at `path`.
pub fn load(path: &Path) -> Result<FirmwareImage, InspectError> {
    let bytes = fs::read(path)
        .map_err(|source| InspectError::NotFound { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), size = bytes.len(), "loaded firmware image");
    Ok(FirmwareImage::new(path, bytes))
}

/// Read a companion object file. Failures here are never fatal to an inspection.
pub fn read_companion(path: &Path) -> io::Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), size = bytes.len(), "read companion object file");
    Ok(bytes)
}

/// Inflate a zlib stream.
pub fn decompress_zlib(compressed: &[u8]) -> Result<Vec<u8>, InspectError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(InspectError::Decompress)?;
    debug!(compressed = compressed.len(), decompressed = out.len(), "inflated zlib stream");
    Ok(out)
}

/// Load a zlib-compressed image and return its inflated contents.
///
/// The returned image keeps the original path so reports still name the file
/// the user pointed at.
pub fn load_zlib(path: &Path) -> Result<FirmwareImage, InspectError> {
    let compressed = load(path)?;
    let bytes = decompress_zlib(compressed.bytes())?;
    Ok(FirmwareImage::new(path, bytes))
}

/// Load a `.px4`/`.apj` style bundle and return the firmware carried in its
/// metadata `image` field, decoded and inflated.
///
/// The returned image keeps the bundle's path.
pub fn load_bundle(path: &Path) -> Result<FirmwareImage, InspectError> {
    let bundle = load(path)?;
    let missing = || InspectError::NoEmbeddedImage { path: path.to_path_buf() };
    let (_, map) = find_json_object(bundle.bytes(), None).ok_or_else(missing)?;
    let encoded = map.get("image").and_then(Value::as_str).ok_or_else(missing)?;
    let blob = decode_blob("image", encoded)?;
    info!(
        path = %path.display(),
        encoding = ?blob.encoding,
        size = blob.bytes.len(),
        "unpacked firmware from bundle metadata"
    );
    Ok(FirmwareImage::new(path, blob.bytes))
}

/// `<dir>/<stem>_decompressed.bin` next to `input`.
pub fn default_decompressed_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("firmware");
    input.with_file_name(format!("{stem}_decompressed.bin"))
}
