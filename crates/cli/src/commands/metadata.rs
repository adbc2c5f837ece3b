use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fwinspect_core::services::load;
use fwinspect_core::services::metadata::{find_json_object, metadata_files};
use tracing::info;

use crate::commands::{absolutize, format_size};

/// Output directory used when none is given.
pub const DEFAULT_METADATA_DIR: &str = "extracted";

/// Pull the embedded metadata out of a `.px4`/`.apj` style file and write one
/// file per payload plus `metadata.json` for the remaining fields.
///
/// Returns the paths written, in the order they were written.
pub fn extract_metadata_command(input: &Path, output_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let input = absolutize(input)?;
    let image =
        load(&input).with_context(|| format!("Failed to read firmware file {}", input.display()))?;
    let (offset, map) = find_json_object(image.bytes(), None)
        .with_context(|| format!("No embedded metadata found in {}", input.display()))?;

    let out_dir = absolutize(output_dir.unwrap_or_else(|| Path::new(DEFAULT_METADATA_DIR)))?;
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    println!("Embedded metadata at offset {offset:#x} in {}", input.display());
    let mut written = Vec::new();
    for file in metadata_files(&map) {
        let path = out_dir.join(&file.name);
        fs::write(&path, &file.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        let origin = match (&file.field, file.encoding) {
            (Some(field), Some(encoding)) => format!("field `{field}`, decoded ({encoding:?})"),
            (Some(field), None) => format!("field `{field}`"),
            (None, _) => "remaining fields".to_string(),
        };
        println!("  {} <- {origin}, {}", path.display(), format_size(file.bytes.len() as u64));
        written.push(path);
    }
    info!(input = %input.display(), output = %out_dir.display(), files = written.len(), "extracted metadata");
    Ok(written)
}
