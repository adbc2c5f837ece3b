use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fwinspect_core::services::{decompress_zlib, default_decompressed_path};
use tracing::info;

use crate::commands::{absolutize, format_size};

/// Inflate a zlib-compressed firmware file and write the result.
///
/// Returns the path written. With no `output`, writes `<stem>_decompressed.bin`
/// beside the input.
pub fn decompress_command(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let input = absolutize(input)?;
    let compressed = fs::read(&input)
        .with_context(|| format!("Failed to read firmware file {}", input.display()))?;
    let inflated = decompress_zlib(&compressed)
        .with_context(|| format!("Failed to decompress {}", input.display()))?;

    let out_path = match output {
        Some(p) => absolutize(p)?,
        None => default_decompressed_path(&input),
    };
    fs::write(&out_path, &inflated)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    info!(input = %input.display(), output = %out_path.display(), "decompressed firmware");

    println!("Decompressed firmware:");
    println!("  Input:        {}", input.display());
    println!("  Compressed:   {}", format_size(compressed.len() as u64));
    println!("  Decompressed: {}", format_size(inflated.len() as u64));
    if !inflated.is_empty() {
        let ratio = compressed.len() as f64 / inflated.len() as f64 * 100.0;
        println!("  Ratio:        {ratio:.2}%");
    }
    let header: Vec<String> = inflated.iter().take(16).map(|b| format!("{b:02x}")).collect();
    println!("  Header:       {}", header.join(" "));
    println!("  Output:       {}", out_path.display());

    Ok(out_path)
}
