use std::fmt::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use fwinspect_core::config::{load_inspection_config, InspectionConfig};
use fwinspect_core::model::{AnalysisReport, SectionEstimate};
use fwinspect_core::services::{inspect, inspect_loaded, load_bundle, load_zlib};
use serde::Serialize;

use crate::commands::{absolutize, format_size};

/// Inputs for one `inspect` invocation, already parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
    pub image: PathBuf,
    pub elf: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub flash_size: Option<u64>,
    pub ram_estimate: Option<u64>,
    pub limit: Option<usize>,
    pub min_len: Option<usize>,
    pub locations: bool,
    pub zlib: bool,
    /// Inspect the firmware carried in a `.px4`/`.apj` bundle's metadata.
    pub bundle: bool,
    pub json: bool,
}

/// JSON envelope printed by `inspect --json`.
#[derive(Debug, Serialize)]
pub struct ReportEnvelope<'a> {
    pub tool_version: &'static str,
    pub analyzed_at: String,
    pub report: &'a AnalysisReport,
}

/// Config file (if any) with command-line overrides applied on top.
pub fn resolve_config(opts: &InspectOptions) -> Result<InspectionConfig> {
    let mut config = match &opts.config {
        Some(path) => load_inspection_config(path)?,
        None => InspectionConfig::default(),
    };
    if let Some(v) = opts.flash_size {
        config.flash_capacity = v;
    }
    if let Some(v) = opts.ram_estimate {
        config.ram_estimate = v;
    }
    if let Some(v) = opts.limit {
        config.match_limit = v;
    }
    if let Some(v) = opts.min_len {
        config.min_run_length = v;
    }
    if opts.locations {
        config.scan_locations = true;
    }
    config.validate().context("Invalid inspection options")?;
    Ok(config)
}

/// Run the inspection and return the report without printing it.
pub fn run_inspection(opts: &InspectOptions) -> Result<AnalysisReport> {
    let config = resolve_config(opts)?;
    let image_path = absolutize(&opts.image)?;
    let elf_path = opts.elf.as_deref().map(absolutize).transpose()?;

    if opts.zlib && opts.bundle {
        bail!("--zlib and --bundle cannot be combined");
    }
    if opts.zlib {
        let image = load_zlib(&image_path)
            .with_context(|| format!("Failed to load compressed image {}", image_path.display()))?;
        return Ok(inspect_loaded(&image, elf_path.as_deref(), &config));
    }
    if opts.bundle {
        let image = load_bundle(&image_path)
            .with_context(|| format!("Failed to unpack bundle {}", image_path.display()))?;
        return Ok(inspect_loaded(&image, elf_path.as_deref(), &config));
    }

    inspect(&image_path, elf_path.as_deref(), &config)
        .with_context(|| format!("Failed to inspect {}", image_path.display()))
}

pub fn inspect_command(opts: &InspectOptions) -> Result<()> {
    let report = run_inspection(opts)?;
    if opts.json {
        let envelope = ReportEnvelope {
            tool_version: fwinspect_core::version(),
            analyzed_at: Utc::now().to_rfc3339(),
            report: &report,
        };
        let serialized =
            serde_json::to_string_pretty(&envelope).context("Failed to serialize report to JSON")?;
        println!("{}", serialized);
    } else {
        print!("{}", render_report(&report)?);
    }
    Ok(())
}

fn write_list<W: Write>(out: &mut W, label: &str, items: &[String]) -> fmt::Result {
    writeln!(out, "  {label}:")?;
    if items.is_empty() {
        writeln!(out, "    (none)")?;
    }
    for item in items {
        writeln!(out, "    - {item}")?;
    }
    Ok(())
}

/// Plain-text rendering of a report.
pub fn render_report(report: &AnalysisReport) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, report).context("Failed to render report")?;
    Ok(out)
}

pub fn write_report<W: Write>(out: &mut W, report: &AnalysisReport) -> fmt::Result {
    writeln!(out, "Firmware: {}", report.image_path.display())?;
    writeln!(out, "Size: {}", format_size(report.image_size))?;
    writeln!(out, "Header: {}", report.header_bytes)?;
    writeln!(out)?;

    writeln!(out, "Sections:")?;
    match &report.symbols {
        Some(symbols) => {
            writeln!(out, "  Architecture: {}", symbols.architecture)?;
            writeln!(out, "  Entry: {:#010x}", symbols.entry_address)?;
            writeln!(out, "  Format: {}", symbols.file_format)?;
        }
        None => writeln!(out, "  (no symbol file; values below are estimates)")?,
    }
    match report.sections {
        SectionEstimate::Measured(sizes) => {
            writeln!(out, "  text: {}", sizes.text)?;
            writeln!(out, "  data: {}", sizes.data)?;
            writeln!(out, "  bss:  {}", sizes.bss)?;
            writeln!(out, "  RAM (data+bss): {}", format_size(sizes.data + sizes.bss))?;
        }
        SectionEstimate::Estimated { text, ram } => {
            writeln!(out, "  text (estimated): {}", format_size(text))?;
            writeln!(out, "  RAM (assumed): {}", format_size(ram))?;
        }
    }
    writeln!(out)?;

    writeln!(out, "Vector table:")?;
    match report.vector_table {
        Some(vt) => {
            writeln!(out, "  Initial SP:    {:#010x}", vt.initial_stack_pointer)?;
            writeln!(out, "  Reset handler: {:#010x}", vt.reset_handler_address)?;
        }
        None => writeln!(out, "  (image too short)")?,
    }
    writeln!(out)?;

    writeln!(out, "Strings:")?;
    write_list(out, "Project", &report.strings.project_matches)?;
    write_list(out, "Version", &report.strings.version_matches)?;
    write_list(out, "Board", &report.strings.board_matches)?;
    writeln!(out)?;

    writeln!(out, "Digests:")?;
    writeln!(out, "  MD5:    {}", report.digest.md5)?;
    writeln!(out, "  SHA256: {}", report.digest.sha256)?;
    writeln!(out)?;

    let cap = &report.capacity;
    writeln!(out, "Flash usage:")?;
    writeln!(
        out,
        "  {} of {} ({}%){}",
        cap.used_bytes,
        cap.total_bytes,
        cap.usage_percent,
        if cap.high_usage { " HIGH" } else { "" }
    )?;

    if let Some(meta) = &report.embedded_metadata {
        writeln!(out)?;
        writeln!(out, "Embedded metadata (offset {:#x}, {} bytes):", meta.offset, meta.length)?;
        for (key, value) in &meta.tags {
            writeln!(out, "  {key}: {value}")?;
        }
        for (key, len) in &meta.blob_lengths {
            writeln!(out, "  {key}: present ({len} bytes)")?;
        }
    }

    if let Some(loc) = &report.locations {
        writeln!(out)?;
        writeln!(out, "Locations:")?;
        write_list(out, "Coordinates", &loc.coordinates)?;
        write_list(out, "Keyword contexts", &loc.keyword_contexts)?;
        let params: Vec<String> = loc
            .parameter_defaults
            .iter()
            .map(|p| format!("{} x{}: {}", p.parameter, p.count, p.samples.join(" | ")))
            .collect();
        write_list(out, "Parameter defaults", &params)?;
        let known: Vec<String> = loc
            .known_test_locations
            .iter()
            .map(|h| format!("{} @ {:#x}: ...{}...", h.value, h.offset, h.context))
            .collect();
        write_list(out, "Known test locations", &known)?;
        let floats: Vec<String> = loc
            .float_coordinates
            .iter()
            .map(|f| format!("{:#010x}: {:.6}", f.offset, f.value))
            .collect();
        write_list(out, "Float candidates", &floats)?;
    }

    if !report.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in &report.warnings {
            writeln!(out, "  - {}", warning.describe())?;
        }
    }
    Ok(())
}
