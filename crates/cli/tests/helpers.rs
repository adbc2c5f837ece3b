use std::path::{Path, PathBuf};

use fwinspect::{absolutize, format_size, verbosity_filter};
use tempfile::tempdir;

#[test]
fn absolutize_keeps_absolute_paths() {
    let tmp = tempdir().expect("tempdir");
    let abs = tmp.path().join("fw.bin");
    assert_eq!(absolutize(&abs).expect("absolutize"), abs);
}

#[test]
fn absolutize_joins_relative_paths_with_cwd() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = absolutize(Path::new("build/fw.bin")).expect("absolutize");
    assert_eq!(result, cwd.join(PathBuf::from("build/fw.bin")));
}

#[test]
fn format_size_picks_units() {
    assert_eq!(format_size(512), "512 bytes");
    assert_eq!(format_size(2048), "2.00 KiB (2048 bytes)");
    assert_eq!(format_size(1024 * 1024), "1.00 MiB (1048576 bytes)");
}

#[test]
fn verbosity_maps_to_levels() {
    assert_eq!(verbosity_filter(0), "warn");
    assert_eq!(verbosity_filter(1), "info");
    assert_eq!(verbosity_filter(2), "debug");
    assert_eq!(verbosity_filter(9), "trace");
}
