pub mod inspect;
pub mod integrity;
pub mod loader;
pub mod location;
pub mod metadata;
pub mod strings;
pub mod symbols;
pub mod vector_table;

pub use inspect::{
    inspect, inspect_image, inspect_loaded, Companion, InspectError, InspectWarning,
};
pub use integrity::{capacity, digest};
pub use loader::{decompress_zlib, default_decompressed_path, load, load_bundle, load_zlib};
pub use metadata::{decode_blob, metadata_files, BlobEncoding, DecodedBlob, MetadataFile};
pub use strings::{extract_strings, StringFilter};
pub use symbols::{analyze, SymbolAnalysis};
pub use vector_table::read_vector_table;
