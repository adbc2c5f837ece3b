//! Embedded JSON metadata, as carried by `.px4`/`.apj` firmware bundles.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::{GzDecoder, ZlibDecoder};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::services::inspect::InspectError;

/// Scalar tags surfaced verbatim when present.
pub const KNOWN_TAGS: &[&str] = &[
    "board_id",
    "magic",
    "description",
    "summary",
    "version",
    "build_time",
    "image_size",
    "image_maxsize",
    "git_identity",
    "git_hash",
    "board_revision",
    "parameter_xml_size",
    "airframe_xml_size",
    "mav_autopilot",
];

/// Payload fields that are only summarised by length.
pub const BLOB_FIELDS: &[&str] = &["image", "parameter_xml", "airframe_xml"];

/// Strings shorter than this are never treated as base64 payloads.
const BASE64_MIN_LEN: usize = 100;
/// Strings longer than this get their own text file.
const LONG_TEXT_LEN: usize = 200;

const GZIP_MAGIC: &[u8] = b"\x1f\x8b";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedMetadata {
    /// Byte offset of the opening brace.
    pub offset: usize,
    pub length: usize,
    /// Every top-level key, sorted.
    pub fields: Vec<String>,
    pub tags: BTreeMap<String, Value>,
    pub blob_lengths: BTreeMap<String, usize>,
}

/// Find the first JSON object in `data`.
///
/// A candidate starts at a `{` followed (after whitespace) by `"`, so empty
/// objects never match. Each candidate is fed to a streaming parser that stops
/// at the first syntax error, which keeps the search linear on binary data.
/// `max_len` bounds how far a single candidate is followed.
pub fn find_json_object(
    data: &[u8],
    max_len: Option<usize>,
) -> Option<(usize, Map<String, Value>)> {
    find_json_span(data, max_len).map(|(offset, _, map)| (offset, map))
}

/// Like [`find_json_object`], also returning the object's length in bytes.
fn find_json_span(
    data: &[u8],
    max_len: Option<usize>,
) -> Option<(usize, usize, Map<String, Value>)> {
    // Non-ASCII bytes are masked so the parser only sees structure; the
    // original bytes are decoded once a span is known.
    let scan: Cow<'_, [u8]> = if data.is_ascii() {
        Cow::Borrowed(data)
    } else {
        Cow::Owned(data.iter().map(|&b| if b.is_ascii() { b } else { b'?' }).collect())
    };

    let mut start = 0;
    while let Some(rel) = scan[start..].iter().position(|&b| b == b'{') {
        let open = start + rel;
        start = open + 1;
        if !looks_like_object_start(&scan[open + 1..]) {
            continue;
        }
        let limit = match max_len {
            Some(max) => scan.len().min(open.saturating_add(max)),
            None => scan.len(),
        };
        let Some(length) = object_len(&scan[open..limit]) else {
            continue;
        };
        if let Some(map) = parse_object(&data[open..open + length]) {
            debug!(offset = open, length, "found embedded JSON object");
            return Some((open, length, map));
        }
    }
    None
}

fn looks_like_object_start(rest: &[u8]) -> bool {
    rest.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'"')
}

/// Length of the JSON value at the start of `buf`, if it is well formed.
fn object_len(buf: &[u8]) -> Option<usize> {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<IgnoredAny>();
    match stream.next() {
        Some(Ok(_)) => Some(stream.byte_offset()),
        _ => None,
    }
}

fn parse_object(candidate: &[u8]) -> Option<Map<String, Value>> {
    let parsed = match std::str::from_utf8(candidate) {
        Ok(text) => serde_json::from_str::<Value>(text),
        Err(_) => serde_json::from_str::<Value>(&String::from_utf8_lossy(candidate)),
    };
    match parsed {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Locate embedded metadata and summarise it. `None` when the image has none.
pub fn extract_metadata(data: &[u8], max_len: Option<usize>) -> Option<EmbeddedMetadata> {
    let (offset, length, map) = find_json_span(data, max_len)?;

    let fields = map.keys().cloned().collect();
    let mut tags = BTreeMap::new();
    let mut blob_lengths = BTreeMap::new();
    for (key, value) in &map {
        if BLOB_FIELDS.contains(&key.as_str()) {
            let len = match value {
                Value::String(s) => s.len(),
                other => other.to_string().len(),
            };
            blob_lengths.insert(key.clone(), len);
        } else if KNOWN_TAGS.contains(&key.as_str()) {
            tags.insert(key.clone(), value.clone());
        }
    }
    Some(EmbeddedMetadata { offset, length, fields, tags, blob_lengths })
}

/// Compression found inside a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobEncoding {
    Raw,
    Gzip,
    Zlib,
    Zip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlob {
    pub field: String,
    pub encoding: BlobEncoding,
    pub bytes: Vec<u8>,
}

/// Base64-decode a payload field and inflate it when it is gzip, zlib or a
/// zip archive (first entry).
///
/// Line breaks inside the base64 text are ignored. A payload that carries a
/// compression signature but fails to inflate is returned as raw bytes.
pub fn decode_blob(field: &str, encoded: &str) -> Result<DecodedBlob, InspectError> {
    let cleaned: Vec<u8> = encoded.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let raw = STANDARD.decode(&cleaned).map_err(|e| InspectError::BlobDecode {
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    let inflated = if raw.starts_with(GZIP_MAGIC) {
        Some((BlobEncoding::Gzip, read_all(GzDecoder::new(raw.as_slice()))))
    } else if raw.first() == Some(&0x78) {
        Some((BlobEncoding::Zlib, read_all(ZlibDecoder::new(raw.as_slice()))))
    } else if raw.starts_with(ZIP_MAGIC) {
        Some((BlobEncoding::Zip, first_zip_entry(&raw)))
    } else {
        None
    };

    let (encoding, bytes) = match inflated {
        Some((encoding, Ok(bytes))) => (encoding, bytes),
        Some((encoding, Err(err))) => {
            debug!(field, ?encoding, error = %err, "payload did not inflate; keeping raw bytes");
            (BlobEncoding::Raw, raw)
        }
        None => (BlobEncoding::Raw, raw),
    };
    debug!(field, ?encoding, size = bytes.len(), "decoded metadata payload");
    Ok(DecodedBlob { field: field.to_string(), encoding, bytes })
}

fn read_all(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

fn first_zip_entry(raw: &[u8]) -> io::Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(raw))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let entry = archive
        .by_index(0)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    read_all(entry)
}

/// One output file produced from a metadata object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFile {
    pub name: String,
    /// Source field; `None` for the collected scalar fields.
    pub field: Option<String>,
    /// Set when the contents were base64-decoded.
    pub encoding: Option<BlobEncoding>,
    pub bytes: Vec<u8>,
}

/// Split a metadata object into files.
///
/// Base64 payloads are decoded (`image` becomes `firmware.bin`, XML fields
/// become `<key>.xml` when the result is UTF-8, anything else `<key>.bin`).
/// XML and long or multi-line strings are written as text. Every other
/// non-null field is collected into `metadata.json`, which is always last.
pub fn metadata_files(map: &Map<String, Value>) -> Vec<MetadataFile> {
    let mut files = Vec::new();
    let mut remaining = Map::new();

    for (key, value) in map {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.as_str(),
            other => {
                remaining.insert(key.clone(), other.clone());
                continue;
            }
        };
        let stem = file_stem(key);
        let is_xml = key.ends_with("_xml");

        if looks_like_base64(text) {
            match decode_blob(key, text) {
                Ok(blob) => {
                    let name = if key == "image" {
                        "firmware.bin".to_string()
                    } else if is_xml && std::str::from_utf8(&blob.bytes).is_ok() {
                        format!("{stem}.xml")
                    } else {
                        format!("{stem}.bin")
                    };
                    files.push(MetadataFile {
                        name,
                        field: Some(key.clone()),
                        encoding: Some(blob.encoding),
                        bytes: blob.bytes,
                    });
                    continue;
                }
                Err(err) => warn!(field = %key, error = %err, "base64 payload did not decode"),
            }
        }

        if is_xml || text.contains('\n') || text.len() > LONG_TEXT_LEN {
            let ext = if is_xml { "xml" } else { "txt" };
            files.push(MetadataFile {
                name: format!("{stem}.{ext}"),
                field: Some(key.clone()),
                encoding: None,
                bytes: text.as_bytes().to_vec(),
            });
            continue;
        }
        remaining.insert(key.clone(), value.clone());
    }

    files.push(MetadataFile {
        name: "metadata.json".into(),
        field: None,
        encoding: None,
        bytes: format!("{:#}\n", Value::Object(remaining)).into_bytes(),
    });
    files
}

fn looks_like_base64(text: &str) -> bool {
    text.len() > BASE64_MIN_LEN
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'\n' | b'\r'))
}

/// Keys become file names; anything outside `[A-Za-z0-9_-]` is replaced.
fn file_stem(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "field".into()
    } else {
        stem
    }
}
