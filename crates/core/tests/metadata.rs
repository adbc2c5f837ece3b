use std::io::{Cursor, Write};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use fwinspect_core::services::metadata::{
    decode_blob, extract_metadata, find_json_object, metadata_files, BlobEncoding,
};
use fwinspect_core::services::{load_bundle, InspectError};
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

fn px4_like() -> Vec<u8> {
    let mut data = b"\x00\x01{ not json }\x7b\x02".to_vec();
    data.extend_from_slice(
        br#"{"board_id": 9, "magic": "PX4FWv1", "description": "Firmware for the FMUv2 board",
"image": "eJzt3Xl8VNX9//HPJZksJhAggLIvCYKCgoooAiqIKChuVRS1Lq", "image_size": 1048576,
"git_identity": "v1.14.0-1-gabcdef", "summary": "PX4FMUv2", "version": "0.1",
"parameter_xml": "<parameters/>", "custom_field": {"nested": "{not a brace}"}}"#,
    );
    data.extend_from_slice(b"\x00\xff trailing");
    data
}

#[test]
fn finds_metadata_after_non_json_braces() {
    let data = px4_like();
    let meta = extract_metadata(&data, None).expect("metadata");
    assert_eq!(meta.offset, 16);
    assert_eq!(&data[meta.offset..meta.offset + 1], b"{");
    assert_eq!(data[meta.offset + meta.length - 1], b'}');

    assert_eq!(meta.tags["board_id"], 9);
    assert_eq!(meta.tags["magic"], "PX4FWv1");
    assert_eq!(meta.tags["image_size"], 1_048_576);
    assert_eq!(meta.tags["git_identity"], "v1.14.0-1-gabcdef");
    assert!(!meta.tags.contains_key("image"));
    assert!(!meta.tags.contains_key("custom_field"));

    assert_eq!(meta.blob_lengths["image"], 50);
    assert_eq!(meta.blob_lengths["parameter_xml"], "<parameters/>".len());
    assert!(meta.fields.contains(&"custom_field".to_string()));
}

#[test]
fn plain_firmware_has_no_metadata() {
    let data = [0x00u8, 0x00, 0x02, 0x20, 0x7B, 0x7D, 0x41, 0x42];
    assert!(extract_metadata(&data, None).is_none());
}

#[test]
fn search_limit_bounds_candidate_length() {
    let data = br#"{"a": "0123456789abcdef"}"#;
    assert!(find_json_object(data, Some(8)).is_none());
    assert!(find_json_object(data, Some(data.len())).is_some());
}

#[test]
fn invalid_utf8_inside_strings_is_decoded_lossily() {
    let mut data = br#"{"board_id": 50, "description": "bad "#.to_vec();
    data.push(0xFF);
    data.extend_from_slice(br#" byte"}"#);
    let meta = extract_metadata(&data, None).expect("metadata");
    assert_eq!(meta.tags["board_id"], 50);
    assert!(meta.tags["description"].as_str().unwrap().starts_with("bad "));
}

#[test]
fn braces_inside_strings_do_not_close_the_object() {
    let data = br#"xx{"a":"}{\"}","b":1}yy"#;
    let (offset, map) = find_json_object(data, None).unwrap();
    assert_eq!(offset, 2);
    assert_eq!(map["b"], 1);
}

#[test]
fn unbalanced_candidate_is_skipped() {
    assert!(find_json_object(br#"{"open": 1"#, None).is_none());
}

#[test]
fn unterminated_candidates_do_not_blow_up_search_time() {
    // Every `{"` here starts a candidate that never closes.
    let data = b"{\"a".repeat(1 << 20);
    let started = Instant::now();
    assert!(find_json_object(&data, None).is_none());
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "search took {:?}",
        started.elapsed()
    );
}

#[test]
fn unterminated_candidates_in_binary_noise_are_skipped() {
    let mut data = Vec::new();
    for i in 0..20_000u32 {
        data.extend_from_slice(b"{\"k\": \"");
        data.extend_from_slice(&i.to_le_bytes());
        data.push(0x80);
    }
    data.extend_from_slice(br#"{"board_id": 7}"#);
    let meta = extract_metadata(&data, None).expect("metadata");
    assert_eq!(meta.tags["board_id"], 7);
    assert_eq!(meta.offset, data.len() - meta.length);
}

fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

fn zipped(name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file(name, options).unwrap();
    writer.write_all(bytes).unwrap();
    writer.finish().unwrap().into_inner()
}

fn firmware_payload() -> Vec<u8> {
    let mut fw = Vec::new();
    fw.extend_from_slice(&0x2002_0000u32.to_le_bytes());
    fw.extend_from_slice(&0x0800_0201u32.to_le_bytes());
    fw.extend_from_slice(b"PX4 firmware v1.14.0\0");
    // Pseudo-random filler so the compressed payload stays well above the
    // base64 length threshold.
    fw.extend((0..480u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8));
    fw
}

#[test]
fn decode_blob_inflates_zlib_payload() {
    let fw = firmware_payload();
    let blob = decode_blob("image", &b64(&zlib(&fw))).expect("decode");
    assert_eq!(blob.encoding, BlobEncoding::Zlib);
    assert_eq!(blob.field, "image");
    assert_eq!(blob.bytes, fw);
}

#[test]
fn decode_blob_inflates_gzip_and_zip_payloads() {
    let xml = b"<?xml version=\"1.0\"?><parameters/>";
    let gz = decode_blob("parameter_xml", &b64(&gzip(xml))).expect("gzip");
    assert_eq!((gz.encoding, gz.bytes.as_slice()), (BlobEncoding::Gzip, &xml[..]));

    let zp = decode_blob("airframe_xml", &b64(&zipped("airframes.xml", xml))).expect("zip");
    assert_eq!((zp.encoding, zp.bytes.as_slice()), (BlobEncoding::Zip, &xml[..]));
}

#[test]
fn decode_blob_ignores_line_breaks_and_keeps_uncompressed_bytes() {
    let raw = b"plain payload without any compression header".to_vec();
    let mut encoded = b64(&raw);
    encoded.insert(8, '\n');
    encoded.insert(20, '\r');
    let blob = decode_blob("image", &encoded).expect("decode");
    assert_eq!(blob.encoding, BlobEncoding::Raw);
    assert_eq!(blob.bytes, raw);
}

#[test]
fn decode_blob_keeps_raw_bytes_when_signature_lies() {
    // Starts with the zlib CMF byte but is not a zlib stream.
    let raw = vec![0x78, 0x00, 0x01, 0x02, 0x03];
    let blob = decode_blob("image", &b64(&raw)).expect("decode");
    assert_eq!(blob.encoding, BlobEncoding::Raw);
    assert_eq!(blob.bytes, raw);
}

#[test]
fn decode_blob_rejects_non_base64() {
    let err = decode_blob("image", "not*base64!").unwrap_err();
    match err {
        InspectError::BlobDecode { field, .. } => assert_eq!(field, "image"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn metadata_files_split_payloads_text_and_scalars() {
    let fw = firmware_payload();
    let params: String = (0..60)
        .map(|i| format!("<param name=\"P{i}\" default=\"{}\"/>", i * 7919 % 1000))
        .collect();
    let xml = format!("<?xml version=\"1.0\"?>\n<parameters>{params}</parameters>");
    let meta = json!({
        "board_id": 9,
        "magic": "PX4FWv1",
        "image": b64(&zlib(&fw)),
        "parameter_xml": b64(&zlib(xml.as_bytes())),
        "airframe_xml": "<airframes/>",
        "summary": "line one\nline two",
        "unused": null
    });
    let Value::Object(map) = meta else { unreachable!() };

    let files = metadata_files(&map);
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["airframe_xml.xml", "firmware.bin", "parameter_xml.xml", "summary.txt", "metadata.json"]
    );

    let by_name = |name: &str| files.iter().find(|f| f.name == name).unwrap();
    assert_eq!(by_name("firmware.bin").bytes, fw);
    assert_eq!(by_name("firmware.bin").encoding, Some(BlobEncoding::Zlib));
    assert_eq!(by_name("parameter_xml.xml").bytes, xml.as_bytes());
    assert_eq!(by_name("airframe_xml.xml").bytes, b"<airframes/>");
    assert_eq!(by_name("airframe_xml.xml").encoding, None);

    let rest: Value = serde_json::from_slice(&by_name("metadata.json").bytes).unwrap();
    assert_eq!(rest, json!({"board_id": 9, "magic": "PX4FWv1"}));
    assert!(by_name("metadata.json").field.is_none());
}

#[test]
fn metadata_file_names_never_leave_the_output_dir() {
    let long_text = "x ".repeat(150);
    let meta = json!({ "../../etc/passwd": long_text });
    let Value::Object(map) = meta else { unreachable!() };
    let files = metadata_files(&map);
    assert_eq!(files[0].name, "______etc_passwd.txt");
}

#[test]
fn load_bundle_unpacks_embedded_image() {
    let temp = tempfile::tempdir().unwrap();
    let fw = firmware_payload();
    let bundle = json!({ "board_id": 9, "image": b64(&zlib(&fw)), "image_size": fw.len() });
    let path = temp.path().join("px4_fmu-v5_default.px4");
    std::fs::write(&path, serde_json::to_vec(&bundle).unwrap()).unwrap();

    let image = load_bundle(&path).expect("bundle");
    assert_eq!(image.bytes(), fw.as_slice());
    assert_eq!(image.path(), path.as_path());
}

#[test]
fn load_bundle_without_image_field_fails() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("meta_only.px4");
    std::fs::write(&path, br#"{"board_id": 9}"#).unwrap();
    let err = load_bundle(&path).unwrap_err();
    assert!(matches!(err, InspectError::NoEmbeddedImage { .. }));

    std::fs::write(&path, [0u8; 64]).unwrap();
    assert!(matches!(load_bundle(&path).unwrap_err(), InspectError::NoEmbeddedImage { .. }));
}
