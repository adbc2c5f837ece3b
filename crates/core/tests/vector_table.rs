use fwinspect_core::model::FirmwareImage;
use fwinspect_core::services::vector_table::{parse_vector_table, read_vector_table};
use fwinspect_core::services::InspectError;

fn image(bytes: &[u8]) -> FirmwareImage {
    FirmwareImage::new("vt.bin", bytes.to_vec())
}

#[test]
fn reads_stack_pointer_and_reset_handler() {
    let mut bytes = vec![0u8; 32];
    bytes[..4].copy_from_slice(&0x2002_0000u32.to_le_bytes());
    bytes[4..8].copy_from_slice(&0x0800_4321u32.to_le_bytes());
    bytes[8..12].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());

    let vt = read_vector_table(&image(&bytes)).expect("vector table");
    assert_eq!(vt.initial_stack_pointer, 0x2002_0000);
    assert_eq!(vt.reset_handler_address, 0x0800_4321);
}

#[test]
fn exactly_eight_bytes_is_enough() {
    let vt = read_vector_table(&image(&[1, 0, 0, 0, 2, 0, 0, 0])).expect("vector table");
    assert_eq!((vt.initial_stack_pointer, vt.reset_handler_address), (1, 2));
}

#[test]
fn same_bytes_give_same_result() {
    let img = image(b"\x10\x20\x30\x40\x50\x60\x70\x80tail");
    let a = read_vector_table(&img).unwrap();
    let b = read_vector_table(&img).unwrap();
    assert_eq!(a, b);
}

#[test]
fn short_images_fail_without_partial_value() {
    for len in 0..8 {
        let err = read_vector_table(&image(&vec![0xFF; len])).unwrap_err();
        match err {
            InspectError::TruncatedImage { size } => assert_eq!(size, len as u64),
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn parses_little_endian_words_from_raw_bytes() {
    let bytes = [0x00, 0x00, 0x02, 0x20, 0xC1, 0x01, 0x00, 0x08, 0xFF, 0xFF];
    let vt = parse_vector_table(&bytes).unwrap();
    assert_eq!(vt.initial_stack_pointer, 0x2002_0000);
    assert_eq!(vt.reset_handler_address, 0x0800_01C1);
}

#[test]
fn seven_raw_bytes_are_truncated() {
    let err = parse_vector_table(&[0u8; 7]).unwrap_err();
    assert!(matches!(err, InspectError::TruncatedImage { size: 7 }));
}
