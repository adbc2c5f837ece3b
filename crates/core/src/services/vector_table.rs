use crate::model::{FirmwareImage, VectorTableInfo};
use crate::services::inspect::InspectError;

/// Bytes covered by the initial stack pointer and reset handler words.
pub const VECTOR_HEADER_LEN: usize = 8;

/// Read the initial stack pointer and reset handler from the start of a
/// Cortex-M image (two little-endian words at offsets 0 and 4).
pub fn read_vector_table(image: &FirmwareImage) -> Result<VectorTableInfo, InspectError> {
    parse_vector_table(image.bytes())
}

pub fn parse_vector_table(bytes: &[u8]) -> Result<VectorTableInfo, InspectError> {
    let Some(header) = bytes.get(..VECTOR_HEADER_LEN) else {
        return Err(InspectError::TruncatedImage { size: bytes.len() as u64 });
    };
    let word = |offset: usize| {
        u32::from_le_bytes([
            header[offset],
            header[offset + 1],
            header[offset + 2],
            header[offset + 3],
        ])
    };
    Ok(VectorTableInfo { initial_stack_pointer: word(0), reset_handler_address: word(4) })
}
