use md5::Md5;
use sha2::{Digest, Sha256};

use crate::config::HIGH_USAGE_THRESHOLD_PERCENT;
use crate::model::{CapacityReport, IntegrityDigest};

/// MD5 and SHA-256 of the full buffer, lower-case hex.
pub fn digest(bytes: &[u8]) -> IntegrityDigest {
    IntegrityDigest { md5: md5_hex(bytes), sha256: sha256_hex(bytes) }
}

pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Flash utilisation of `used_bytes` against `total_bytes`, truncating.
///
/// A zero capacity can't hold anything, so it reports `u64::MAX` percent and is
/// always flagged.
pub fn capacity(used_bytes: u64, total_bytes: u64) -> CapacityReport {
    let usage_percent = (u128::from(used_bytes) * 100)
        .checked_div(u128::from(total_bytes))
        .map(|p| u64::try_from(p).unwrap_or(u64::MAX))
        .unwrap_or(u64::MAX);
    CapacityReport {
        used_bytes,
        total_bytes,
        usage_percent,
        high_usage: usage_percent > HIGH_USAGE_THRESHOLD_PERCENT,
    }
}
