#[cfg(feature = "hashing")]
use sha3::{Digest, Sha3_256};

#[cfg(feature = "hashing")]
/// Computes the hex SHA3-256 digest of byte data
pub fn compute_sha3_256(data: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(feature = "hashing")]
/// Fingerprints a manifest so the feature cache can detect edits
pub fn fingerprint(data: &[u8]) -> Option<String> {
    Some(compute_sha3_256(data))
}

#[cfg(not(feature = "hashing"))]
/// Fingerprinting is unavailable without the `hashing` feature
pub fn fingerprint(_data: &[u8]) -> Option<String> {
    None
}
