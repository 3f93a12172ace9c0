//! Fixed-length keys for tree nodes and roots
//!
//! Every node is addressed by a 32-byte hash derived from its content by the
//! tree engine. This layer never computes hashes; it only carries them between
//! the engine and storage, so the type is a thin, copyable byte array with hex
//! conversion for display and debugging.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length in bytes of a node key, a child pointer and each half of a leaf entry
pub const HASH_LEN: usize = 32;

/// A 32-byte content hash used as a node key or root pointer
///
/// ## Example
///
/// ```rust
/// use smtstore_core::Hash;
///
/// let hash = Hash::new([7u8; 32]);
/// let restored: Hash = hash.to_hex().parse().unwrap();
/// assert_eq!(hash, restored);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Create a new Hash from raw bytes
    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a zero hash (all bytes are 0)
    pub const fn zero() -> Self {
        Self([0u8; HASH_LEN])
    }

    /// Check if this is a zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the hash, returning the underlying array
    pub fn into_bytes(self) -> [u8; HASH_LEN] {
        self.0
    }

    /// Copy a hash out of a byte slice
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidHash`] unless `bytes` is exactly
    /// [`HASH_LEN`] long. Short input is never padded and long input is never
    /// truncated.
    pub fn from_slice(bytes: &[u8]) -> StorageResult<Self> {
        let array: [u8; HASH_LEN] = bytes.try_into().map_err(|_| {
            StorageError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Convert the hash to a hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create a hash from a hexadecimal string (64 characters)
    pub fn from_hex(hex: &str) -> StorageResult<Self> {
        let bytes = hex::decode(hex)
            .map_err(|e| StorageError::InvalidHash(format!("invalid hex format: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self::new(bytes)
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = StorageError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash() {
        let zero = Hash::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.as_bytes(), &[0u8; HASH_LEN]);
        assert_eq!(Hash::default(), zero);
    }

    #[test]
    fn test_from_slice_exact_length() {
        let bytes = [9u8; HASH_LEN];
        let hash = Hash::from_slice(&bytes).unwrap();
        assert_eq!(hash.into_bytes(), bytes);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        for len in [0usize, 1, 31, 33, 64] {
            let bytes = vec![1u8; len];
            let err = Hash::from_slice(&bytes).unwrap_err();
            assert!(matches!(err, StorageError::InvalidHash(_)), "len {}", len);
        }
    }

    #[test]
    fn test_hex_roundtrip() {
        let mut bytes = [0u8; HASH_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let original = Hash::new(bytes);
        let hex = original.to_hex();
        assert_eq!(hex.len(), 64);

        let restored: Hash = hex.parse().unwrap();
        assert_eq!(original, restored);
        assert_eq!(format!("{}", original), hex);
        assert_eq!(format!("{:?}", original), format!("Hash({})", hex));
    }

    #[test]
    fn test_from_hex_invalid() {
        assert!(Hash::from_hex("1234").is_err());
        assert!(Hash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let hash = Hash::new([0xab; HASH_LEN]);
        let json = serde_json::to_string(&hash).unwrap();
        let restored: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, restored);
    }
}
