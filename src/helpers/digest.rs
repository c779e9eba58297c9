//! Stable hashing used for row fingerprints and distinct-value sketches.
//! Hashes must not change between runs so that scan output is reproducible.

use sha2::Digest;
use sha2::Sha256;

/// Separator written between hashed fields so that ("ab", "c") and ("a", "bc") differ
const FIELD_SEPARATOR: u8 = 0x1f;

/// 64-bit stable hash of a string
pub(crate) fn hash64(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    u64::from_le_bytes(digest[..8].try_into().expect("sha256 digest has 32 bytes"))
}

/// Incremental 128-bit fingerprint over a sequence of fields
pub(crate) struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub(crate) fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    pub(crate) fn push(&mut self, field: &str) {
        self.hasher.update(field.as_bytes());
        self.hasher.update([FIELD_SEPARATOR]);
    }

    pub(crate) fn finish(self) -> u128 {
        let digest = self.hasher.finalize();
        u128::from_le_bytes(digest[..16].try_into().expect("sha256 digest has 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_and_distinct() {
        assert_eq!(hash64("alpha"), hash64("alpha"));
        assert_ne!(hash64("alpha"), hash64("beta"));
    }

    #[test]
    fn fingerprint_separates_fields() {
        let mut left = Fingerprint::new();
        left.push("ab");
        left.push("c");
        let mut right = Fingerprint::new();
        right.push("a");
        right.push("bc");
        assert_ne!(left.finish(), right.finish());
    }
}
