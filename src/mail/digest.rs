use md5::{Digest as Md5Digest, Md5};
use sha2::{Digest as ShaDigest, Sha256};

/// Checksums recorded with every stored payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDigest {
    pub size: u64,
    /// MD5 hex digest
    pub md5: String,
    /// SHA256 hex digest
    pub sha256: String,
}

impl ContentDigest {
    /// Compute size, MD5 and SHA256 of a payload in a single pass
    pub fn compute(data: &[u8]) -> Self {
        let mut md5_hasher = Md5::new();
        let mut sha256_hasher = Sha256::new();

        md5_hasher.update(data);
        sha256_hasher.update(data);

        Self {
            size: data.len() as u64,
            md5: hex::encode(md5_hasher.finalize()),
            sha256: hex::encode(sha256_hasher.finalize()),
        }
    }
}
