//! Streaming digest over the bytes of a put session.

use fileput_protocol::{HashMethod, HashType};
use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Incremental digest, fed chunk by chunk and finalized once.
///
/// `finalize` consumes the accumulator, so a second finalization or an
/// update after finalization cannot be written. Each session owns its
/// own accumulator; it is never shared.
pub struct DigestAccumulator {
    method: HashMethod,
    hasher: Hasher,
    bytes: u64,
}

impl DigestAccumulator {
    pub fn new(method: HashMethod) -> Self {
        let hasher = match method {
            HashMethod::Md5 => Hasher::Md5(Md5::new()),
            HashMethod::Sha256 => Hasher::Sha256(Sha256::new()),
            HashMethod::Sha512 => Hasher::Sha512(Sha512::new()),
        };
        Self {
            method,
            hasher,
            bytes: 0,
        }
    }

    /// Creates an accumulator from a user-supplied identifier.
    ///
    /// Unrecognized identifiers fall back to MD5.
    pub fn from_name(name: &str) -> Self {
        Self::new(HashMethod::normalize(name))
    }

    /// Feeds `data` into the digest.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.hasher {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
        self.bytes += data.len() as u64;
    }

    pub fn method(&self) -> HashMethod {
        self.method
    }

    /// Total bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// Finalizes the digest into the hash message payload.
    pub fn finalize(self) -> HashType {
        let hash = match self.hasher {
            Hasher::Md5(h) => h.finalize().to_vec(),
            Hasher::Sha256(h) => h.finalize().to_vec(),
            Hasher::Sha512(h) => h.finalize().to_vec(),
        };
        HashType {
            method: self.method,
            hash,
        }
    }
}

/// One-shot digest of `data`.
pub fn digest_bytes(method: HashMethod, data: &[u8]) -> Vec<u8> {
    let mut acc = DigestAccumulator::new(method);
    acc.update(data);
    acc.finalize().hash
}
