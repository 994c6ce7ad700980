use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hash method
// ---------------------------------------------------------------------------

/// Digest algorithm used to verify a put session.
///
/// Wire codes follow the common `HashType.HashMethod` numbering:
/// `UNSPECIFIED = 0`, `SHA256 = 1`, `SHA512 = 2`, `MD5 = 3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HashMethod {
    #[default]
    Md5,
    Sha256,
    Sha512,
}

impl HashMethod {
    /// Normalizes a user-supplied identifier.
    ///
    /// Matching is case-insensitive. Anything unrecognized falls back to
    /// [`HashMethod::Md5`] instead of failing.
    pub fn normalize(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA256" => HashMethod::Sha256,
            "SHA512" => HashMethod::Sha512,
            _ => HashMethod::Md5,
        }
    }

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashMethod::Md5 => "MD5",
            HashMethod::Sha256 => "SHA256",
            HashMethod::Sha512 => "SHA512",
        }
    }

    /// Numeric code carried in the hash frame.
    pub fn wire_code(&self) -> u8 {
        match self {
            HashMethod::Sha256 => 1,
            HashMethod::Sha512 => 2,
            HashMethod::Md5 => 3,
        }
    }

    /// Decodes a wire code. `UNSPECIFIED` and unknown codes yield `None`.
    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(HashMethod::Sha256),
            2 => Some(HashMethod::Sha512),
            3 => Some(HashMethod::Md5),
            _ => None,
        }
    }

    /// Length in bytes of a finalized digest.
    pub fn digest_len(&self) -> usize {
        match self {
            HashMethod::Md5 => 16,
            HashMethod::Sha256 => 32,
            HashMethod::Sha512 => 64,
        }
    }
}

impl FromStr for HashMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(HashMethod::normalize(s))
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Open-details: where the remote should write and with which mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDetails {
    pub remote_file: String,
    pub permissions: u32,
}

/// Finalized digest sent after the last contents chunk.
///
/// `hash` is base64-encoded in JSON dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashType {
    pub method: HashMethod,
    #[serde(with = "base64_bytes")]
    pub hash: Vec<u8>,
}

/// One outbound message of a put session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PutRequest {
    Open(PutDetails),
    Contents(#[serde(with = "base64_bytes")] Vec<u8>),
    Hash(HashType),
}

impl PutRequest {
    /// Short name of the request variant, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            PutRequest::Open(_) => "open",
            PutRequest::Contents(_) => "contents",
            PutRequest::Hash(_) => "hash",
        }
    }

    /// JSON dump of the request for debug logging.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The remote's single terminal answer to a put session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl PutResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_case_insensitive() {
        assert_eq!(HashMethod::normalize("sha256"), HashMethod::Sha256);
        assert_eq!(HashMethod::normalize("Sha512"), HashMethod::Sha512);
        assert_eq!(HashMethod::normalize("md5"), HashMethod::Md5);
    }

    #[test]
    fn normalize_unknown_falls_back_to_md5() {
        assert_eq!(HashMethod::normalize("crc32"), HashMethod::Md5);
        assert_eq!(HashMethod::normalize(""), HashMethod::Md5);
        assert_eq!("blake3".parse::<HashMethod>().unwrap(), HashMethod::Md5);
    }

    #[test]
    fn wire_codes_are_stable() {
        for method in [HashMethod::Md5, HashMethod::Sha256, HashMethod::Sha512] {
            assert_eq!(HashMethod::from_wire_code(method.wire_code()), Some(method));
        }
        assert_eq!(HashMethod::Md5.wire_code(), 3);
        assert_eq!(HashMethod::from_wire_code(0), None);
    }

    #[test]
    fn contents_dump_is_base64() {
        let req = PutRequest::Contents(b"Hello".to_vec());
        let json = req.to_json().unwrap();
        // "Hello" = "SGVsbG8="
        assert!(json.contains("SGVsbG8="));
        let parsed: PutRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn open_dump_uses_camel_case() {
        let req = PutRequest::Open(PutDetails {
            remote_file: "fw.bin".into(),
            permissions: 0o644,
        });
        let json = req.to_json().unwrap();
        assert!(json.contains("\"open\""));
        assert!(json.contains("\"remoteFile\":\"fw.bin\""));
        assert_eq!(req.kind(), "open");
    }

    #[test]
    fn hash_method_serializes_upper_case() {
        let hash = HashType {
            method: HashMethod::Sha256,
            hash: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&hash).unwrap();
        assert!(json.contains("\"SHA256\""));
    }
}
