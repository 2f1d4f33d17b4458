use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use ring::digest;
use serde::{Deserialize, Serialize};

/// Hash algorithms accepted by Mobile-ID.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashType {
    #[default]
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA384")]
    Sha384,
    #[serde(rename = "SHA512")]
    Sha512,
}

impl HashType {
    pub fn len(self) -> usize {
        self.algorithm().output_len()
    }

    fn algorithm(self) -> &'static digest::Algorithm {
        match self {
            HashType::Sha256 => &digest::SHA256,
            HashType::Sha384 => &digest::SHA384,
            HashType::Sha512 => &digest::SHA512,
        }
    }

    /// DER prefix of the PKCS#1 v1.5 `DigestInfo` structure for this algorithm.
    pub fn digest_info_prefix(self) -> &'static [u8] {
        match self {
            HashType::Sha256 => &[
                0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04,
                0x02, 0x01, 0x05, 0x00, 0x04, 0x20,
            ],
            HashType::Sha384 => &[
                0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04,
                0x02, 0x02, 0x05, 0x00, 0x04, 0x30,
            ],
            HashType::Sha512 => &[
                0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04,
                0x02, 0x03, 0x05, 0x00, 0x04, 0x40,
            ],
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashType::Sha256 => "SHA256",
            HashType::Sha384 => "SHA384",
            HashType::Sha512 => "SHA512",
        };
        f.write_str(name)
    }
}

/// A hash presented to the user's SIM to be signed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashToSign {
    hash_type: HashType,
    hash: Vec<u8>,
}

impl HashToSign {
    /// Generates a random authentication challenge of the given hash length.
    pub fn random(hash_type: HashType) -> Self {
        let mut hash = vec![0u8; hash_type.len()];
        rand::rng().fill_bytes(&mut hash);
        Self { hash_type, hash }
    }

    /// Hashes the given document content.
    pub fn of_data(hash_type: HashType, data: &[u8]) -> Self {
        let hash = digest::digest(hash_type.algorithm(), data).as_ref().to_vec();
        Self { hash_type, hash }
    }

    /// Wraps an already computed hash.
    pub fn from_hash(hash_type: HashType, hash: Vec<u8>) -> Self {
        Self { hash_type, hash }
    }

    pub fn hash_type(&self) -> HashType {
        self.hash_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.hash
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.hash)
    }

    /// Computes the four digit code shown both in the browser and on the phone.
    ///
    /// The six most significant bits of the first byte and the seven least
    /// significant bits of the last byte form a 13 bit number.
    pub fn verification_code(&self) -> String {
        let (Some(first), Some(last)) = (self.hash.first(), self.hash.last()) else {
            return "0000".to_string();
        };
        let code = ((u16::from(*first) & 0xFC) << 5) | (u16::from(*last) & 0x7F);
        format!("{code:04}")
    }
}

impl fmt::Debug for HashToSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashToSign")
            .field("hash_type", &self.hash_type)
            .field("hash", &self.to_base64())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(first: u8, last: u8) -> String {
        let mut hash = vec![0u8; 32];
        hash[0] = first;
        hash[31] = last;
        HashToSign::from_hash(HashType::Sha256, hash).verification_code()
    }

    #[test]
    fn test_verification_code_bits() {
        assert_eq!(code_of(0x00, 0x00), "0000");
        assert_eq!(code_of(0x04, 0x01), "0129");
        // the two low bits of the first byte and the top bit of the last are ignored
        assert_eq!(code_of(0x07, 0x81), "0129");
        assert_eq!(code_of(0xFF, 0xFF), "8191");
    }

    #[test]
    fn test_random_hash_has_algorithm_length() {
        assert_eq!(HashToSign::random(HashType::Sha256).as_bytes().len(), 32);
        assert_eq!(HashToSign::random(HashType::Sha384).as_bytes().len(), 48);
        assert_eq!(HashToSign::random(HashType::Sha512).as_bytes().len(), 64);
    }

    #[test]
    fn test_random_hashes_differ() {
        let first = HashToSign::random(HashType::Sha256);
        let second = HashToSign::random(HashType::Sha256);
        assert_ne!(first, second);
    }

    #[test]
    fn test_of_data_is_sha256_digest() {
        let hash = HashToSign::of_data(HashType::Sha256, b"abc");
        assert_eq!(
            hash.to_base64(),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
        assert_eq!(hash.verification_code().len(), 4);
    }

    #[test]
    fn test_hash_type_serializes_as_service_name() {
        let json = serde_json::to_string(&HashType::Sha384).unwrap();
        assert_eq!(json, "\"SHA384\"");
        assert_eq!(HashType::Sha512.to_string(), "SHA512");
    }
}
