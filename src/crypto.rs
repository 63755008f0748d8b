// dkimcheck – DKIM signature verification
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Cryptographic primitives used in DKIM verification.
//!
//! # Public key formats in DNS
//!
//! For RSA, RFC 6376 specifies the RSAPublicKey format for the p= tag, while
//! its own appendix example installs a key in SubjectPublicKeyInfo format. The
//! latter is what implementations actually produce and expect, so the key data
//! is first read as SubjectPublicKeyInfo, falling back to RSAPublicKey.
//!
//! For Ed25519, RFC 8463 mandates the raw 32 public key bytes, but keys
//! exported with OpenSSL come in SubjectPublicKeyInfo format and do get
//! installed in DNS that way. The raw form is tried first, then
//! SubjectPublicKeyInfo.

use ed25519_dalek::{
    pkcs8::DecodePublicKey as _, Signature as Ed25519Signature, Verifier as _,
    VerifyingKey as Ed25519VerifyingKey,
};
// DecodePublicKey is already in scope through the ed25519_dalek::pkcs8 import
use rsa::{
    pkcs1::DecodeRsaPublicKey as _, traits::PublicKeyParts as _, Pkcs1v15Sign, RsaPublicKey,
};
use sha2::{Digest as _, Sha256};
use std::fmt::{self, Display, Formatter};

/// A key type, as given in the k= tag of a key record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyType {
    Rsa,
    Ed25519,
}

impl KeyType {
    pub fn canonical_str(self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::Ed25519 => "ed25519",
        }
    }
}

/// A hash algorithm usable in DKIM signatures.
///
/// Only SHA-256 remains after RFC 8301; the historic SHA-1 algorithm is not
/// supported.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    Sha256,
}

impl HashAlgorithm {
    pub fn canonical_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Sha256]
    }
}

/// Computes the message digest of the given bytes.
pub fn digest(hash_alg: HashAlgorithm, bytes: &[u8]) -> Box<[u8]> {
    match hash_alg {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            Box::from(&hasher.finalize()[..])
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CryptoError {
    InvalidKey,
    InsufficientKeySize,
    InvalidSignature,
    VerificationFailure,
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "invalid key data"),
            Self::InsufficientKeySize => write!(f, "key too small"),
            Self::InvalidSignature => write!(f, "invalid signature data"),
            Self::VerificationFailure => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// A public key of either supported key type, decoded from key record data.
#[derive(Debug)]
pub enum VerifyingKey {
    Rsa(RsaPublicKey),
    Ed25519(Ed25519VerifyingKey),
}

impl VerifyingKey {
    pub fn from_key_data(key_type: KeyType, key_data: &[u8]) -> Result<Self, CryptoError> {
        match key_type {
            KeyType::Rsa => read_rsa_public_key(key_data).map(Self::Rsa),
            KeyType::Ed25519 => read_ed25519_verifying_key(key_data).map(Self::Ed25519),
        }
    }

    /// The key size in bits, for RSA keys.
    pub fn key_size(&self) -> Option<usize> {
        match self {
            Self::Rsa(public_key) => Some(public_key.size() * 8),
            Self::Ed25519(_) => None,
        }
    }

    /// Verifies a signature over the given data hash.
    pub fn verify(
        &self,
        hash_alg: HashAlgorithm,
        data_hash: &[u8],
        signature_data: &[u8],
    ) -> Result<(), CryptoError> {
        match self {
            Self::Rsa(public_key) => {
                verify_rsa(hash_alg, public_key, data_hash, signature_data)
            }
            Self::Ed25519(verifying_key) => {
                verify_ed25519(verifying_key, data_hash, signature_data)
            }
        }
    }
}

pub fn read_rsa_public_key(key_data: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    let public_key = RsaPublicKey::from_public_key_der(key_data)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(key_data))
        .map_err(|_| CryptoError::InvalidKey)?;

    // RFC 8301: verifiers must not accept RSA keys below 1024 bits
    if public_key.size() * 8 < 1024 {
        return Err(CryptoError::InsufficientKeySize);
    }

    Ok(public_key)
}

pub fn verify_rsa(
    hash_alg: HashAlgorithm,
    public_key: &RsaPublicKey,
    data_hash: &[u8],
    signature_data: &[u8],
) -> Result<(), CryptoError> {
    let result = match hash_alg {
        HashAlgorithm::Sha256 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha256>(), data_hash, signature_data)
        }
    };

    result.map_err(|_| CryptoError::VerificationFailure)
}

pub fn read_ed25519_verifying_key(
    key_data: &[u8],
) -> Result<Ed25519VerifyingKey, CryptoError> {
    Ed25519VerifyingKey::try_from(key_data)
        .or_else(|_| Ed25519VerifyingKey::from_public_key_der(key_data))
        .map_err(|_| CryptoError::InvalidKey)
}

pub fn verify_ed25519(
    verifying_key: &Ed25519VerifyingKey,
    data_hash: &[u8],
    signature_data: &[u8],
) -> Result<(), CryptoError> {
    let signature = Ed25519Signature::from_slice(signature_data)
        .map_err(|_| CryptoError::InvalidSignature)?;

    verifying_key
        .verify(data_hash, &signature)
        .map_err(|_| CryptoError::VerificationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64, Encoding};

    #[test]
    fn digest_rfc_body_hash_examples() {
        // §3.4.3:
        let hash = digest(HashAlgorithm::Sha256, b"\r\n");
        assert_eq!(
            Base64::encode_string(&hash),
            "frcCV1k9oG9oKj3dpUqdJg1PxRT2RSN/XKdLCPjaYaY="
        );

        // §3.4.4:
        let hash = digest(HashAlgorithm::Sha256, b"");
        assert_eq!(
            Base64::encode_string(&hash),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn read_ed25519_key_raw_bytes() {
        // key from RFC 8463, appendix A
        let key_data =
            Base64::decode_vec("11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=").unwrap();

        assert!(read_ed25519_verifying_key(&key_data).is_ok());
        assert!(read_ed25519_verifying_key(b"too short").is_err());
    }

    #[test]
    fn rsa_key_garbage_rejected() {
        assert_eq!(read_rsa_public_key(b"not a key"), Err(CryptoError::InvalidKey));
    }
}
