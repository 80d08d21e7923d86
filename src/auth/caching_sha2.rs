//! `caching_sha2_password` and `sha256_password`

use crate::{Error, Result};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Fast-auth scramble:
///
/// ```text
/// SHA256(password) XOR SHA256(SHA256(SHA256(password)) + scramble)
/// ```
pub fn scramble_sha256(password: &str, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let hash: [u8; 32] = Sha256::digest(password.as_bytes()).into();
    let hash_hash: [u8; 32] = Sha256::digest(hash).into();

    let mut hasher = Sha256::new();
    hasher.update(hash_hash);
    hasher.update(scramble);
    let salted: [u8; 32] = hasher.finalize().into();

    hash.iter().zip(salted.iter()).map(|(a, b)| a ^ b).collect()
}

/// NUL-terminated password for secure transports
pub fn cleartext(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() + 1);
    out.extend_from_slice(password.as_bytes());
    out.push(0);
    out
}

/// RSA-OAEP encryption of the NUL-terminated password XOR'd with the scramble
pub fn encrypt_password(password: &str, scramble: &[u8], public_key_pem: &[u8]) -> Result<Vec<u8>> {
    if scramble.is_empty() {
        return Err(Error::Authentication("empty scramble".into()));
    }
    let mut plain = cleartext(password);
    for (i, b) in plain.iter_mut().enumerate() {
        *b ^= scramble[i % scramble.len()];
    }

    let pem = std::str::from_utf8(public_key_pem)
        .map_err(|e| Error::Authentication(format!("server public key is not PEM: {}", e)))?;
    let key = RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::Authentication(format!("invalid server public key: {}", e)))?;

    key.encrypt(&mut OsRng, Oaep::new::<Sha1>(), &plain)
        .map_err(|e| Error::Authentication(format!("RSA encryption failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scramble_len() {
        assert_eq!(scramble_sha256("secret", &[0; 20]).len(), 32);
        assert!(scramble_sha256("", &[0; 20]).is_empty());
    }

    #[test]
    fn test_scramble_xor_recovers_hash() {
        let scramble = [9u8; 20];
        let response = scramble_sha256("pw", &scramble);
        let hash: [u8; 32] = Sha256::digest(b"pw").into();
        let hash_hash: [u8; 32] = Sha256::digest(hash).into();
        let mut hasher = Sha256::new();
        hasher.update(hash_hash);
        hasher.update(scramble);
        let salted: [u8; 32] = hasher.finalize().into();
        let recovered: Vec<u8> = response.iter().zip(salted.iter()).map(|(a, b)| a ^ b).collect();
        assert_eq!(recovered, hash.to_vec());
    }

    #[test]
    fn test_cleartext_is_nul_terminated() {
        assert_eq!(cleartext("ab"), b"ab\0".to_vec());
    }

    #[test]
    fn test_encrypt_rejects_bad_key() {
        let err = encrypt_password("pw", &[1; 20], b"not a key").unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_encrypt_with_generated_key() {
        use rsa::pkcs8::{EncodePublicKey, LineEnding};
        use rsa::RsaPrivateKey;

        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let scramble = [3u8; 20];
        let cipher = encrypt_password("hunter2", &scramble, pem.as_bytes()).unwrap();

        let plain = private.decrypt(Oaep::new::<Sha1>(), &cipher).unwrap();
        let unxored: Vec<u8> = plain
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ scramble[i % scramble.len()])
            .collect();
        assert_eq!(unxored, b"hunter2\0".to_vec());
    }
}
