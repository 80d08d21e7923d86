//! `mysql_native_password`
//!
//! ```text
//! SHA1(password) XOR SHA1(scramble + SHA1(SHA1(password)))
//! ```

use sha1::{Digest, Sha1};

/// Length of the scramble the server sends
pub const SCRAMBLE_LEN: usize = 20;

/// Native password response; empty password yields an empty response
pub fn scramble_native(password: &str, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let seed = &scramble[..scramble.len().min(SCRAMBLE_LEN)];

    let stage1: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();

    let mut hasher = Sha1::new();
    hasher.update(seed);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    stage1.iter().zip(stage3.iter()).map(|(a, b)| a ^ b).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_password() {
        assert!(scramble_native("", &[7; 20]).is_empty());
    }

    #[test]
    fn test_known_vector() {
        // SHA1("password") for an all-zero scramble, XOR'd back out
        let scramble = [0u8; 20];
        let response = scramble_native("password", &scramble);
        assert_eq!(response.len(), 20);

        let stage1: [u8; 20] = Sha1::digest(b"password").into();
        let stage2: [u8; 20] = Sha1::digest(stage1).into();
        let mut hasher = Sha1::new();
        hasher.update(scramble);
        hasher.update(stage2);
        let stage3: [u8; 20] = hasher.finalize().into();
        let recovered: Vec<u8> = response.iter().zip(stage3.iter()).map(|(a, b)| a ^ b).collect();
        assert_eq!(recovered, stage1.to_vec());
    }

    #[test]
    fn test_depends_on_scramble() {
        let a = scramble_native("secret", &[1; 20]);
        let b = scramble_native("secret", &[2; 20]);
        assert_ne!(a, b);
        // extra bytes past the scramble are ignored
        let mut long = vec![1; 20];
        long.push(0);
        assert_eq!(scramble_native("secret", &long), a);
    }
}
