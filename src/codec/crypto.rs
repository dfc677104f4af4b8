// src/codec/crypto.rs

//! Password-derived AES-256-GCM encryption.
//!
//! Wire layout: `base64(salt[16] ‖ nonce[12] ‖ ciphertext ‖ tag[16])`. The key
//! is PBKDF2-HMAC-SHA256 over the password with 100 000 iterations.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{aead, pbkdf2};

use crate::error::{AppError, Result};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const KEY_LEN: usize = 32;

fn derive_key(password: &str, salt: &[u8]) -> Result<aead::LessSafeKey> {
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| AppError::crypto("PBKDF2 iteration count must be non-zero"))?;
    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password.as_bytes(),
        &mut key,
    );
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key)
        .map_err(|_| AppError::crypto("cannot build AES-256-GCM key"))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt `plain_text` under `password` with a fresh salt and nonce.
pub fn encrypt_text(plain_text: &str, password: &str) -> Result<String> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut salt)
        .and_then(|_| rng.fill(&mut nonce))
        .map_err(|_| AppError::crypto("system random source unavailable"))?;

    let key = derive_key(password, &salt)?;
    let mut cipher_text = plain_text.as_bytes().to_vec();
    key.seal_in_place_append_tag(
        aead::Nonce::assume_unique_for_key(nonce),
        aead::Aad::empty(),
        &mut cipher_text,
    )
    .map_err(|_| AppError::crypto("encryption failed"))?;

    let mut packed = Vec::with_capacity(SALT_LEN + NONCE_LEN + cipher_text.len());
    packed.extend_from_slice(&salt);
    packed.extend_from_slice(&nonce);
    packed.extend_from_slice(&cipher_text);
    Ok(STANDARD.encode(packed))
}

/// Decrypt a payload produced by [`encrypt_text`]. A wrong password and a
/// tampered payload fail the same way.
pub fn decrypt_text(payload: &str, password: &str) -> Result<String> {
    let data = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::crypto(format!("payload is not base64: {e}")))?;
    if data.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(AppError::crypto("encrypted payload is truncated"));
    }

    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce, cipher_text) = rest.split_at(NONCE_LEN);
    let nonce = aead::Nonce::try_assume_unique_for_key(nonce)
        .map_err(|_| AppError::crypto("invalid nonce"))?;

    let key = derive_key(password, salt)?;
    let mut buffer = cipher_text.to_vec();
    let plain = key
        .open_in_place(nonce, aead::Aad::empty(), &mut buffer)
        .map_err(|_| AppError::crypto("decryption failed: wrong password or corrupted payload"))?;

    String::from_utf8(plain.to_vec())
        .map_err(|e| AppError::crypto(format!("decrypted payload is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let payload = encrypt_text(r#"{"bySpec":{}}"#, "pw").unwrap();
        let raw = STANDARD.decode(&payload).unwrap();
        assert_eq!(raw.len(), SALT_LEN + NONCE_LEN + 13 + TAG_LEN);
        assert_eq!(decrypt_text(&payload, "pw").unwrap(), r#"{"bySpec":{}}"#);
    }

    #[test]
    fn test_fresh_salt_each_time() {
        let a = encrypt_text("same", "pw").unwrap();
        let b = encrypt_text("same", "pw").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_password() {
        let payload = encrypt_text("secret", "right").unwrap();
        let err = decrypt_text(&payload, "wrong").unwrap_err();
        assert!(matches!(err, AppError::Crypto(_)));
    }

    #[test]
    fn test_truncated_payload() {
        let err = decrypt_text(&STANDARD.encode([0u8; 20]), "pw").unwrap_err();
        assert!(err.to_string().contains("truncated"));
        assert!(decrypt_text("***", "pw").is_err());
    }
}
