//! Reversible obfuscation for credentials kept in the backend store.
//!
//! Secrets such as API keys must be recoverable (they are sent to the remote
//! backend), so they cannot be hashed. Instead they are run through AES-CTR
//! under a key that is compiled into the binary.
//!
//! # Token Format
//!
//! | Offset | Size | Description |
//! |--------|------|-------------|
//! | 0      | 16   | Random IV for AES-256-CTR |
//! | 16     | 4    | Encrypted marker (`oxd1`) |
//! | 20     | n    | Encrypted UTF-8 plaintext |
//!
//! The whole token is encoded as unpadded URL-safe base64.
//!
//! # Security
//!
//! This is **obfuscation, not encryption**. Anyone holding an `oxdav` binary
//! can reverse a token. It only keeps secrets from being readable at a glance
//! (shoulder surfing, accidental `cat` of the config file, screenshots).
//! Protect the store file with filesystem permissions.

use aes::cipher::{KeyIvInit, StreamCipher};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use thiserror::Error;

/// IV size for AES-CTR (16 bytes)
pub const IV_SIZE: usize = 16;

/// Marker prepended to the plaintext before encryption.
///
/// A token that decrypts to anything else was not produced by [`obscure`].
const MARKER: [u8; 4] = *b"oxd1";

/// Built-in obfuscation key.
const OBSCURE_KEY: [u8; 32] = [
    0x3e, 0x91, 0x5a, 0x0c, 0xd4, 0x27, 0x8b, 0xf6, 0x61, 0x1d, 0xa8, 0x43, 0xc2, 0x7f, 0x09, 0xb5,
    0x58, 0xe3, 0x2a, 0x96, 0x4d, 0x70, 0xbc, 0x15, 0xef, 0x82, 0x36, 0xd9, 0x0b, 0x64, 0xa1, 0xc7,
];

/// AES-256-CTR with big-endian 128-bit counter
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Errors returned by [`reveal`] for values that are not obscure tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The value is not unpadded URL-safe base64.
    #[error("not a base64 token: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded token cannot hold an IV and a marker.
    #[error("token too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    /// The token decrypted, but not to something `obscure` produced.
    #[error("token was not produced by obscure")]
    BadMarker,

    /// The revealed bytes are not UTF-8.
    #[error("revealed value is not valid UTF-8")]
    InvalidUtf8,
}

/// Obscure a plaintext secret for storage.
///
/// A fresh IV is drawn for every call, so obscuring the same value twice
/// yields different tokens that reveal to the same plaintext.
pub fn obscure(plaintext: &str) -> String {
    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);

    let mut payload = Vec::with_capacity(MARKER.len() + plaintext.len());
    payload.extend_from_slice(&MARKER);
    payload.extend_from_slice(plaintext.as_bytes());

    let mut cipher = Aes256Ctr::new((&OBSCURE_KEY).into(), (&iv).into());
    cipher.apply_keystream(&mut payload);

    let mut token = Vec::with_capacity(IV_SIZE + payload.len());
    token.extend_from_slice(&iv);
    token.extend_from_slice(&payload);
    URL_SAFE_NO_PAD.encode(token)
}

/// Reveal a token produced by [`obscure`].
pub fn reveal(token: &str) -> Result<String, DecodeError> {
    let bytes = URL_SAFE_NO_PAD.decode(token.as_bytes())?;

    let min = IV_SIZE + MARKER.len();
    if bytes.len() < min {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            min,
        });
    }

    let (iv_bytes, ciphertext) = bytes.split_at(IV_SIZE);
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(iv_bytes);

    let mut payload = ciphertext.to_vec();
    let mut cipher = Aes256Ctr::new((&OBSCURE_KEY).into(), (&iv).into());
    cipher.apply_keystream(&mut payload);

    if payload[..MARKER.len()] != MARKER {
        return Err(DecodeError::BadMarker);
    }

    String::from_utf8(payload.split_off(MARKER.len())).map_err(|_| DecodeError::InvalidUtf8)
}

/// Check whether a value is already an obscure token.
///
/// Never fails; anything [`reveal`] rejects is reported as not obscured.
pub fn is_obscured(value: &str) -> bool {
    reveal(value).is_ok()
}
