//! hoard-crypto: deterministic content-keyed encryption for the hoard store
//!
//! Pipeline for one object:
//!
//! ```text
//! salt ++ plaintext ──BLAKE3──▶ secret_key (32 bytes)
//!        │                         │
//!        │              HKDF-SHA256 expand ("hoard-convergent-aes-siv")
//!        ▼                         ▼
//!   AES-256-SIV(key, nonce = 0, AAD = salt descriptor) ──▶ ciphertext ──BLAKE3──▶ address
//! ```
//!
//! The same plaintext and salt always yield the same key, ciphertext and
//! address, so identical objects deduplicate in storage. The secret key is
//! never stored; it travels inside references, which are in turn sealed into
//! grants with [`aead`] (symmetric) or age (asymmetric).

pub mod aead;
pub mod convergent;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt};
pub use convergent::{decrypt_convergent, encrypt_convergent, secure_hash, EncryptedBlob};
pub use kdf::{derive_secret_key, KdfParams};
pub use keys::{generate_key, SymmetricKey};

/// Size of a secret or symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of an authentication tag (Poly1305 or SIV)
pub const TAG_SIZE: usize = 16;
