//! AES-256-GCM field encryption.
//!
//! This module is free of ORM and traversal concerns. It turns one string into
//! one token and back.
//!
//! # Token format
//!
//! ```text
//! <key id>|<base64(nonce)>|<base64(ciphertext+tag)>
//! ```
//!
//! The key id prefix lets values written under any registered key be read
//! back after the default key has moved on.

pub mod cipher;
pub mod engine;

pub use engine::CryptoEngine;
