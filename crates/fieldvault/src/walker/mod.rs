//! In-place encryption of tagged struct fields.
//!
//! A model lists the fields the walker may write through [`EncryptedFields`],
//! normally generated by [`encrypted_model!`](crate::encrypted_model). A
//! [`FieldWalker`] then applies one transform (encrypt, decrypt or rekey) to
//! every in-scope value reachable from a root: the root itself, a pointer to
//! it, or a slice of either.
//!
//! Decrypt and rekey walks only touch values that look like tokens, so rows
//! written before encryption was enabled read back as plaintext.
//!
//! Walks are not atomic. When a field fails, fields visited earlier keep
//! their transformed values; callers that need all-or-nothing should walk a
//! clone and swap it in on success.

mod apply;
mod model;
mod traverse;

pub use traverse::{
    is_settable, EncryptedFields, FieldValue, FieldWalker, ENCRYPTED_TAG, ENCRYPTED_TAG_VALUE,
};
