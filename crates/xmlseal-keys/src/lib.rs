#![forbid(unsafe_code)]

//! Key providers for the xmlseal signer.
//!
//! The signing core only sees the [`KeyMaterial`] capability. This crate
//! supplies implementations of it: [`Key`] for in-memory RSA and EC keys,
//! and [`SerializedKey`] for signing primitives that must not be entered
//! concurrently. It also loads keys from PEM (plain or encrypted PKCS#8) and
//! PKCS#12 bundles, and X.509 certificates.

pub mod key;
pub mod loader;
pub mod serialized;
pub mod x509;

pub use key::Key;
pub use serialized::{SerializedKey, SigningPrimitive};
pub use xmlseal_core::KeyMaterial;
