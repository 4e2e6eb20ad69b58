#![forbid(unsafe_code)]

//! Cryptographic primitives for xmlseal: message digests and the
//! asymmetric signature schemes XML-DSig names by URI.

pub mod digest;
pub mod sign;

pub use digest::{DigestAlgorithm, DigestValue};
pub use sign::{check_pairing, PrivateKey, PublicKey, SignatureAlgorithm};
