#![forbid(unsafe_code)]

//! Core types shared by every xmlseal crate: the error taxonomy, algorithm
//! identifier URIs, XML-DSig namespace constants and the key capability the
//! signer consumes.

pub mod algorithm;
pub mod error;
pub mod material;
pub mod ns;

pub use error::{Error, KeyMaterialError, Result};
pub use material::KeyMaterial;
