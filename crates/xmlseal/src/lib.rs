#![forbid(unsafe_code)]

//! Enveloped XML digital signatures.
//!
//! ```no_run
//! # fn main() -> Result<(), xmlseal::Error> {
//! let key = xmlseal::keys::loader::load_key_files(
//!     "signer-key.pem".as_ref(),
//!     "signer-cert.pem".as_ref(),
//! )?;
//! let mut doc = xmlseal::xml::parse(r#"<Item Id="root-1">hello</Item>"#)?;
//! xmlseal::sign_document(&mut doc, &["root-1"], &key, &xmlseal::SignContext::default())?;
//! # Ok(())
//! # }
//! ```

pub use xmlseal_c14n as c14n;
pub use xmlseal_core as core;
pub use xmlseal_crypto as crypto;
pub use xmlseal_dsig as dsig;
pub use xmlseal_keys as keys;
pub use xmlseal_transforms as transforms;
pub use xmlseal_xml as xml;

pub use xmlseal_core::{Error, KeyMaterial};
pub use xmlseal_dsig::{
    sign_document, sign_str, verify, verify_str, SignContext, SignatureContainer, VerifyContext,
    VerifyResult,
};
