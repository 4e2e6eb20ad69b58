#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) reader.
//!
//! Extracts the private keys and certificates of a password-protected
//! bundle. Handles the legacy `pbeWithSHAAnd3-KeyTripleDES-CBC` scheme and
//! PBES2 (PBKDF2 with AES-CBC) as written by OpenSSL 3, and checks the
//! bundle MAC before decrypting anything.

mod kdf;
mod parse;

use xmlseal_core::Error;

/// Decrypted contents of a PKCS#12 bundle, in file order.
#[derive(Default)]
pub struct Pkcs12Bundle {
    /// PKCS#8 `PrivateKeyInfo` DER of every shrouded key bag.
    pub private_keys: Vec<Vec<u8>>,
    /// X.509 certificate DER of every certificate bag.
    pub certificates: Vec<Vec<u8>>,
}

impl std::fmt::Debug for Pkcs12Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkcs12Bundle")
            .field("private_keys", &self.private_keys.len())
            .field("certificates", &self.certificates.len())
            .finish()
    }
}

/// Decode `data` and decrypt it with `password`.
///
/// A wrong password is reported as [`Error::Key`] by the MAC check.
pub fn open(data: &[u8], password: &str) -> Result<Pkcs12Bundle, Error> {
    let bundle = parse::parse_pfx(data, password)?;
    tracing::debug!(
        keys = bundle.private_keys.len(),
        certificates = bundle.certificates.len(),
        "opened PKCS#12 bundle"
    );
    Ok(bundle)
}
