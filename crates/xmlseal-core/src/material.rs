#![forbid(unsafe_code)]

//! The key capability consumed by the signing core.

use crate::error::KeyMaterialError;

/// A private key and its certificate, exposed only as a signing capability.
///
/// Implementations are shared by reference across concurrent signing calls,
/// so `sign` takes `&self`. A provider whose underlying primitive is not
/// reentrant must serialize access internally and hold its lock only for the
/// duration of `sign`.
///
/// The signing core never retries a failed `sign`; the provider's error is
/// surfaced unchanged as [`crate::Error::KeyMaterial`].
pub trait KeyMaterial: Send + Sync {
    /// URI of the signature algorithm `sign` produces.
    fn signature_algorithm(&self) -> &str;

    /// Sign canonical bytes.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError>;

    /// DER encoding of the signing certificate.
    fn certificate(&self) -> &[u8];

    /// DER encodings of intermediate certificates, leaf excluded.
    fn certificate_chain(&self) -> &[Vec<u8>] {
        &[]
    }
}

impl<K: KeyMaterial + ?Sized> KeyMaterial for &K {
    fn signature_algorithm(&self) -> &str {
        (**self).signature_algorithm()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        (**self).sign(data)
    }

    fn certificate(&self) -> &[u8] {
        (**self).certificate()
    }

    fn certificate_chain(&self) -> &[Vec<u8>] {
        (**self).certificate_chain()
    }
}

impl<K: KeyMaterial + ?Sized> KeyMaterial for std::sync::Arc<K> {
    fn signature_algorithm(&self) -> &str {
        (**self).signature_algorithm()
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        (**self).sign(data)
    }

    fn certificate(&self) -> &[u8] {
        (**self).certificate()
    }

    fn certificate_chain(&self) -> &[Vec<u8>] {
        (**self).certificate_chain()
    }
}
