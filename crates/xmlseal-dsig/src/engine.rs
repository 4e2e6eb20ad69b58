#![forbid(unsafe_code)]

//! Signature computation and checking over canonical `SignedInfo` bytes.

use xmlseal_core::{Error, KeyMaterial};
use xmlseal_crypto::{check_pairing, sign, PublicKey};

use crate::metadata::SigningMetadata;

/// Sign canonical `SignedInfo` bytes with `key`.
///
/// The key must produce exactly the scheme `metadata` declares, and every
/// reference digest must use that scheme's hash. Provider failures are
/// returned as [`Error::KeyMaterial`] without retry.
pub fn sign<K: KeyMaterial + ?Sized>(
    metadata: &SigningMetadata,
    canonical: &[u8],
    key: &K,
) -> Result<Vec<u8>, Error> {
    if key.signature_algorithm() != metadata.signature_method {
        return Err(Error::AlgorithmMismatch(format!(
            "key signs with {}, but SignedInfo declares {}",
            key.signature_algorithm(),
            metadata.signature_method
        )));
    }
    for reference in &metadata.references {
        check_pairing(&metadata.signature_method, &reference.digest_method)?;
    }

    tracing::trace!(pre_signature = %String::from_utf8_lossy(canonical), "SignedInfo pre-signature data");
    let value = key.sign(canonical).map_err(Error::KeyMaterial)?;
    tracing::debug!(algorithm = %metadata.signature_method, len = value.len(), "computed signature value");
    Ok(value)
}

/// Check `signature` over canonical `SignedInfo` bytes.
pub fn verify(
    signature_method: &str,
    canonical: &[u8],
    key: &PublicKey,
    signature: &[u8],
) -> Result<bool, Error> {
    sign::from_uri(signature_method)?.verify(key, canonical, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Reference;
    use xmlseal_c14n::C14nMode;
    use xmlseal_core::{algorithm, KeyMaterialError};

    struct Fixed(&'static str);

    impl KeyMaterial for Fixed {
        fn signature_algorithm(&self) -> &str {
            self.0
        }

        fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
            Ok(data.to_vec())
        }

        fn certificate(&self) -> &[u8] {
            &[]
        }
    }

    fn metadata(digest: &str) -> SigningMetadata {
        SigningMetadata {
            canonicalization: C14nMode::Exclusive,
            inclusive_prefixes: Vec::new(),
            signature_method: algorithm::RSA_SHA256.into(),
            references: vec![Reference {
                uri: "#x".into(),
                transforms: Vec::new(),
                digest_method: digest.into(),
                digest_value: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_key_scheme_must_match() {
        let err = sign(&metadata(algorithm::SHA256), b"x", &Fixed(algorithm::RSA_SHA512)).unwrap_err();
        assert!(matches!(err, Error::AlgorithmMismatch(_)));
    }

    #[test]
    fn test_reference_digest_must_pair() {
        let err = sign(&metadata(algorithm::SHA512), b"x", &Fixed(algorithm::RSA_SHA256)).unwrap_err();
        assert!(matches!(err, Error::AlgorithmMismatch(_)));
    }

    #[test]
    fn test_sign_passes_bytes_to_key() {
        let value = sign(&metadata(algorithm::SHA256), b"abc", &Fixed(algorithm::RSA_SHA256)).unwrap();
        assert_eq!(value, b"abc".to_vec());
    }
}
