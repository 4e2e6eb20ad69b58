#![forbid(unsafe_code)]

//! X.509 certificate inspection.

use der::{Decode, Encode};
use spki::DecodePublicKey;
use x509_cert::Certificate;
use xmlseal_core::Error;
use xmlseal_crypto::PublicKey;

fn parse(der_bytes: &[u8]) -> Result<Certificate, Error> {
    Certificate::from_der(der_bytes)
        .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))
}

/// Extract the subject public key from a DER certificate.
pub fn public_key_from_certificate(der_bytes: &[u8]) -> Result<PublicKey, Error> {
    let cert = parse(der_bytes)?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;

    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(&spki_der) {
        return Ok(PublicKey::Rsa(pk));
    }
    if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
        return Ok(PublicKey::EcP256(vk));
    }
    if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
        return Ok(PublicKey::EcP384(vk));
    }
    Err(Error::Certificate(
        "unsupported public key algorithm in X.509 certificate".into(),
    ))
}

/// Subject distinguished name, RFC 4514 style.
pub fn subject(der_bytes: &[u8]) -> Result<String, Error> {
    Ok(parse(der_bytes)?.tbs_certificate.subject.to_string())
}

/// Issuer distinguished name, RFC 4514 style.
pub fn issuer(der_bytes: &[u8]) -> Result<String, Error> {
    Ok(parse(der_bytes)?.tbs_certificate.issuer.to_string())
}
