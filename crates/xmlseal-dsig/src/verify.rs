#![forbid(unsafe_code)]

//! Enveloped signature verification.
//!
//! 1. Locate the `<Signature>` child of the document element
//! 2. For each `<Reference>`: resolve the id, run the transforms, compare digests
//! 3. Compare the embedded certificate with the trusted one, if configured
//! 4. Canonicalize `<SignedInfo>` in place and check `<SignatureValue>`

use xmlseal_core::Error;
use xmlseal_xml::{Document, ElementPath};

use crate::assemble::find_signature;
use crate::container::{signed_info_index, SignatureContainer};
use crate::context::VerifyContext;
use crate::engine;
use crate::metadata::digest_target;

/// Result of signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Every digest matches and the signature value verifies.
    Valid,
    /// The referenced content changed after signing.
    DigestMismatch { uri: String },
    /// The digests match but `SignedInfo` does not verify with the key.
    SignatureMismatch,
    /// The embedded certificate is not the trusted one.
    CertificateMismatch,
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid)
    }
}

/// Verify the enveloped signature of `doc`.
pub fn verify(doc: &Document, ctx: &VerifyContext) -> Result<VerifyResult, Error> {
    let sig_path = find_signature(doc).ok_or_else(|| Error::MissingElement("Signature".into()))?;
    let sig_el = doc
        .element(&sig_path)
        .ok_or_else(|| Error::MissingElement("Signature".into()))?;
    let container = SignatureContainer::from_element(sig_el)?;
    let metadata = container.metadata();

    for reference in &metadata.references {
        let target = doc.find_by_id(reference.target_id()?, &ctx.id_attrs)?;
        let computed = digest_target(
            doc,
            &target,
            &reference.transforms,
            &reference.digest_method,
            Some(&sig_path),
        )?;
        if computed != reference.digest_value {
            tracing::debug!(uri = %reference.uri, "reference digest mismatch");
            return Ok(VerifyResult::DigestMismatch {
                uri: reference.uri.clone(),
            });
        }
    }

    if let Some(trusted) = &ctx.trusted_certificate {
        if container.certificate() != trusted.as_slice() {
            tracing::debug!("embedded certificate differs from the trusted one");
            return Ok(VerifyResult::CertificateMismatch);
        }
    }

    let key = match &ctx.trusted_key {
        Some(key) => key.clone(),
        None if ctx.allow_embedded_certificate && !container.certificate().is_empty() => {
            tracing::warn!("verifying with the embedded certificate; origin is not established");
            xmlseal_keys::x509::public_key_from_certificate(container.certificate())?
        }
        None => return Err(Error::Key("no trusted key to verify with".into())),
    };

    let index = signed_info_index(sig_el).ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;
    let signed_info_path: ElementPath = sig_path.child(index);
    let canonical = xmlseal_c14n::canonicalize_subtree(
        doc,
        &signed_info_path,
        metadata.canonicalization,
        &metadata.inclusive_prefixes,
        None,
    )?;
    tracing::trace!(pre_signature = %String::from_utf8_lossy(&canonical), "SignedInfo pre-verification data");

    if engine::verify(&metadata.signature_method, &canonical, &key, container.signature_value())? {
        Ok(VerifyResult::Valid)
    } else {
        Ok(VerifyResult::SignatureMismatch)
    }
}

/// Parse `xml` and [`verify`] it.
pub fn verify_str(xml: &str, ctx: &VerifyContext) -> Result<VerifyResult, Error> {
    let doc = xmlseal_xml::parse(xml)?;
    verify(&doc, ctx)
}
