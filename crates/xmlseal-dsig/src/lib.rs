#![forbid(unsafe_code)]

//! Enveloped XML Digital Signature (XML-DSig) creation and verification.
//!
//! [`sign_document`] drives a [`SignatureBlockBuilder`] through its states
//! and attaches the finished [`SignatureContainer`] as the last child of the
//! document element. [`verify()`] checks such a document.

pub mod assemble;
pub mod builder;
pub mod container;
pub mod context;
pub mod engine;
pub mod metadata;
pub mod verify;

pub use builder::SignatureBlockBuilder;
pub use container::SignatureContainer;
pub use context::{SignContext, VerifyContext};
pub use metadata::{Reference, SigningMetadata};
pub use verify::{verify, verify_str, VerifyResult};

use xmlseal_core::{Error, KeyMaterial};
use xmlseal_xml::{Document, ElementPath, WriteOptions};

/// Sign the elements carrying `ids` and attach the signature to `doc`.
///
/// Returns the path of the attached `Signature`. On error `doc` is left
/// unmodified.
pub fn sign_document<K: KeyMaterial + ?Sized>(
    doc: &mut Document,
    ids: &[&str],
    key: &K,
    ctx: &SignContext,
) -> Result<ElementPath, Error> {
    let span = tracing::debug_span!("sign_document", references = ids.len());
    let _enter = span.enter();

    if assemble::find_signature(doc).is_some() {
        return Err(Error::InvalidState {
            operation: "sign",
            state: "the document is already signed",
        });
    }

    let mut builder = SignatureBlockBuilder::new(ctx);
    builder.compute_references(doc, ids)?;
    builder.serialize_metadata()?;
    builder.sign(key)?;
    builder.finalize(key)?;
    let container = builder.into_container()?;
    assemble::attach(doc, &container)
}

/// Parse `xml`, sign it and serialize the result.
pub fn sign_str<K: KeyMaterial + ?Sized>(
    xml: &str,
    ids: &[&str],
    key: &K,
    ctx: &SignContext,
) -> Result<String, Error> {
    let mut doc = xmlseal_xml::parse(xml)?;
    sign_document(&mut doc, ids, key, ctx)?;
    xmlseal_xml::write_document(&doc, WriteOptions::default())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::Engine;
    use once_cell::sync::Lazy;
    use pretty_assertions::assert_eq;
    use sha2::Digest;
    use xmlseal_c14n::C14nMode;
    use xmlseal_core::{algorithm, KeyMaterialError};
    use xmlseal_keys::{loader, Key, SerializedKey, SigningPrimitive};

    const RSA_KEY: &str = include_str!("../../../testdata/rsa2048-key.pem");
    const RSA_CERT: &str = include_str!("../../../testdata/rsa2048-cert.pem");
    const OTHER_KEY: &str = include_str!("../../../testdata/rsa2048-other-key.pem");
    const OTHER_CERT: &str = include_str!("../../../testdata/rsa2048-other-cert.pem");
    const EC_KEY: &str = include_str!("../../../testdata/ec-p256-key.pem");
    const EC_CERT: &str = include_str!("../../../testdata/ec-p256-cert.pem");

    static RSA: Lazy<Key> = Lazy::new(|| loader::load_key_pair(RSA_KEY, RSA_CERT).unwrap());
    static OTHER: Lazy<Key> = Lazy::new(|| loader::load_key_pair(OTHER_KEY, OTHER_CERT).unwrap());

    pub(crate) fn rsa_key() -> &'static Key {
        &RSA
    }

    pub(crate) fn other_key() -> &'static Key {
        &OTHER
    }

    /// A provider whose device is gone.
    pub(crate) struct FailingKey;

    impl KeyMaterial for FailingKey {
        fn signature_algorithm(&self) -> &str {
            algorithm::RSA_SHA256
        }

        fn sign(&self, _data: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
            Err("token unplugged".into())
        }

        fn certificate(&self) -> &[u8] {
            &[]
        }
    }

    fn trusted() -> VerifyContext {
        VerifyContext::with_certificate(rsa_key().certificate().to_vec()).unwrap()
    }

    fn signature_value(doc: &Document) -> Vec<u8> {
        let path = assemble::find_signature(doc).unwrap();
        SignatureContainer::from_element(doc.element(&path).unwrap())
            .unwrap()
            .signature_value()
            .to_vec()
    }

    #[test]
    fn test_root_item_scenario() {
        let mut doc = xmlseal_xml::parse(r#"<Item Id="root-1">hello</Item>"#).unwrap();
        sign_document(&mut doc, &["root-1"], rsa_key(), &SignContext::default()).unwrap();

        let path = assemble::find_signature(&doc).unwrap();
        let container = SignatureContainer::from_element(doc.element(&path).unwrap()).unwrap();
        let reference = &container.metadata().references[0];
        assert_eq!(reference.uri, "#root-1");
        let expected = sha2::Sha256::digest(br#"<Item Id="root-1">hello</Item>"#);
        assert_eq!(reference.digest_value, expected.to_vec());
        assert_eq!(
            base64::engine::general_purpose::STANDARD.encode(expected),
            "lsuHC2/RM9E5q9w0taA53PT6OOGv2rNYIIpFoDRmUeY="
        );

        let ctx = VerifyContext::with_public_key(rsa_key().public_key());
        assert_eq!(verify(&doc, &ctx).unwrap(), VerifyResult::Valid);
    }

    #[test]
    fn test_signed_output_shape() {
        let xml = sign_str(r#"<Item Id="root-1">hello</Item>"#, &["root-1"], rsa_key(), &SignContext::default()).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<Item Id="root-1">hello<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo>"#));
        assert!(xml.contains("<ds:KeyInfo><ds:X509Data><ds:X509Certificate>"));
        assert!(xml.ends_with("</ds:Signature></Item>"));
        assert!(verify_str(&xml, &trusted()).unwrap().is_valid());
    }

    #[test]
    fn test_pkcs1_signatures_are_deterministic() {
        let sign_once = || {
            let mut doc = xmlseal_xml::parse(r#"<Doc Id="d"><A>1</A></Doc>"#).unwrap();
            sign_document(&mut doc, &["d"], rsa_key(), &SignContext::default()).unwrap();
            signature_value(&doc)
        };
        assert_eq!(sign_once(), sign_once());
    }

    #[test]
    fn test_pss_signatures_verify_independently() {
        let key = loader::load_key_pair(RSA_KEY, RSA_CERT)
            .unwrap()
            .with_signature_algorithm(algorithm::RSA_PSS_SHA256)
            .unwrap();
        let ctx = SignContext::new()
            .with_signature_method(algorithm::RSA_PSS_SHA256)
            .unwrap();

        let mut first = xmlseal_xml::parse(r#"<Doc Id="d">x</Doc>"#).unwrap();
        let mut second = first.clone();
        sign_document(&mut first, &["d"], &key, &ctx).unwrap();
        sign_document(&mut second, &["d"], &key, &ctx).unwrap();

        assert_ne!(signature_value(&first), signature_value(&second));
        assert!(verify(&first, &trusted()).unwrap().is_valid());
        assert!(verify(&second, &trusted()).unwrap().is_valid());
    }

    #[test]
    fn test_ecdsa_p256() {
        let key = loader::load_key_pair(EC_KEY, EC_CERT).unwrap();
        let ctx = SignContext::new()
            .with_signature_method(algorithm::ECDSA_SHA256)
            .unwrap();
        let mut doc = xmlseal_xml::parse(r#"<Doc Id="d">x</Doc>"#).unwrap();
        sign_document(&mut doc, &["d"], &key, &ctx).unwrap();
        assert_eq!(signature_value(&doc).len(), 64);

        let verify_ctx = VerifyContext::with_certificate(key.certificate().to_vec()).unwrap();
        assert!(verify(&doc, &verify_ctx).unwrap().is_valid());
    }

    #[test]
    fn test_namespaces_and_modes() {
        let xml = r#"<r:Doc xmlns:r="urn:r" xmlns:unused="urn:u" Id="d"><r:X a="1">1</r:X></r:Doc>"#;
        for (mode, prefix) in [
            (C14nMode::Exclusive, Some("ds")),
            (C14nMode::Inclusive, Some("ds")),
            (C14nMode::InclusiveWithComments, None),
            (C14nMode::ExclusiveWithComments, None),
        ] {
            let ctx = SignContext {
                canonicalization: mode,
                prefix: prefix.map(str::to_owned),
                signature_id: Some("sig".into()),
                ..SignContext::default()
            };
            let signed = sign_str(xml, &["d"], rsa_key(), &ctx).unwrap();
            assert_eq!(verify_str(&signed, &trusted()).unwrap(), VerifyResult::Valid, "{mode:?}");
        }
    }

    #[test]
    fn test_nested_target_in_formatted_document() {
        let xml = "<Doc>\n  <Header>h</Header>\n  <Body Id=\"b\">\n    <Line>1</Line>\n  </Body>\n</Doc>";
        let signed = sign_str(xml, &["b"], rsa_key(), &SignContext::default()).unwrap();
        assert!(verify_str(&signed, &trusted()).unwrap().is_valid());

        let tampered = signed.replace("<Header>h</Header>", "<Header>changed</Header>");
        assert!(verify_str(&tampered, &trusted()).unwrap().is_valid());
        let tampered = signed.replace("<Line>1</Line>", "<Line>2</Line>");
        assert_eq!(
            verify_str(&tampered, &trusted()).unwrap(),
            VerifyResult::DigestMismatch { uri: "#b".into() }
        );
    }

    #[test]
    fn test_mixed_content_whitespace_is_signed() {
        let xml = r#"<Doc Id="d"><p>Hello <b>big</b> <i>world</i></p></Doc>"#;
        let signed = sign_str(xml, &["d"], rsa_key(), &SignContext::default()).unwrap();
        assert!(signed.contains("</b> <i>"));
        assert!(verify_str(&signed, &trusted()).unwrap().is_valid());

        let tampered = signed.replace("</b> <i>", "</b>\n\n\n<i>");
        assert_eq!(
            verify_str(&tampered, &trusted()).unwrap(),
            VerifyResult::DigestMismatch { uri: "#d".into() }
        );
    }

    #[test]
    fn test_prefix_respelling_keeps_signature_valid() {
        let xml = r#"<p:Doc xmlns:p="urn:x" Id="d"><p:A p:k="1">1</p:A></p:Doc>"#;
        for mode in [C14nMode::Exclusive, C14nMode::Inclusive] {
            let ctx = SignContext {
                canonicalization: mode,
                ..SignContext::default()
            };
            let signed = sign_str(xml, &["d"], rsa_key(), &ctx).unwrap();
            let respelled = signed
                .replace("<p:", "<q:")
                .replace("</p:", "</q:")
                .replace("xmlns:p=", "xmlns:q=")
                .replace(" p:k=", " q:k=")
                .replace("ds:", "sig:")
                .replace("xmlns:ds=", "xmlns:sig=");
            assert!(respelled.contains("<q:A q:k=\"1\">"));
            assert!(respelled.contains("<sig:SignedInfo>"));
            assert_eq!(verify_str(&respelled, &trusted()).unwrap(), VerifyResult::Valid, "{mode:?}");
        }
    }

    #[test]
    fn test_multiple_references() {
        let xml = r#"<Doc><A Id="a">1</A><B ref="b">2</B></Doc>"#;
        let mut ctx = SignContext::default();
        ctx.add_id_attr("ref");
        let signed = sign_str(xml, &["a", "b"], rsa_key(), &ctx).unwrap();

        let mut verify_ctx = trusted();
        verify_ctx.add_id_attr("ref");
        assert!(verify_str(&signed, &verify_ctx).unwrap().is_valid());
        let tampered = signed.replace(">2</B>", ">3</B>");
        assert_eq!(
            verify_str(&tampered, &verify_ctx).unwrap(),
            VerifyResult::DigestMismatch { uri: "#b".into() }
        );
    }

    #[test]
    fn test_unresolvable_ids_leave_document_untouched() {
        let mut doc = xmlseal_xml::parse(r#"<Doc><A Id="x"/><B Id="x"/></Doc>"#).unwrap();
        let before = doc.clone();
        let err = sign_document(&mut doc, &["x"], rsa_key(), &SignContext::default()).unwrap_err();
        assert!(matches!(err, Error::ReferenceTargetNotFound { matches: 2, .. }));
        let err = sign_document(&mut doc, &["y"], rsa_key(), &SignContext::default()).unwrap_err();
        assert!(matches!(err, Error::ReferenceTargetNotFound { matches: 0, .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_algorithm_mismatches() {
        let mut doc = xmlseal_xml::parse(r#"<Doc Id="d"/>"#).unwrap();
        let ec_key = loader::load_key_pair(EC_KEY, EC_CERT).unwrap();
        let err = sign_document(&mut doc, &["d"], &ec_key, &SignContext::default()).unwrap_err();
        assert!(matches!(err, Error::AlgorithmMismatch(_)));

        let ctx = SignContext {
            digest_method: algorithm::SHA512.into(),
            ..SignContext::default()
        };
        let err = sign_document(&mut doc, &["d"], rsa_key(), &ctx).unwrap_err();
        assert!(matches!(err, Error::AlgorithmMismatch(_)));
        assert!(assemble::find_signature(&doc).is_none());
    }

    #[test]
    fn test_key_failure_is_surfaced_unchanged() {
        let mut doc = xmlseal_xml::parse(r#"<Doc Id="d"/>"#).unwrap();
        let before = doc.clone();
        let err = sign_document(&mut doc, &["d"], &FailingKey, &SignContext::default()).unwrap_err();
        assert!(matches!(err, Error::KeyMaterial(_)));
        assert_eq!(err.to_string(), "token unplugged");
        assert_eq!(doc, before);
    }

    #[test]
    fn test_signing_twice_is_rejected() {
        let mut doc = xmlseal_xml::parse(r#"<Doc Id="d"/>"#).unwrap();
        sign_document(&mut doc, &["d"], rsa_key(), &SignContext::default()).unwrap();
        let err = sign_document(&mut doc, &["d"], rsa_key(), &SignContext::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_concurrent_signing_with_shared_key() {
        let key = rsa_key();
        let ctx = SignContext::default();
        let docs: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let ctx = &ctx;
                    scope.spawn(move || {
                        let (id, xml) = (format!("d{i}"), format!(r#"<Doc Id="d{i}"><N>{i}</N></Doc>"#));
                        sign_str(&xml, &[id.as_str()], key, ctx).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for signed in &docs {
            assert!(verify_str(signed, &trusted()).unwrap().is_valid());
        }
    }

    struct Token(Key);

    impl SigningPrimitive for Token {
        fn signature_algorithm(&self) -> &str {
            self.0.signature_algorithm()
        }

        fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
            KeyMaterial::sign(&self.0, data)
        }
    }

    #[test]
    fn test_serialized_key_shared_across_threads() {
        let inner = loader::load_key_pair(RSA_KEY, RSA_CERT).unwrap();
        let cert = inner.certificate().to_vec();
        let key = SerializedKey::new(Token(inner), cert);
        let ctx = SignContext::default();
        std::thread::scope(|scope| {
            for i in 0..4 {
                let (key, ctx) = (&key, &ctx);
                scope.spawn(move || {
                    let (id, xml) = (format!("d{i}"), format!(r#"<Doc Id="d{i}"/>"#));
                    let signed = sign_str(&xml, &[id.as_str()], key, ctx).unwrap();
                    assert!(verify_str(&signed, &trusted()).unwrap().is_valid());
                });
            }
        });
    }
}
