#![forbid(unsafe_code)]

//! The finished `<Signature>` element.

use base64::Engine;
use xmlseal_core::{ns, Error};
use xmlseal_xml::{Element, Node};

use crate::metadata::{decode_base64, ds, required_child, SigningMetadata};

/// A complete signature: the `SignedInfo` that was signed, the signature
/// value and the signer's certificates.
///
/// Immutable once built. The exact `SignedInfo` element whose canonical
/// form was signed is kept, so attaching the container cannot change the
/// signed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContainer {
    metadata: SigningMetadata,
    signed_info: Element,
    signature_value: Vec<u8>,
    certificate: Vec<u8>,
    chain: Vec<Vec<u8>>,
    id: Option<String>,
    prefix: Option<String>,
}

impl SignatureContainer {
    pub(crate) fn new(
        metadata: SigningMetadata,
        signed_info: Element,
        signature_value: Vec<u8>,
        certificate: Vec<u8>,
        chain: Vec<Vec<u8>>,
        id: Option<String>,
        prefix: Option<String>,
    ) -> Self {
        Self {
            metadata,
            signed_info,
            signature_value,
            certificate,
            chain,
            id,
            prefix,
        }
    }

    pub fn metadata(&self) -> &SigningMetadata {
        &self.metadata
    }

    pub fn signed_info(&self) -> &Element {
        &self.signed_info
    }

    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    /// Leaf certificate (DER); empty when the signature carries none.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Build the `<Signature>` element.
    pub fn to_element(&self) -> Element {
        let prefix = self.prefix.as_deref();
        let engine = base64::engine::general_purpose::STANDARD;

        let mut x509_data = ds(prefix, ns::node::X509_DATA);
        for der in std::iter::once(&self.certificate)
            .filter(|der| !der.is_empty())
            .chain(&self.chain)
        {
            x509_data.push_child(ds(prefix, ns::node::X509_CERTIFICATE).with_text(engine.encode(der)));
        }

        let mut signature = signature_shell(prefix, self.id.as_deref())
            .with_child(self.signed_info.clone())
            .with_child(ds(prefix, ns::node::SIGNATURE_VALUE).with_text(engine.encode(&self.signature_value)));
        if x509_data.has_element_children() {
            signature.push_child(ds(prefix, ns::node::KEY_INFO).with_child(x509_data));
        }
        signature
    }

    /// Read a `<Signature>` element.
    pub fn from_element(el: &Element) -> Result<Self, Error> {
        if !el.name.is(ns::DSIG, ns::node::SIGNATURE) {
            return Err(Error::XmlStructure(format!(
                "expected Signature, found {}",
                el.name.qualified()
            )));
        }
        let signed_info = required_child(el, ns::node::SIGNED_INFO)?;
        let metadata = SigningMetadata::from_element(signed_info)?;
        let signature_value = decode_base64(&required_child(el, ns::node::SIGNATURE_VALUE)?.text())?;

        let mut certs = Vec::new();
        if let Some(key_info) = el.find_child(ns::DSIG, ns::node::KEY_INFO) {
            for data in key_info.find_children(ns::DSIG, ns::node::X509_DATA) {
                for cert in data.find_children(ns::DSIG, ns::node::X509_CERTIFICATE) {
                    certs.push(decode_base64(&cert.text())?);
                }
            }
        }
        let mut certs = certs.into_iter();
        let certificate = certs.next().unwrap_or_default();

        Ok(Self {
            metadata,
            signed_info: signed_info.clone(),
            signature_value,
            certificate,
            chain: certs.collect(),
            id: el.attribute(ns::attr::ID).map(str::to_owned),
            prefix: el.name.prefix.clone(),
        })
    }
}

/// The `<Signature>` element without children: the namespace and ID
/// scope that `SignedInfo` sits in.
pub(crate) fn signature_shell(prefix: Option<&str>, id: Option<&str>) -> Element {
    let mut shell = ds(prefix, ns::node::SIGNATURE).with_namespace(prefix, ns::DSIG);
    if let Some(id) = id {
        shell.set_attribute(ns::attr::ID, id);
    }
    shell
}

/// Position of the `SignedInfo` child within a `Signature` element.
pub(crate) fn signed_info_index(signature: &Element) -> Option<usize> {
    signature.children.iter().position(|n| match n {
        Node::Element(e) => e.name.is(ns::DSIG, ns::node::SIGNED_INFO),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Reference;
    use pretty_assertions::assert_eq;
    use xmlseal_c14n::C14nMode;
    use xmlseal_core::algorithm;
    use xmlseal_transforms::TransformMethod;

    fn container(prefix: Option<&str>) -> SignatureContainer {
        let metadata = SigningMetadata {
            canonicalization: C14nMode::Exclusive,
            inclusive_prefixes: Vec::new(),
            signature_method: algorithm::RSA_SHA256.into(),
            references: vec![Reference {
                uri: "#a".into(),
                transforms: vec![TransformMethod::EnvelopedSignature],
                digest_method: algorithm::SHA256.into(),
                digest_value: vec![1, 2, 3],
            }],
        };
        let signed_info = metadata.to_element(prefix);
        SignatureContainer::new(
            metadata,
            signed_info,
            vec![9, 9],
            vec![0x30, 0x01],
            vec![vec![0x30, 0x02]],
            Some("sig-1".into()),
            prefix.map(str::to_owned),
        )
    }

    #[test]
    fn test_element_layout() {
        let el = container(Some("ds")).to_element();
        assert_eq!(el.name.qualified(), "ds:Signature");
        assert_eq!(el.attribute("Id"), Some("sig-1"));
        let names: Vec<String> = el.child_elements().map(|c| c.name.local_name.clone()).collect();
        assert_eq!(names, vec!["SignedInfo", "SignatureValue", "KeyInfo"]);
        assert_eq!(
            el.find_child(ns::DSIG, "SignatureValue").unwrap().text(),
            "CQk="
        );
        let x509 = el
            .find_child(ns::DSIG, "KeyInfo")
            .and_then(|k| k.find_child(ns::DSIG, "X509Data"))
            .unwrap();
        assert_eq!(x509.find_children(ns::DSIG, "X509Certificate").count(), 2);
    }

    #[test]
    fn test_from_element_round_trip() {
        for prefix in [Some("ds"), None] {
            let original = container(prefix);
            let parsed = SignatureContainer::from_element(&original.to_element()).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn test_round_trip_through_text() {
        let xml = xmlseal_xml::write_element(&container(Some("ds")).to_element()).unwrap();
        let doc = xmlseal_xml::parse(&xml).unwrap();
        let parsed = SignatureContainer::from_element(&doc.root).unwrap();
        assert_eq!(parsed.signature_value(), &[9u8, 9][..]);
        assert_eq!(parsed.certificate(), &[0x30u8, 0x01][..]);
        assert_eq!(parsed.chain().len(), 1);
        assert_eq!(signed_info_index(&doc.root), Some(0));
    }

    #[test]
    fn test_missing_signature_value() {
        let el = signature_shell(Some("ds"), None)
            .with_child(container(Some("ds")).metadata().to_element(Some("ds")));
        assert!(matches!(
            SignatureContainer::from_element(&el),
            Err(Error::MissingElement(_))
        ));
    }
}
