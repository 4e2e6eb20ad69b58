#![forbid(unsafe_code)]

//! `Reference` and `SignedInfo` contents.

use base64::Engine;
use xmlseal_c14n::C14nMode;
use xmlseal_core::{ns, Error};
use xmlseal_crypto::digest;
use xmlseal_transforms::{c14n_method_element, prefix_list, TransformMethod, TransformPipeline};
use xmlseal_xml::{Document, Element, ElementPath, QName};

/// A digested reference to an element of the signed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Same-document reference, `#id`.
    pub uri: String,
    pub transforms: Vec<TransformMethod>,
    pub digest_method: String,
    pub digest_value: Vec<u8>,
}

impl Reference {
    /// Resolve `id`, run `transforms` over the element and digest the result.
    ///
    /// `signature` locates the enclosing `Signature` once it is part of the
    /// document; while signing it is `None`.
    pub fn compute(
        doc: &Document,
        id: &str,
        id_attrs: &[String],
        transforms: Vec<TransformMethod>,
        digest_method: &str,
        signature: Option<&ElementPath>,
    ) -> Result<Self, Error> {
        let target = doc.find_by_id(id, id_attrs)?;
        let digest_value = digest_target(doc, &target, &transforms, digest_method, signature)?;
        let reference = Self {
            uri: format!("#{id}"),
            transforms,
            digest_method: digest_method.to_owned(),
            digest_value,
        };
        tracing::debug!(uri = %reference.uri, digest = %reference.digest_base64(), "computed reference digest");
        Ok(reference)
    }

    /// The identifier named by a `#id` URI.
    pub fn target_id(&self) -> Result<&str, Error> {
        match self.uri.strip_prefix('#') {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::InvalidUri(format!(
                "only same-document #id references are supported: {:?}",
                self.uri
            ))),
        }
    }

    pub fn digest_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.digest_value)
    }

    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut transforms = ds(prefix, ns::node::TRANSFORMS);
        for t in &self.transforms {
            transforms.push_child(t.to_element(prefix));
        }
        ds(prefix, ns::node::REFERENCE)
            .with_attribute(ns::attr::URI, self.uri.clone())
            .with_child(transforms)
            .with_child(ds(prefix, ns::node::DIGEST_METHOD).with_attribute(ns::attr::ALGORITHM, self.digest_method.clone()))
            .with_child(ds(prefix, ns::node::DIGEST_VALUE).with_text(self.digest_base64()))
    }

    pub fn from_element(el: &Element) -> Result<Self, Error> {
        let uri = el
            .attribute(ns::attr::URI)
            .ok_or_else(|| Error::MissingAttribute("URI on Reference".into()))?;
        let transforms = match el.find_child(ns::DSIG, ns::node::TRANSFORMS) {
            Some(list) => list
                .find_children(ns::DSIG, ns::node::TRANSFORM)
                .map(TransformMethod::from_element)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let digest_method = algorithm_of(el, ns::node::DIGEST_METHOD)?;
        let digest_value = decode_base64(&required_child(el, ns::node::DIGEST_VALUE)?.text())?;
        Ok(Self {
            uri: uri.to_owned(),
            transforms,
            digest_method,
            digest_value,
        })
    }
}

/// Octets of the target after the transforms, hashed.
pub(crate) fn digest_target(
    doc: &Document,
    target: &ElementPath,
    transforms: &[TransformMethod],
    digest_method: &str,
    signature: Option<&ElementPath>,
) -> Result<Vec<u8>, Error> {
    let bytes = TransformPipeline::from_methods(transforms, signature).digest_input(doc, target)?;
    tracing::trace!(pre_digest = %String::from_utf8_lossy(&bytes), "reference pre-digest data");
    Ok(digest::digest(digest_method, &bytes)?.value)
}

/// The contents of `SignedInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningMetadata {
    pub canonicalization: C14nMode,
    pub inclusive_prefixes: Vec<String>,
    pub signature_method: String,
    pub references: Vec<Reference>,
}

impl SigningMetadata {
    pub fn to_element(&self, prefix: Option<&str>) -> Element {
        let mut signed_info = ds(prefix, ns::node::SIGNED_INFO)
            .with_child(c14n_method_element(
                prefix,
                ns::node::CANONICALIZATION_METHOD,
                self.canonicalization,
                &self.inclusive_prefixes,
            ))
            .with_child(
                ds(prefix, ns::node::SIGNATURE_METHOD)
                    .with_attribute(ns::attr::ALGORITHM, self.signature_method.clone()),
            );
        for reference in &self.references {
            signed_info.push_child(reference.to_element(prefix));
        }
        signed_info
    }

    pub fn from_element(el: &Element) -> Result<Self, Error> {
        if !el.name.is(ns::DSIG, ns::node::SIGNED_INFO) {
            return Err(Error::XmlStructure(format!(
                "expected SignedInfo, found {}",
                el.name.qualified()
            )));
        }
        let c14n_method = required_child(el, ns::node::CANONICALIZATION_METHOD)?;
        let c14n_uri = algorithm_of(el, ns::node::CANONICALIZATION_METHOD)?;
        let canonicalization = C14nMode::from_uri(&c14n_uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;

        let references = el
            .find_children(ns::DSIG, ns::node::REFERENCE)
            .map(Reference::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        if references.is_empty() {
            return Err(Error::MissingElement("Reference".into()));
        }

        Ok(Self {
            canonicalization,
            inclusive_prefixes: prefix_list(c14n_method),
            signature_method: algorithm_of(el, ns::node::SIGNATURE_METHOD)?,
            references,
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// An element in the XML-DSig namespace.
pub(crate) fn ds(prefix: Option<&str>, local_name: &str) -> Element {
    Element::new(QName::new(prefix, ns::DSIG, local_name))
}

pub(crate) fn required_child<'a>(parent: &'a Element, local_name: &str) -> Result<&'a Element, Error> {
    parent
        .find_child(ns::DSIG, local_name)
        .ok_or_else(|| Error::MissingElement(local_name.to_owned()))
}

fn algorithm_of(parent: &Element, local_name: &str) -> Result<String, Error> {
    required_child(parent, local_name)?
        .attribute(ns::attr::ALGORITHM)
        .map(str::to_owned)
        .ok_or_else(|| Error::MissingAttribute(format!("Algorithm on {local_name}")))
}

/// Decode base64 element content, ignoring embedded line breaks.
pub(crate) fn decode_base64(text: &str) -> Result<Vec<u8>, Error> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::Base64(e.to_string()))
}
