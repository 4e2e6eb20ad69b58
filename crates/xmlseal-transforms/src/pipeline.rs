#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use xmlseal_c14n::C14nMode;
use xmlseal_core::Error;
use xmlseal_xml::{Document, Element, ElementPath};

use crate::method::TransformMethod;
use crate::EnvelopedSignatureTransform;

/// Data flowing through the transform pipeline.
pub enum TransformData<'a> {
    /// An element of a document, with an optional descendant hidden from
    /// the output.
    Subtree {
        document: &'a Document,
        target: ElementPath,
        excluded: Option<&'a Element>,
    },
    /// Raw octets.
    Octets(Vec<u8>),
}

impl<'a> TransformData<'a> {
    pub fn subtree(document: &'a Document, target: ElementPath) -> Self {
        TransformData::Subtree {
            document,
            target,
            excluded: None,
        }
    }

    /// Convert to octets, applying inclusive C14N to a subtree.
    pub fn into_octets(self) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Octets(data) => Ok(data),
            TransformData::Subtree {
                document,
                target,
                excluded,
            } => xmlseal_c14n::canonicalize_subtree(
                document,
                &target,
                C14nMode::Inclusive,
                &[],
                excluded,
            ),
        }
    }
}

/// Trait for individual transforms.
pub trait Transform: Send + Sync {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform on the given data.
    fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error>;
}

/// A pipeline of transforms executed in sequence.
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Build the pipeline a `Reference` describes.
    ///
    /// `signature` locates the `Signature` element that holds the reference;
    /// it is `None` while the signature is still being built and is not yet
    /// part of the document.
    pub fn from_methods(methods: &[TransformMethod], signature: Option<&ElementPath>) -> Self {
        let mut pipeline = Self::new();
        for method in methods {
            let transform: Box<dyn Transform> = match method {
                TransformMethod::EnvelopedSignature => {
                    Box::new(EnvelopedSignatureTransform::new(signature.cloned()))
                }
                TransformMethod::Canonicalization {
                    mode,
                    inclusive_prefixes,
                } => Box::new(C14nTransform::new(*mode, inclusive_prefixes.clone())),
            };
            pipeline.push(transform);
        }
        pipeline
    }

    /// Add a transform to the pipeline.
    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Execute all transforms in order.
    pub fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error> {
        let mut data = input;
        for transform in &self.transforms {
            tracing::trace!(transform = transform.uri(), "applying transform");
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    /// Run the pipeline over the element at `target` and return the octets
    /// to digest.
    pub fn digest_input(&self, document: &Document, target: &ElementPath) -> Result<Vec<u8>, Error> {
        self.execute(TransformData::subtree(document, target.clone()))?
            .into_octets()
    }

    /// Number of transforms in the pipeline.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error> {
        let bytes = match input {
            TransformData::Subtree {
                document,
                target,
                excluded,
            } => xmlseal_c14n::canonicalize_subtree(
                document,
                &target,
                self.mode,
                &self.inclusive_prefixes,
                excluded,
            )?,
            TransformData::Octets(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                xmlseal_c14n::canonicalize_str(text, self.mode, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Octets(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><a:x Id="t"><y/></a:x></r>"#;

    #[test]
    fn test_empty_pipeline_defaults_to_inclusive() {
        let doc = xmlseal_xml::parse(DOC).unwrap();
        let target = doc.find_by_id("t", &[]).unwrap();
        let out = TransformPipeline::new().digest_input(&doc, &target).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<n0:x xmlns:n0="urn:a" xmlns:n1="urn:b" Id="t"><y></y></n0:x>"#
        );
    }

    #[test]
    fn test_exclusive_transform() {
        let doc = xmlseal_xml::parse(DOC).unwrap();
        let target = doc.find_by_id("t", &[]).unwrap();
        let mut pipeline = TransformPipeline::new();
        pipeline.push(Box::new(C14nTransform::new(C14nMode::Exclusive, Vec::new())));
        assert_eq!(pipeline.len(), 1);
        let out = pipeline.digest_input(&doc, &target).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<n0:x xmlns:n0="urn:a" Id="t"><y></y></n0:x>"#
        );
    }

    #[test]
    fn test_c14n_over_octets() {
        let c14n = C14nTransform::new(C14nMode::Inclusive, Vec::new());
        let out = c14n
            .execute(TransformData::Octets(br#"<a z="1" b="2"/>"#.to_vec()))
            .unwrap()
            .into_octets()
            .unwrap();
        assert_eq!(out, br#"<a b="2" z="1"></a>"#.to_vec());

        let bad = c14n.execute(TransformData::Octets(vec![0xff, 0xfe]));
        assert!(matches!(bad, Err(Error::Transform(_))));
    }
}
