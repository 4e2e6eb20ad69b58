#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Hides the `<Signature>` element that holds the reference, together with
//! its descendants, from the data being digested.

use crate::pipeline::{Transform, TransformData};
use xmlseal_core::{algorithm, Error};
use xmlseal_xml::ElementPath;

/// The enveloped signature transform.
pub struct EnvelopedSignatureTransform {
    /// Path of the `<Signature>` element to remove. `None` while the
    /// signature is being created and is not yet in the document.
    signature: Option<ElementPath>,
}

impl EnvelopedSignatureTransform {
    pub fn new(signature: Option<ElementPath>) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute<'a>(&self, input: TransformData<'a>) -> Result<TransformData<'a>, Error> {
        match input {
            TransformData::Subtree {
                document,
                target,
                excluded,
            } => {
                let excluded = match &self.signature {
                    Some(sig) if sig.0.starts_with(&target.0) => {
                        if sig == &target {
                            return Err(Error::Transform(
                                "enveloped-signature transform applied to the Signature itself".into(),
                            ));
                        }
                        let element = document.element(sig).ok_or_else(|| {
                            Error::MissingElement(format!("no Signature element at {sig:?}"))
                        })?;
                        Some(element)
                    }
                    // The signature lies outside the referenced subtree.
                    _ => excluded,
                };
                Ok(TransformData::Subtree {
                    document,
                    target,
                    excluded,
                })
            }
            TransformData::Octets(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}
