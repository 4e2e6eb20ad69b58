#![forbid(unsafe_code)]

//! Reference transform chain for xmlseal.
//!
//! Each `Reference` lists transforms that turn the referenced element into
//! the octets that get digested. Two are supported: the enveloped-signature
//! transform, which hides the `Signature` element that contains the
//! reference, and the canonicalization transforms.

pub mod enveloped;
pub mod method;
pub mod pipeline;

pub use enveloped::EnvelopedSignatureTransform;
pub use method::{c14n_method_element, prefix_list, TransformMethod};
pub use pipeline::{C14nTransform, Transform, TransformData, TransformPipeline};
