#![forbid(unsafe_code)]

//! Mutual exclusion for signing primitives that are not reentrant.

use std::sync::Mutex;

use xmlseal_core::{KeyMaterial, KeyMaterialError};

/// A signing primitive that needs exclusive access while it signs, such as
/// a hardware token session or a handle to a single-threaded library.
pub trait SigningPrimitive: Send {
    fn signature_algorithm(&self) -> &str;
    fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError>;
}

/// Adapts a [`SigningPrimitive`] to [`KeyMaterial`].
///
/// The lock is held only while the primitive signs. Canonicalization and
/// digesting by concurrent signers proceed in parallel.
pub struct SerializedKey<P> {
    primitive: Mutex<P>,
    signature_algorithm: String,
    certificate: Vec<u8>,
    chain: Vec<Vec<u8>>,
}

impl<P: SigningPrimitive> SerializedKey<P> {
    pub fn new(primitive: P, certificate: Vec<u8>) -> Self {
        let signature_algorithm = primitive.signature_algorithm().to_owned();
        Self {
            primitive: Mutex::new(primitive),
            signature_algorithm,
            certificate,
            chain: Vec::new(),
        }
    }

    pub fn with_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.chain = chain;
        self
    }

    pub fn into_inner(self) -> Result<P, KeyMaterialError> {
        self.primitive
            .into_inner()
            .map_err(|_| "signing primitive lock poisoned".into())
    }
}

impl<P: SigningPrimitive> KeyMaterial for SerializedKey<P> {
    fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        let mut primitive = self
            .primitive
            .lock()
            .map_err(|_| KeyMaterialError::from("signing primitive lock poisoned"))?;
        primitive.sign(data)
    }

    fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.chain
    }
}
