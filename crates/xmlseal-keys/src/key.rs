#![forbid(unsafe_code)]

//! In-memory signing key with its certificate.

use xmlseal_core::{algorithm, Error, KeyMaterial, KeyMaterialError};
use xmlseal_crypto::{sign, PrivateKey, PublicKey};

/// A private key, the signature algorithm it signs with, and the
/// certificates that identify it.
///
/// The RustCrypto signers are reentrant, so a `Key` can be shared by
/// reference between threads without locking.
pub struct Key {
    /// Optional name, used in logs only.
    pub name: Option<String>,
    private: PrivateKey,
    signature_algorithm: &'static str,
    certificate: Vec<u8>,
    chain: Vec<Vec<u8>>,
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.name)
            .field("private", &self.private)
            .field("signature_algorithm", &self.signature_algorithm)
            .field("certificate_len", &self.certificate.len())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

impl Key {
    /// Pair a private key with its DER certificate, using the key type's
    /// default algorithm (RSA-SHA256, ECDSA-SHA256 or ECDSA-SHA384).
    pub fn new(private: PrivateKey, certificate: Vec<u8>) -> Self {
        let signature_algorithm = private.default_signature_algorithm();
        Self {
            name: None,
            private,
            signature_algorithm,
            certificate,
            chain: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Intermediate certificates (DER), leaf excluded.
    pub fn with_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.chain = chain;
        self
    }

    /// Select a different signature algorithm.
    ///
    /// Fails with [`Error::AlgorithmMismatch`] if the key cannot produce it.
    pub fn with_signature_algorithm(mut self, uri: &str) -> Result<Self, Error> {
        let alg = sign::from_uri(uri)?;
        let compatible = match &self.private {
            PrivateKey::Rsa(_) => !matches!(alg.uri(), algorithm::ECDSA_SHA256 | algorithm::ECDSA_SHA384),
            PrivateKey::EcP256(_) => alg.uri() == algorithm::ECDSA_SHA256,
            PrivateKey::EcP384(_) => alg.uri() == algorithm::ECDSA_SHA384,
        };
        if !compatible {
            return Err(Error::AlgorithmMismatch(format!(
                "{} key cannot sign with {uri}",
                self.private.kind()
            )));
        }
        self.signature_algorithm = alg.uri();
        Ok(self)
    }

    pub fn public_key(&self) -> PublicKey {
        self.private.public_key()
    }
}

impl KeyMaterial for Key {
    fn signature_algorithm(&self) -> &str {
        self.signature_algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        tracing::debug!(key = ?self.name, algorithm = self.signature_algorithm, "signing");
        let alg = sign::from_uri(self.signature_algorithm)?;
        Ok(alg.sign(&self.private, data)?)
    }

    fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.chain
    }
}
