#![forbid(unsafe_code)]

//! Signing and verification contexts.

use xmlseal_c14n::C14nMode;
use xmlseal_core::{algorithm, Error};
use xmlseal_crypto::{digest, sign, PublicKey};
use xmlseal_transforms::TransformMethod;

/// Configuration for creating an enveloped signature.
#[derive(Debug, Clone)]
pub struct SignContext {
    /// Algorithm for `SignedInfo` and for the reference transform.
    pub canonicalization: C14nMode,
    /// InclusiveNamespaces PrefixList for exclusive canonicalization.
    pub inclusive_prefixes: Vec<String>,
    pub signature_method: String,
    pub digest_method: String,
    /// Additional ID attribute names to register.
    pub id_attrs: Vec<String>,
    /// Prepend the enveloped-signature transform to each reference.
    pub enveloped: bool,
    /// Prefix for XML-DSig elements; `None` uses the default namespace.
    pub prefix: Option<String>,
    /// Value of `Signature/@Id`.
    pub signature_id: Option<String>,
}

impl Default for SignContext {
    fn default() -> Self {
        Self {
            canonicalization: C14nMode::Exclusive,
            inclusive_prefixes: Vec::new(),
            signature_method: algorithm::RSA_SHA256.to_owned(),
            digest_method: algorithm::SHA256.to_owned(),
            id_attrs: Vec::new(),
            enveloped: true,
            prefix: Some(xmlseal_core::ns::DSIG_PREFIX.to_owned()),
            signature_id: None,
        }
    }
}

impl SignContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `signature_method` together with the digest it hashes with.
    pub fn with_signature_method(mut self, signature_method: &str) -> Result<Self, Error> {
        let alg = sign::from_uri(signature_method)?;
        self.signature_method = alg.uri().to_owned();
        self.digest_method = alg.digest_uri().to_owned();
        Ok(self)
    }

    /// Add an ID attribute name to register during processing.
    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }

    /// Check that every algorithm is known and that the digest pairs with
    /// the signature scheme.
    pub fn validate(&self) -> Result<(), Error> {
        digest::from_uri(&self.digest_method)?;
        sign::check_pairing(&self.signature_method, &self.digest_method)
    }

    /// Transform list written into every reference.
    pub fn reference_transforms(&self) -> Vec<TransformMethod> {
        let mut transforms = Vec::with_capacity(2);
        if self.enveloped {
            transforms.push(TransformMethod::EnvelopedSignature);
        }
        transforms.push(TransformMethod::Canonicalization {
            mode: self.canonicalization,
            inclusive_prefixes: self.inclusive_prefixes.clone(),
        });
        transforms
    }
}

/// Configuration for verifying an enveloped signature.
#[derive(Debug, Clone, Default)]
pub struct VerifyContext {
    /// Key the signature must verify with.
    pub trusted_key: Option<PublicKey>,
    /// When set, the embedded leaf certificate must be byte-identical.
    pub trusted_certificate: Option<Vec<u8>>,
    /// Fall back to the key of the embedded certificate when no trusted key
    /// is configured. Proves integrity only, not origin.
    pub allow_embedded_certificate: bool,
    pub id_attrs: Vec<String>,
}

impl VerifyContext {
    pub fn with_public_key(key: PublicKey) -> Self {
        Self {
            trusted_key: Some(key),
            ..Self::default()
        }
    }

    /// Trust a DER certificate: its key verifies, and the document must
    /// embed the same certificate.
    pub fn with_certificate(der: Vec<u8>) -> Result<Self, Error> {
        let key = xmlseal_keys::x509::public_key_from_certificate(&der)?;
        Ok(Self {
            trusted_key: Some(key),
            trusted_certificate: Some(der),
            ..Self::default()
        })
    }

    pub fn add_id_attr(&mut self, name: &str) {
        self.id_attrs.push(name.to_owned());
    }
}
