#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5, RSA-PSS, ECDSA).
//!
//! Every algorithm is bound to exactly one hash. An XML-DSig reference whose
//! digest method uses a different hash than the signature method is rejected
//! by [`check_pairing`].

use signature::SignatureEncoding;
use xmlseal_core::{algorithm, Error};

/// Private key material for signing.
pub enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP384(p384::ecdsa::SigningKey),
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print private material.
        write!(f, "PrivateKey::{}(<redacted>)", self.kind())
    }
}

impl PrivateKey {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "Rsa",
            Self::EcP256(_) => "EcP256",
            Self::EcP384(_) => "EcP384",
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Rsa(k) => PublicKey::Rsa(k.to_public_key()),
            Self::EcP256(k) => PublicKey::EcP256(*k.verifying_key()),
            Self::EcP384(k) => PublicKey::EcP384(*k.verifying_key()),
        }
    }

    /// The signature algorithm used when none is configured.
    pub fn default_signature_algorithm(&self) -> &'static str {
        match self {
            Self::Rsa(_) => algorithm::RSA_SHA256,
            Self::EcP256(_) => algorithm::ECDSA_SHA256,
            Self::EcP384(_) => algorithm::ECDSA_SHA384,
        }
    }
}

/// Public key material for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send + Sync {
    fn uri(&self) -> &'static str;
    /// URI of the digest algorithm this scheme hashes with.
    fn digest_uri(&self) -> &'static str;
    fn sign(&self, key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    /// `Ok(false)` for a well-formed signature that does not verify.
    fn verify(&self, key: &PublicKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::RSA_PSS_SHA256 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_PSS_SHA384 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_PSS_SHA512 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256)),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384)),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

/// Reject a reference digest that uses a different hash than the signature
/// scheme.
pub fn check_pairing(signature_uri: &str, digest_uri: &str) -> Result<(), Error> {
    let expected = from_uri(signature_uri)?.digest_uri();
    if expected != digest_uri {
        return Err(Error::AlgorithmMismatch(format!(
            "signature method {signature_uri} hashes with {expected}, \
             but the reference digest method is {digest_uri}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum HashType { Sha1, Sha256, Sha384, Sha512 }

impl HashType {
    fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha256 => algorithm::SHA256,
            Self::Sha384 => algorithm::SHA384,
            Self::Sha512 => algorithm::SHA512,
        }
    }
}

fn rsa_public(key: &PublicKey) -> Result<&rsa::RsaPublicKey, Error> {
    match key {
        PublicKey::Rsa(pk) => Ok(pk),
        _ => Err(Error::Key("RSA public key required".into())),
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 { uri: &'static str, hash: HashType }

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str { self.uri }

    fn digest_uri(&self) -> &'static str { self.hash.uri() }

    fn sign(&self, key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let PrivateKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required".into()));
        };
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                let sig = sk
                    .try_sign(data)
                    .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))?;
                Ok(sig.to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let public_key = rsa_public(key)?;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

struct RsaPss { uri: &'static str, hash: HashType }

impl SignatureAlgorithm for RsaPss {
    fn uri(&self) -> &'static str { self.uri }

    fn digest_uri(&self) -> &'static str { self.hash.uri() }

    fn sign(&self, key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::RandomizedSigner;
        let PrivateKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required for PSS".into()));
        };
        let mut rng = rand::thread_rng();
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pss::SigningKey::<$hasher>::new(private_key.clone());
                let sig = sk
                    .try_sign_with_rng(&mut rng, data)
                    .map_err(|e| Error::Crypto(format!("RSA-PSS signing failed: {e}")))?;
                Ok(sig.to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let public_key = rsa_public(key)?;
        let sig = rsa::pss::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA-PSS signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pss::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── ECDSA ────────────────────────────────────────────────────────────
//
// XML-DSig carries ECDSA signatures as the raw r||s concatenation, which is
// exactly the fixed-size encoding of the `ecdsa` crate's `Signature`.

struct EcdsaP256;

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str { algorithm::ECDSA_SHA256 }

    fn digest_uri(&self) -> &'static str { algorithm::SHA256 }

    fn sign(&self, key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let PrivateKey::EcP256(sk) = key else {
            return Err(Error::Key("P-256 signing key required".into()));
        };
        let sig: p256::ecdsa::Signature = sk
            .try_sign(data)
            .map_err(|e| Error::Crypto(format!("ECDSA signing failed: {e}")))?;
        Ok(sig.to_bytes().to_vec())
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let PublicKey::EcP256(vk) = key else {
            return Err(Error::Key("P-256 public key required".into()));
        };
        let sig = p256::ecdsa::Signature::from_slice(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

struct EcdsaP384;

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str { algorithm::ECDSA_SHA384 }

    fn digest_uri(&self) -> &'static str { algorithm::SHA384 }

    fn sign(&self, key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let PrivateKey::EcP384(sk) = key else {
            return Err(Error::Key("P-384 signing key required".into()));
        };
        let sig: p384::ecdsa::Signature = sk
            .try_sign(data)
            .map_err(|e| Error::Crypto(format!("ECDSA signing failed: {e}")))?;
        Ok(sig.to_bytes().to_vec())
    }

    fn verify(&self, key: &PublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let PublicKey::EcP384(vk) = key else {
            return Err(Error::Key("P-384 public key required".into()));
        };
        let sig = p384::ecdsa::Signature::from_slice(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}
