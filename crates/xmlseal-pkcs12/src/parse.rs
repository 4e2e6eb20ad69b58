#![forbid(unsafe_code)]

//! BER decoding of the PFX structure (RFC 7292).
//!
//! PKCS#12 files are BER, not DER, so `yasna::parse_ber` reads them.

use xmlseal_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, ASN1Result, BERReader, Tag};

use crate::kdf::{self, Hash};
use crate::Pkcs12Bundle;

mod oid {
    pub const DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
    pub const ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];
    pub const SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
    pub const CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
    pub const X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];
    pub const PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
    pub const PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
    pub const PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];
    pub const AES_128_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 2];
    pub const AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];
    pub const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
    pub const SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
    pub const HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
    pub const HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];
}

fn is(found: &ObjectIdentifier, expected: &[u64]) -> bool {
    found.components()[..] == *expected
}

fn invalid<T>() -> ASN1Result<T> {
    Err(ASN1Error::new(ASN1ErrorKind::Invalid))
}

#[derive(Debug)]
enum Encryption {
    PbeSha1TripleDes {
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: Hash,
        key_len: usize,
        iv: Vec<u8>,
    },
}

impl Encryption {
    fn decrypt(
        &self,
        ciphertext: &[u8],
        password: &str,
        bmp_password: &[u8],
    ) -> Result<Vec<u8>, Error> {
        match self {
            Self::PbeSha1TripleDes { salt, iterations } => {
                kdf::decrypt_pbe_sha1_3des(ciphertext, bmp_password, salt, *iterations)
            }
            Self::Pbes2 {
                salt,
                iterations,
                prf,
                key_len,
                iv,
            } => kdf::decrypt_pbes2(ciphertext, password, salt, *iterations, *prf, *key_len, iv),
        }
    }
}

struct MacData {
    hash: Hash,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum SafeContents {
    Plain(Vec<u8>),
    Encrypted {
        encryption: Encryption,
        ciphertext: Vec<u8>,
    },
}

enum SafeBag {
    ShroudedKey {
        encryption: Encryption,
        ciphertext: Vec<u8>,
    },
    Certificate(Vec<u8>),
    Other,
}

pub(crate) fn parse_pfx(data: &[u8], password: &str) -> Result<Pkcs12Bundle, Error> {
    let (auth_safe, mac) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 3 {
                return invalid();
            }
            let auth_safe = read_data_content_info(r.next())?;
            let mac = r.read_optional(read_mac_data)?;
            Ok((auth_safe, mac))
        })
    })
    .map_err(|e| Error::Key(format!("malformed PKCS#12 PFX: {e}")))?;

    let bmp_password = kdf::bmp_password(password);
    match &mac {
        Some(mac) => {
            let ok = kdf::mac_matches(
                mac.hash,
                &bmp_password,
                &mac.salt,
                mac.iterations,
                &auth_safe,
                &mac.digest,
            );
            if !ok {
                return Err(Error::Key("PKCS#12 MAC check failed (wrong password?)".into()));
            }
        }
        None => tracing::warn!("PKCS#12 bundle has no MAC; integrity is not checked"),
    }

    let contents = yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(read_safe_contents))
        .map_err(|e| Error::Key(format!("malformed PKCS#12 authenticated safe: {e}")))?;

    let mut bundle = Pkcs12Bundle::default();
    for content in contents {
        let bags_der = match content {
            SafeContents::Plain(der) => der,
            SafeContents::Encrypted {
                encryption,
                ciphertext,
            } => encryption.decrypt(&ciphertext, password, &bmp_password)?,
        };
        let bags = yasna::parse_ber(&bags_der, |r| r.collect_sequence_of(read_safe_bag))
            .map_err(|e| Error::Key(format!("malformed PKCS#12 safe contents: {e}")))?;
        for bag in bags {
            match bag {
                SafeBag::ShroudedKey {
                    encryption,
                    ciphertext,
                } => bundle
                    .private_keys
                    .push(encryption.decrypt(&ciphertext, password, &bmp_password)?),
                SafeBag::Certificate(der) => bundle.certificates.push(der),
                SafeBag::Other => {}
            }
        }
    }
    Ok(bundle)
}

/// `ContentInfo` of type `data`: its `[0] EXPLICIT OCTET STRING`.
fn read_data_content_info(r: BERReader) -> ASN1Result<Vec<u8>> {
    r.read_sequence(|r| {
        if !is(&r.next().read_oid()?, oid::DATA) {
            return invalid();
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

fn read_safe_contents(r: BERReader) -> ASN1Result<SafeContents> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if is(&content_type, oid::DATA) {
            let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            return Ok(SafeContents::Plain(der));
        }
        if !is(&content_type, oid::ENCRYPTED_DATA) {
            return invalid();
        }
        r.next().read_tagged(Tag::context(0), |r| {
            r.read_sequence(|r| {
                let _version = r.next().read_u32()?;
                r.next().read_sequence(|r| {
                    let _content_type = r.next().read_oid()?;
                    let encryption = read_encryption(r.next())?;
                    let ciphertext = r
                        .next()
                        .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                    Ok(SafeContents::Encrypted {
                        encryption,
                        ciphertext,
                    })
                })
            })
        })
    })
}

fn read_safe_bag(r: BERReader) -> ASN1Result<SafeBag> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;
        let bag = if is(&bag_type, oid::SHROUDED_KEY_BAG) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let encryption = read_encryption(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok(SafeBag::ShroudedKey {
                        encryption,
                        ciphertext,
                    })
                })
            })?
        } else if is(&bag_type, oid::CERT_BAG) {
            r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    if !is(&r.next().read_oid()?, oid::X509_CERTIFICATE) {
                        return invalid();
                    }
                    let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                    Ok(SafeBag::Certificate(der))
                })
            })?
        } else {
            r.next().read_der()?;
            SafeBag::Other
        };
        // bagAttributes (friendlyName, localKeyId) are not needed.
        r.read_optional(|r| r.read_der())?;
        Ok(bag)
    })
}

fn read_encryption(r: BERReader) -> ASN1Result<Encryption> {
    r.read_sequence(|r| {
        let algorithm = r.next().read_oid()?;
        if is(&algorithm, oid::PBE_SHA1_3DES) {
            return r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(Encryption::PbeSha1TripleDes { salt, iterations })
            });
        }
        if !is(&algorithm, oid::PBES2) {
            return invalid();
        }
        r.next().read_sequence(|r| {
            let (salt, iterations, prf) = r.next().read_sequence(|r| {
                if !is(&r.next().read_oid()?, oid::PBKDF2) {
                    return invalid();
                }
                r.next().read_sequence(|r| {
                    let salt = r.next().read_bytes()?;
                    let iterations = r.next().read_u32()?;
                    // Optional keyLength INTEGER, then optional PRF (default HMAC-SHA1).
                    let mut prf = Hash::Sha1;
                    while let Some(field) = r.read_optional(|r| r.read_der())? {
                        if field.first() == Some(&0x30) {
                            prf = read_prf(&field)?;
                        }
                    }
                    Ok((salt, iterations, prf))
                })
            })?;
            let (key_len, iv) = r.next().read_sequence(|r| {
                let cipher = r.next().read_oid()?;
                let key_len = if is(&cipher, oid::AES_256_CBC) {
                    32
                } else if is(&cipher, oid::AES_128_CBC) {
                    16
                } else {
                    return invalid();
                };
                Ok((key_len, r.next().read_bytes()?))
            })?;
            Ok(Encryption::Pbes2 {
                salt,
                iterations,
                prf,
                key_len,
                iv,
            })
        })
    })
}

fn read_prf(der: &[u8]) -> ASN1Result<Hash> {
    yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let prf = r.next().read_oid()?;
            r.read_optional(|r| r.read_null())?;
            if is(&prf, oid::HMAC_SHA256) {
                Ok(Hash::Sha256)
            } else if is(&prf, oid::HMAC_SHA1) {
                Ok(Hash::Sha1)
            } else {
                invalid()
            }
        })
    })
}

fn read_mac_data(r: BERReader) -> ASN1Result<MacData> {
    r.read_sequence(|r| {
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let algorithm = r.next().read_oid()?;
                r.read_optional(|r| r.read_null())?;
                if is(&algorithm, oid::SHA256) {
                    Ok(Hash::Sha256)
                } else if is(&algorithm, oid::SHA1) {
                    Ok(Hash::Sha1)
                } else {
                    invalid()
                }
            })?;
            Ok((hash, r.next().read_bytes()?))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(MacData {
            hash,
            digest,
            salt,
            iterations,
        })
    })
}
