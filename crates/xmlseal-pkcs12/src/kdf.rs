#![forbid(unsafe_code)]

//! Password-based key derivation and decryption (RFC 7292 Appendix B, PBES2).

use cipher::block_padding::Pkcs7;
use cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};
use digest::core_api::BlockSizeUser;
use digest::{Digest, FixedOutputReset};
use hmac::Mac;
use sha1::Sha1;
use sha2::Sha256;
use xmlseal_core::Error;

/// Diversifier byte of the PKCS#12 KDF (RFC 7292 B.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Purpose {
    Key = 1,
    Iv = 2,
    Mac = 3,
}

/// Hash behind a PKCS#12 MAC or PBKDF2 PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hash {
    Sha1,
    Sha256,
}

/// The password as a NUL-terminated big-endian BMPString.
pub(crate) fn bmp_password(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let mut bmp: Vec<u8> = password.encode_utf16().flat_map(u16::to_be_bytes).collect();
    bmp.extend_from_slice(&[0, 0]);
    bmp
}

/// The PKCS#12 KDF over hash `D`.
pub(crate) fn derive<D>(
    purpose: Purpose,
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
    len: usize,
) -> Vec<u8>
where
    D: Digest + FixedOutputReset + BlockSizeUser,
{
    let v = D::block_size();
    let diversifier = vec![purpose as u8; v];
    let mut input = fill_blocks(salt, v);
    input.extend(fill_blocks(bmp_password, v));

    let mut hasher = <D as Digest>::new();
    let mut out = Vec::with_capacity(len + <D as Digest>::output_size());
    while out.len() < len {
        Digest::update(&mut hasher, &diversifier);
        Digest::update(&mut hasher, &input);
        let mut block = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &block);
            block = hasher.finalize_reset();
        }
        out.extend_from_slice(&block);

        if out.len() < len {
            let b = fill_blocks(&block, v);
            for chunk in input.chunks_mut(v) {
                add_one_plus(chunk, &b);
            }
        }
    }
    out.truncate(len);
    out
}

/// `data` repeated up to the next multiple of `v` bytes.
fn fill_blocks(data: &[u8], v: usize) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    data.iter()
        .copied()
        .cycle()
        .take(data.len().div_ceil(v) * v)
        .collect()
}

/// `chunk = (chunk + b + 1) mod 2^(8 * len)`, big-endian.
fn add_one_plus(chunk: &mut [u8], b: &[u8]) {
    let mut carry = 1u16;
    for (x, y) in chunk.iter_mut().zip(b).rev() {
        let sum = u16::from(*x) + u16::from(*y) + carry;
        *x = sum as u8;
        carry = sum >> 8;
    }
}

/// Whether the HMAC of `data` under the key derived from `bmp_password`
/// equals `expected`.
pub(crate) fn mac_matches(
    hash: Hash,
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
    data: &[u8],
    expected: &[u8],
) -> bool {
    match hash {
        Hash::Sha1 => {
            let key = derive::<Sha1>(Purpose::Mac, bmp_password, salt, iterations, 20);
            hmac_matches::<hmac::Hmac<Sha1>>(&key, data, expected)
        }
        Hash::Sha256 => {
            let key = derive::<Sha256>(Purpose::Mac, bmp_password, salt, iterations, 32);
            hmac_matches::<hmac::Hmac<Sha256>>(&key, data, expected)
        }
    }
}

fn hmac_matches<M: Mac + KeyInit>(key: &[u8], data: &[u8], expected: &[u8]) -> bool {
    match <M as Mac>::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(expected).is_ok()
        }
        Err(_) => false,
    }
}

/// `pbeWithSHAAnd3-KeyTripleDES-CBC`.
pub(crate) fn decrypt_pbe_sha1_3des(
    ciphertext: &[u8],
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let key = derive::<Sha1>(Purpose::Key, bmp_password, salt, iterations, 24);
    let iv = derive::<Sha1>(Purpose::Iv, bmp_password, salt, iterations, 8);
    cbc_decrypt::<des::TdesEde3>(&key, &iv, ciphertext)
}

/// PBES2 with PBKDF2 and AES-CBC; `key_len` selects AES-128 or AES-256.
pub(crate) fn decrypt_pbes2(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
    prf: Hash,
    key_len: usize,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = vec![0u8; key_len];
    match prf {
        Hash::Sha1 => pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key),
        Hash::Sha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key)
        }
    }
    match key_len {
        16 => cbc_decrypt::<aes::Aes128>(&key, iv, ciphertext),
        32 => cbc_decrypt::<aes::Aes256>(&key, iv, ciphertext),
        n => Err(Error::Key(format!("unsupported AES key length {n}"))),
    }
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| Error::Key(format!("bad PKCS#12 cipher parameters: {e}")))?;
    let mut buf = ciphertext.to_vec();
    let len = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::Key("PKCS#12 decryption failed".into()))?
        .len();
    buf.truncate(len);
    Ok(buf)
}
