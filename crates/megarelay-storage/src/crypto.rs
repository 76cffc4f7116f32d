//! Provider cipher plumbing
//!
//! MEGA encrypts everything client-side: node payloads with AES-128-CTR,
//! node attributes with AES-128-CBC (zero IV), key material with AES-128-ECB
//! under the account master key, and integrity with a chunked CBC-MAC
//! condensed into an 8-byte meta-MAC. This module implements exactly those
//! primitives over the `aes` block cipher plus the base64url field coding
//! the wire format uses. Only `MegaApiGateway` depends on it.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::traits::StorageError;

pub const AES_BLOCK: usize = 16;

/// base64url without padding, as used for every binary field on the wire.
pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode the provider's base64 variant. Tolerates standard-alphabet input
/// and stray padding, both of which appear in older field encodings.
pub fn b64url_decode(value: &str) -> Result<Vec<u8>, StorageError> {
    let normalized: String = value
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| StorageError::MalformedResponse(format!("bad base64 field: {e}")))
}

fn cipher(key: &[u8; 16]) -> Aes128 {
    Aes128::new(GenericArray::from_slice(key))
}

/// AES-128-ECB over a buffer whose length is a multiple of the block size.
pub fn ecb_encrypt(key: &[u8; 16], data: &mut [u8]) {
    debug_assert!(data.len() % AES_BLOCK == 0);
    let cipher = cipher(key);
    for block in data.chunks_exact_mut(AES_BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
}

pub fn ecb_decrypt(key: &[u8; 16], data: &mut [u8]) {
    debug_assert!(data.len() % AES_BLOCK == 0);
    let cipher = cipher(key);
    for block in data.chunks_exact_mut(AES_BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// AES-128-CBC with a zero IV, as used for attribute blocks.
pub fn cbc_encrypt_zero_iv(key: &[u8; 16], data: &mut [u8]) {
    debug_assert!(data.len() % AES_BLOCK == 0);
    let cipher = cipher(key);
    let mut prev = [0u8; AES_BLOCK];
    for block in data.chunks_exact_mut(AES_BLOCK) {
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        prev.copy_from_slice(block);
    }
}

pub fn cbc_decrypt_zero_iv(key: &[u8; 16], data: &mut [u8]) {
    debug_assert!(data.len() % AES_BLOCK == 0);
    let cipher = cipher(key);
    let mut prev = [0u8; AES_BLOCK];
    for block in data.chunks_exact_mut(AES_BLOCK) {
        let saved: [u8; AES_BLOCK] = block.try_into().expect("exact chunk");
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = saved;
    }
}

/// AES-128-CTR over the whole buffer, counter starting at zero. The IV is
/// the 8-byte nonce followed by a 64-bit big-endian block counter.
pub fn ctr_crypt(key: &[u8; 16], nonce: &[u8; 8], data: &mut [u8]) {
    let cipher = cipher(key);
    let mut counter: u64 = 0;
    for block in data.chunks_mut(AES_BLOCK) {
        let mut keystream = [0u8; AES_BLOCK];
        keystream[..8].copy_from_slice(nonce);
        keystream[8..].copy_from_slice(&counter.to_be_bytes());
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut keystream));
        for (b, k) in block.iter_mut().zip(keystream.iter()) {
            *b ^= k;
        }
        counter += 1;
    }
}

/// CBC-MAC of one chunk, starting from the given IV. Partial trailing
/// blocks are zero-padded, matching the provider's scheme.
fn cbc_mac(key: &Aes128, iv: [u8; AES_BLOCK], data: &[u8]) -> [u8; AES_BLOCK] {
    let mut mac = iv;
    for block in data.chunks(AES_BLOCK) {
        for (m, b) in mac.iter_mut().zip(block.iter()) {
            *m ^= b;
        }
        let mut ga = GenericArray::from(mac);
        key.encrypt_block(&mut ga);
        mac.copy_from_slice(&ga);
    }
    mac
}

/// Chunk boundaries for payload MACs: 128 KiB, then growing by 128 KiB per
/// chunk up to a 1 MiB ceiling.
pub fn chunk_ranges(size: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut pos: u64 = 0;
    let mut chunk: u64 = 0x20000;
    while pos + chunk < size {
        ranges.push((pos, chunk));
        pos += chunk;
        if chunk < 0x100000 {
            chunk += 0x20000;
        }
    }
    ranges.push((pos, size - pos));
    ranges
}

/// Full-file MAC over the plaintext, chunked per `chunk_ranges`.
pub fn file_mac(key: &[u8; 16], nonce: &[u8; 8], data: &[u8]) -> [u8; AES_BLOCK] {
    let cipher = cipher(key);
    let mut chunk_iv = [0u8; AES_BLOCK];
    chunk_iv[..8].copy_from_slice(nonce);
    chunk_iv[8..].copy_from_slice(nonce);

    let mut mac = [0u8; AES_BLOCK];
    for (start, len) in chunk_ranges(data.len() as u64) {
        let chunk = &data[start as usize..(start + len) as usize];
        let chunk_mac = cbc_mac(&cipher, chunk_iv, chunk);
        for (m, c) in mac.iter_mut().zip(chunk_mac.iter()) {
            *m ^= c;
        }
        let mut ga = GenericArray::from(mac);
        cipher.encrypt_block(&mut ga);
        mac.copy_from_slice(&ga);
    }
    mac
}

/// Condense a 16-byte file MAC into the 8-byte meta-MAC stored in node keys.
pub fn condense_mac(mac: &[u8; AES_BLOCK]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for i in 0..4 {
        out[i] = mac[i] ^ mac[i + 4];
        out[i + 4] = mac[i + 8] ^ mac[i + 12];
    }
    out
}

/// Split a 32-byte node key into its cipher key, CTR nonce, and meta-MAC.
pub fn split_node_key(full: &[u8; 32]) -> ([u8; 16], [u8; 8], [u8; 8]) {
    let mut key = [0u8; 16];
    for i in 0..16 {
        key[i] = full[i] ^ full[i + 16];
    }
    let mut nonce = [0u8; 8];
    nonce.copy_from_slice(&full[16..24]);
    let mut meta = [0u8; 8];
    meta.copy_from_slice(&full[24..32]);
    (key, nonce, meta)
}

/// Build the 32-byte node key from a fresh 24-byte upload key and the
/// computed meta-MAC. Inverse of `split_node_key`.
pub fn build_node_key(ul_key: &[u8; 24], meta_mac: &[u8; 8]) -> [u8; 32] {
    let mut full = [0u8; 32];
    for i in 0..8 {
        full[i] = ul_key[i] ^ ul_key[i + 16];
        full[i + 8] = ul_key[i + 8] ^ meta_mac[i];
    }
    full[16..24].copy_from_slice(&ul_key[16..24]);
    full[24..32].copy_from_slice(meta_mac);
    full
}

/// Legacy (v1 account) password-derived key: 65536 rounds of AES over a
/// fixed constant, keyed by successive 16-byte groups of the password.
pub fn prepare_key_v1(password: &[u8]) -> [u8; 16] {
    let mut pkey: [u8; 16] = [
        0x93, 0xC4, 0x67, 0xE3, 0x7D, 0xB0, 0xC7, 0xA4, 0xD1, 0xBE, 0x3F, 0x81, 0x01, 0x52, 0xCB,
        0x56,
    ];

    let mut padded = password.to_vec();
    while padded.len() % AES_BLOCK != 0 {
        padded.push(0);
    }
    if padded.is_empty() {
        padded.resize(AES_BLOCK, 0);
    }

    let keys: Vec<Aes128> = padded
        .chunks_exact(AES_BLOCK)
        .map(|chunk| Aes128::new(GenericArray::from_slice(chunk)))
        .collect();

    for _ in 0..0x10000 {
        for key in &keys {
            let mut ga = GenericArray::from(pkey);
            key.encrypt_block(&mut ga);
            pkey.copy_from_slice(&ga);
        }
    }
    pkey
}

/// Legacy (v1 account) login hash of the lowercased email under the
/// password key.
pub fn stringhash_v1(email: &[u8], pkey: &[u8; 16]) -> String {
    let mut padded = email.to_vec();
    while padded.len() % AES_BLOCK != 0 {
        padded.push(0);
    }

    let mut hash = [0u8; AES_BLOCK];
    for chunk in padded.chunks_exact(AES_BLOCK) {
        for (h, b) in hash.iter_mut().zip(chunk.iter()) {
            *h ^= b;
        }
    }

    let cipher = cipher(pkey);
    for _ in 0..0x4000 {
        let mut ga = GenericArray::from(hash);
        cipher.encrypt_block(&mut ga);
        hash.copy_from_slice(&ga);
    }

    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&hash[0..4]);
    out[4..].copy_from_slice(&hash[8..12]);
    b64url_encode(&out)
}

/// v2 account key derivation: PBKDF2-HMAC-SHA512, 100000 rounds. The first
/// half keys the master key, the second half is the login auth value.
pub fn derive_key_v2(password: &[u8], salt: &[u8]) -> ([u8; 16], [u8; 16]) {
    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<sha2::Sha512>(password, salt, 100_000, &mut derived);
    let mut key = [0u8; 16];
    let mut auth = [0u8; 16];
    key.copy_from_slice(&derived[..16]);
    auth.copy_from_slice(&derived[16..]);
    (key, auth)
}

/// Multi-precision integer in the provider's serialization: a 16-bit
/// big-endian bit count followed by the magnitude bytes.
pub fn parse_mpi(data: &[u8]) -> Result<(num_bigint::BigUint, &[u8]), StorageError> {
    if data.len() < 2 {
        return Err(StorageError::MalformedResponse(
            "truncated integer field".to_string(),
        ));
    }
    let bits = u16::from_be_bytes([data[0], data[1]]) as usize;
    let len = bits.div_ceil(8);
    if data.len() < 2 + len {
        return Err(StorageError::MalformedResponse(
            "truncated integer field".to_string(),
        ));
    }
    let value = num_bigint::BigUint::from_bytes_be(&data[2..2 + len]);
    Ok((value, &data[2 + len..]))
}

/// Encrypt the attribute block (`MEGA{"n":…}`, zero-padded) for a new node.
pub fn encode_attributes(key: &[u8; 16], name: &str) -> Vec<u8> {
    let mut data = format!("MEGA{}", serde_json::json!({ "n": name })).into_bytes();
    while data.len() % AES_BLOCK != 0 {
        data.push(0);
    }
    cbc_encrypt_zero_iv(key, &mut data);
    data
}

/// Decrypt and parse an attribute block.
pub fn decode_attributes(
    key: &[u8; 16],
    mut data: Vec<u8>,
) -> Result<serde_json::Value, StorageError> {
    if data.is_empty() || data.len() % AES_BLOCK != 0 {
        return Err(StorageError::MalformedResponse(
            "attribute block has bad length".to_string(),
        ));
    }
    cbc_decrypt_zero_iv(key, &mut data);
    if !data.starts_with(b"MEGA") {
        return Err(StorageError::MalformedResponse(
            "attribute block missing magic".to_string(),
        ));
    }
    let end = data
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(data.len());
    serde_json::from_slice(&data[4..end])
        .map_err(|e| StorageError::MalformedResponse(format!("bad attribute JSON: {e}")))
}
