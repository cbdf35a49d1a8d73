//! Cryptographic operations for MDict file decryption.
//!
//! This module implements the schemes used by MDict v1/v2 containers:
//! - RIPEMD-128 digests for key derivation
//! - Master key derivation from a registration code and a user identifier
//! - Salsa20/8 stream cipher (key index header fields, registration codes)
//! - Fast XOR/rotation cipher (v2 key block info)

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};
use ripemd::{Digest, Ripemd128};

use crate::mdict::types::error::{MdictError, Result};
use crate::mdict::types::models::RegisterBy;

/// Constant appended to the checksum bytes when deriving the key block info key.
const INDEX_KEY_TAIL: u32 = 0x3695;

/// RIPEMD-128 of `data`.
pub fn ripemd128(data: &[u8]) -> [u8; 16] {
    let mut hasher = Ripemd128::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Derives the master decryption key from a registration code and user id.
///
/// # Algorithm
/// 1. Hash the user id with RIPEMD-128 → 16-byte digest. E-mail ids are
///    hashed as UTF-16LE, device ids as their raw bytes.
/// 2. Use the digest as a Salsa20/8 key to decrypt the registration code
/// 3. The decrypted registration code is the master key
///
/// # Arguments
/// * `reg_code` - 16-byte encrypted registration code (hex-decoded)
/// * `user_id` - E-mail address or device id, per `register_by`
pub fn derive_master_key(
    reg_code: &[u8],
    user_id: &str,
    register_by: RegisterBy,
) -> Result<[u8; 16]> {
    debug!("Deriving master key from registration code ({:?})", register_by);

    if reg_code.len() != 16 {
        return Err(MdictError::InvalidCredential(format!(
            "Registration code must be exactly 16 bytes (32 hex chars), got {}",
            reg_code.len()
        )));
    }

    let salsa_key = match register_by {
        RegisterBy::Email => ripemd128(&utf16le_bytes(user_id)),
        RegisterBy::DeviceId => ripemd128(user_id.as_bytes()),
    };

    let mut master_key = [0u8; 16];
    master_key.copy_from_slice(reg_code);
    salsa_decrypt(&mut master_key, &salsa_key);
    Ok(master_key)
}

// encoding_rs only decodes UTF-16, it never encodes into it.
fn utf16le_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// Decrypts data using the fast XOR-based cipher (MDict v2 key block info).
///
/// # Algorithm
/// For each byte at position `i`:
/// 1. Rotate byte left by 4 bits
/// 2. XOR with: `previous_byte ^ i ^ key[i % key.len()]`
/// 3. Store original byte for next iteration
///
/// Initial `previous_byte` is `0x36`.
pub fn fast_decrypt(data: &mut [u8], key: &[u8]) {
    trace!("Decrypting {} bytes with fast XOR method", data.len());

    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let current = *byte;
        let rotated = current.rotate_left(4);
        *byte = rotated ^ prev ^ (i as u8) ^ key[i % key.len()];
        prev = current;
    }
}

/// Derives the decryption key for a v2 key block info section.
///
/// `Key = RIPEMD-128(checksum_bytes || 0x3695 as u32 LE)`, where the checksum
/// bytes are bytes 4..8 of the section's sub-header.
pub fn derive_key_for_index_info(subheader_checksum: &[u8]) -> [u8; 16] {
    trace!("Deriving key for key block info using checksum and magic constant");

    let mut hasher = Ripemd128::new();
    hasher.update(subheader_checksum);
    hasher.update(INDEX_KEY_TAIL.to_le_bytes());
    hasher.finalize().into()
}

/// Decrypts data in-place using the Salsa20/8 stream cipher.
///
/// Salsa20 with 8 rounds and a zero nonce, 128-bit keys only. Encryption and
/// decryption are the same operation.
///
/// # State Matrix
/// The 64-byte state is arranged as a 4×4 matrix of 32-bit little-endian words:
/// ```text
/// [c0, k0, k1, k2]
/// [k3, c1, iv0, iv1]
/// [ctr0, ctr1, c2, k4]
/// [k5, k6, k7, c3]
/// ```
/// For a 16-byte key, `k0..k3` and `k4..k7` are identical.
pub fn salsa_decrypt(data: &mut [u8], key16: &[u8; 16]) {
    trace!("Decrypting {} bytes with Salsa20/8 (128-bit key)", data.len());

    let mut state = [0u32; 16];

    // "expand 16-byte k"
    state[0] = 0x61707865;
    state[5] = 0x3120646e;
    state[10] = 0x79622d36;
    state[15] = 0x6b206574;
    for i in 0..4 {
        state[1 + i] = LittleEndian::read_u32(&key16[i * 4..]);
        state[11 + i] = LittleEndian::read_u32(&key16[i * 4..]);
    }
    state[6] = 0;
    state[7] = 0;
    let mut keystream_block = [0u8; 64];

    for (block_index, chunk) in data.chunks_mut(64).enumerate() {
        state[8] = block_index as u32;
        state[9] = (block_index as u64 >> 32) as u32;

        let mut x = state;
        for _ in 0..4 {
            // Column rounds
            quarter_round(&mut x, 0, 4, 8, 12);
            quarter_round(&mut x, 5, 9, 13, 1);
            quarter_round(&mut x, 10, 14, 2, 6);
            quarter_round(&mut x, 15, 3, 7, 11);
            // Row rounds
            quarter_round(&mut x, 0, 1, 2, 3);
            quarter_round(&mut x, 5, 6, 7, 4);
            quarter_round(&mut x, 10, 11, 8, 9);
            quarter_round(&mut x, 15, 12, 13, 14);
        }

        for (i, val) in x.iter_mut().enumerate() {
            *val = val.wrapping_add(state[i]);
        }
        for (i, word) in x.iter().enumerate() {
            LittleEndian::write_u32(&mut keystream_block[i * 4..], *word);
        }
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte ^= keystream_block[i];
        }
    }
}

#[inline(always)]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}
