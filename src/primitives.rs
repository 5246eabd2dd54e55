//! Thin wrappers over the black-box AES/CMAC primitive library (§1, §4.A).
//!
//! Every primitive handle here is constructed on entry to the function that
//! needs it and dropped before that function returns — with the `zeroize`
//! cargo feature enabled on `aes`/`cbc`/`cmac`, dropping wipes the key
//! schedule. Nothing in this module holds a primitive handle across calls;
//! the one legitimate exception (secure boot's streaming CMAC) lives in
//! [`crate::context::SheContext`] itself, not here.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit};
use aes::Aes128;
use cipher::block_padding::NoPadding;
use cipher::{BlockDecryptMut, BlockEncryptMut};
use cmac::{Cmac, Mac};

use crate::error::PrimitiveError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Single AES-128 block encryption (the raw permutation, no mode of
/// operation). Used only by the MP16 compression function.
pub fn aes128_encrypt_block(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);
    buf.into()
}

/// AES-128-ECB in place, one block at a time, over an exact multiple of 16
/// bytes. Used by the key-update confirmation step (§4.E) which always
/// operates on exactly one block.
pub fn aes128_ecb_encrypt(key: &[u8; 16], buffer: &mut [u8]) -> Result<(), PrimitiveError> {
    if buffer.len() % 16 != 0 {
        return Err(PrimitiveError);
    }
    let cipher = Aes128::new(GenericArray::from_slice(key));
    for block in buffer.chunks_exact_mut(16) {
        let b = GenericArray::from_mut_slice(block);
        cipher.encrypt_block(b);
    }
    Ok(())
}

/// AES-128-ECB decrypt in place, block by block.
pub fn aes128_ecb_decrypt(key: &[u8; 16], buffer: &mut [u8]) -> Result<(), PrimitiveError> {
    if buffer.len() % 16 != 0 {
        return Err(PrimitiveError);
    }
    let cipher = Aes128::new(GenericArray::from_slice(key));
    for block in buffer.chunks_exact_mut(16) {
        let b = GenericArray::from_mut_slice(block);
        cipher.decrypt_block(b);
    }
    Ok(())
}

/// AES-128-CBC encrypt in place. `buffer.len()` must be a nonzero multiple
/// of 16.
pub fn aes128_cbc_encrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    buffer: &mut [u8],
) -> Result<(), PrimitiveError> {
    if buffer.is_empty() || buffer.len() % 16 != 0 {
        return Err(PrimitiveError);
    }
    let enc = Aes128CbcEnc::new(GenericArray::from_slice(key), GenericArray::from_slice(iv));
    let len = buffer.len();
    enc.encrypt_padded_mut::<NoPadding>(buffer, len)
        .map_err(|_| PrimitiveError)?;
    Ok(())
}

/// AES-128-CBC decrypt in place. `buffer.len()` must be a nonzero multiple
/// of 16.
pub fn aes128_cbc_decrypt(
    key: &[u8; 16],
    iv: &[u8; 16],
    buffer: &mut [u8],
) -> Result<(), PrimitiveError> {
    if buffer.is_empty() || buffer.len() % 16 != 0 {
        return Err(PrimitiveError);
    }
    let dec = Aes128CbcDec::new(GenericArray::from_slice(key), GenericArray::from_slice(iv));
    dec.decrypt_padded_mut::<NoPadding>(buffer)
        .map_err(|_| PrimitiveError)?;
    Ok(())
}

/// One-shot CMAC generation over a single message.
pub fn cmac_generate(key: &[u8; 16], message: &[u8]) -> Result<[u8; 16], PrimitiveError> {
    let mut mac = Cmac::<Aes128>::new_from_slice(key).map_err(|_| PrimitiveError)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// One-shot CMAC generation over two concatenated messages, avoiding an
/// allocation to actually concatenate them (used for `CMAC_K(M1 || M2)`).
pub fn cmac_generate2(
    key: &[u8; 16],
    message_a: &[u8],
    message_b: &[u8],
) -> Result<[u8; 16], PrimitiveError> {
    let mut mac = Cmac::<Aes128>::new_from_slice(key).map_err(|_| PrimitiveError)?;
    mac.update(message_a);
    mac.update(message_b);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time verification of a CMAC tag over two concatenated messages.
pub fn cmac_verify2(
    key: &[u8; 16],
    message_a: &[u8],
    message_b: &[u8],
    expected: &[u8; 16],
) -> Result<bool, PrimitiveError> {
    let mut mac = Cmac::<Aes128>::new_from_slice(key).map_err(|_| PrimitiveError)?;
    mac.update(message_a);
    mac.update(message_b);
    Ok(mac.verify_slice(expected).is_ok())
}

/// Start a streaming CMAC computation (secure boot's multi-call digest).
pub fn cmac_stream_new(key: &[u8; 16]) -> Result<Cmac<Aes128>, PrimitiveError> {
    Cmac::<Aes128>::new_from_slice(key).map_err(|_| PrimitiveError)
}
