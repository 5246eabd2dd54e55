//! AES bulk operations (§4.H): `ENC_ECB`, `ENC_CBC`, `DEC_ECB`, `DEC_CBC`,
//! `GEN_MAC`, `VERIFY_MAC`, each keyed by `keyId` in the client's namespace.

use crate::error::SheError;
use crate::keystore::{ClientId, KeyId, Keystore, SlotId};
use crate::primitives::{
    aes128_cbc_decrypt, aes128_cbc_encrypt, aes128_ecb_decrypt, aes128_ecb_encrypt, cmac_generate,
};

/// Truncates `buffer`'s usable length down to a whole multiple of 16 (§4.H:
/// "truncates payload length to a multiple of 16 bytes"), returning the
/// truncated length.
fn truncated_len(buffer: &[u8]) -> usize {
    buffer.len() - (buffer.len() % 16)
}

fn load_key(ks: &impl Keystore, client: ClientId, key_id: KeyId) -> Result<[u8; 16], SheError> {
    ks.read_key(client, SlotId::Key(key_id))?
        .ok_or(SheError::KeyNotAvailable)
        .map(|rec| rec.key)
}

/// `ENC_ECB`. Encrypts `buffer[..len]` in place under `key_id`, where `len`
/// is `buffer`'s length truncated to a multiple of 16. Returns the
/// truncated length actually processed.
pub fn enc_ecb(ks: &impl Keystore, client: ClientId, key_id: KeyId, buffer: &mut [u8]) -> Result<usize, SheError> {
    let key = load_key(ks, client, key_id)?;
    let len = truncated_len(buffer);
    aes128_ecb_encrypt(&key, &mut buffer[..len])?;
    Ok(len)
}

/// `DEC_ECB`.
pub fn dec_ecb(ks: &impl Keystore, client: ClientId, key_id: KeyId, buffer: &mut [u8]) -> Result<usize, SheError> {
    let key = load_key(ks, client, key_id)?;
    let len = truncated_len(buffer);
    aes128_ecb_decrypt(&key, &mut buffer[..len])?;
    Ok(len)
}

/// `ENC_CBC`. The IV is supplied by the caller, not derived (§4.H).
pub fn enc_cbc(
    ks: &impl Keystore,
    client: ClientId,
    key_id: KeyId,
    iv: &[u8; 16],
    buffer: &mut [u8],
) -> Result<usize, SheError> {
    let key = load_key(ks, client, key_id)?;
    let len = truncated_len(buffer);
    aes128_cbc_encrypt(&key, iv, &mut buffer[..len])?;
    Ok(len)
}

/// `DEC_CBC`.
pub fn dec_cbc(
    ks: &impl Keystore,
    client: ClientId,
    key_id: KeyId,
    iv: &[u8; 16],
    buffer: &mut [u8],
) -> Result<usize, SheError> {
    let key = load_key(ks, client, key_id)?;
    let len = truncated_len(buffer);
    aes128_cbc_decrypt(&key, iv, &mut buffer[..len])?;
    Ok(len)
}

/// `GEN_MAC`. Returns a 16-byte CMAC over the full, untruncated message.
pub fn gen_mac(ks: &impl Keystore, client: ClientId, key_id: KeyId, message: &[u8]) -> Result<[u8; 16], SheError> {
    let key = load_key(ks, client, key_id)?;
    Ok(cmac_generate(&key, message)?)
}

/// `VERIFY_MAC`. Returns `true` if the tag is valid. A `false` result is a
/// normal transport-level success (§4.H: "transport-level success in
/// either case"), not an `Err`.
pub fn verify_mac(
    ks: &impl Keystore,
    client: ClientId,
    key_id: KeyId,
    message: &[u8],
    tag: &[u8; 16],
) -> Result<bool, SheError> {
    let key = load_key(ks, client, key_id)?;
    let computed = cmac_generate(&key, message)?;

    let mut diff = 0u8;
    for i in 0..16 {
        diff |= computed[i] ^ tag[i];
    }
    Ok(diff == 0)
}
