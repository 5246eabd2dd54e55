//! `EXPORT_RAM_KEY` (§4.F): hands the plaintext `RAM_KEY` back out to a
//! client under the same M1..M5 envelope `LOAD_KEY` uses, authenticated
//! under `SECRET_KEY_ID` rather than the key's own authority.

use zeroize::Zeroizing;

use crate::codec::{encode_confirmation_word, encode_m1};
use crate::constants::{C_ENC, C_MAC};
use crate::context::SheContext;
use crate::error::SheError;
use crate::kdf::aes_mp16_2;
use crate::keystore::{ClientId, KeyId, Keystore, SlotId};
use crate::primitives::{aes128_cbc_encrypt, aes128_ecb_encrypt, cmac_generate, cmac_generate2};

/// Exports the current plaintext `RAM_KEY` as `M1..M5`, authenticated under
/// `SECRET_KEY_ID` (§4.F). Fails with `KeyInvalid` unless a key was loaded
/// into `RAM_KEY` via plaintext `LOAD_PLAIN_KEY` in this session
/// (`ctx.ram_key_plain`) — a key installed by the authenticated `LOAD_KEY`
/// protocol is not re-exportable this way.
///
/// M4's UID prefix is derived fresh from `ctx.uid`, never from request
/// buffer reuse (§9 re-architecture note): this function takes no request
/// buffer at all, only the context and keystore.
pub fn export_ram_key(
    ctx: &SheContext,
    ks: &impl Keystore,
    client: ClientId,
) -> Result<([u8; 16], [u8; 32], [u8; 16], [u8; 32], [u8; 16]), SheError> {
    if !ctx.ram_key_plain {
        return Err(SheError::KeyInvalid);
    }

    let ram = ks
        .read_key(client, SlotId::Key(KeyId::RAM_KEY))?
        .ok_or(SheError::KeyEmpty)?;

    let secret = ks
        .read_key(client, SlotId::Key(KeyId::SECRET_KEY))?
        .ok_or(SheError::KeyNotAvailable)?;
    let k_auth = Zeroizing::new(secret.key);

    let m1 = encode_m1(&ctx.uid, KeyId::RAM_KEY.0, KeyId::SECRET_KEY.0);

    let k1 = Zeroizing::new(aes_mp16_2(&k_auth, &C_ENC)?);
    let k2 = Zeroizing::new(aes_mp16_2(&k_auth, &C_MAC)?);

    // §4.F fixes the envelope's counter/flags to the literal `1`/`0` rather
    // than the RAM slot's own stored count/flags — the export is always
    // re-importable exactly once against a fresh slot, independent of how
    // many times the RAM key has been reloaded this session.
    let mut m2 = crate::codec::encode_m2_body(1, 0, &ram.key);
    aes128_cbc_encrypt(&k1, &[0u8; 16], &mut m2)?;
    let m3 = cmac_generate2(&k2, &m1, &m2)?;

    let k3 = Zeroizing::new(aes_mp16_2(&ram.key, &C_ENC)?);
    let k4 = Zeroizing::new(aes_mp16_2(&ram.key, &C_MAC)?);

    let mut m4 = [0u8; 32];
    m4[..16].copy_from_slice(&m1);
    let mut word = encode_confirmation_word(1);
    aes128_ecb_encrypt(&k3, &mut word)?;
    m4[16..].copy_from_slice(&word);

    let m5 = cmac_generate(&k4, &m4)?;

    Ok((m1, m2, m3, m4, m5))
}
