//! Authenticated key update (§4.E): the M1..M5 `LOAD_KEY` protocol.

use zeroize::Zeroizing;

use crate::codec::{decode_m1, decode_m2_header, encode_confirmation_word};
use crate::constants::{C_ENC, C_MAC};
use crate::context::SheContext;
use crate::error::SheError;
use crate::kdf::aes_mp16_2;
use crate::keystore::{ClientId, KeyFlags, KeyId, KeyRecord, Keystore, SlotId};
use crate::primitives::{aes128_cbc_decrypt, aes128_ecb_encrypt, cmac_generate, cmac_verify2};

/// `LOAD_KEY`: verifies the M1..M3 request, installs the new key into the
/// slot named by M1's `ID`, and returns the `M4`/`M5` confirmation.
///
/// Policy-check ordering matches §4.E step 4 exactly; §8 property tests
/// depend on it.
pub fn load_key(
    ctx: &mut SheContext,
    ks: &mut impl Keystore,
    client: ClientId,
    m1: &[u8; 16],
    m2: &[u8; 32],
    m3: &[u8; 16],
) -> Result<([u8; 32], [u8; 16]), SheError> {
    let fields = decode_m1(m1);

    // Step 1: resolve the authenticating key.
    let auth_record = ks
        .read_key(client, SlotId::Key(KeyId(fields.auth_id)))?
        .ok_or(SheError::KeyNotAvailable)?;
    let k_auth = Zeroizing::new(auth_record.key);

    // Step 2: verify M3 = CMAC_K2(M1 || M2).
    let k2 = Zeroizing::new(aes_mp16_2(&k_auth, &C_MAC)?);
    if !cmac_verify2(&k2, m1, m2, m3)? {
        return Err(SheError::KeyUpdateError);
    }

    // Step 3: decrypt M2 under K1 to recover counter/flags/key.
    let k1 = Zeroizing::new(aes_mp16_2(&k_auth, &C_ENC)?);
    let mut m2_prime = Zeroizing::new(*m2);
    aes128_cbc_decrypt(&k1, &[0u8; 16], &mut m2_prime[..])?;
    let mut m2_body = [0u8; 32];
    m2_body.copy_from_slice(&m2_prime[..]);
    let header = decode_m2_header(&m2_body);
    let new_key = Zeroizing::new({
        let mut k = [0u8; 16];
        k.copy_from_slice(&m2_body[16..]);
        k
    });

    // Step 4: policy checks against the existing record, in spec order.
    let target_slot = SlotId::Key(KeyId(fields.id));
    let existing = ks.read_key(client, target_slot)?;

    if let Some(existing) = existing {
        if existing.flags.write_protected() {
            return Err(SheError::WriteProtected);
        }
        if header.counter <= existing.count {
            return Err(SheError::KeyUpdateError);
        }
        if fields.uid == [0u8; 15] {
            if !existing.flags.wildcard() {
                return Err(SheError::KeyUpdateError);
            }
        } else if fields.uid != ctx.uid {
            return Err(SheError::KeyUpdateError);
        }
    } else if fields.uid == [0u8; 15] {
        // No stored flags to consult: a wildcard UID cannot be honored
        // against a slot that has never been provisioned.
        return Err(SheError::KeyUpdateError);
    } else if fields.uid != ctx.uid {
        return Err(SheError::KeyUpdateError);
    }
    // Absent slot: counter replay check does not apply (§4.E step 4).

    // Step 5: write the new record.
    let new_record = KeyRecord::new(KeyFlags(header.flags), header.counter, *new_key);
    if fields.id == KeyId::RAM_KEY.0 {
        ks.cache_key(client, target_slot, new_record)
            .map_err(|_| SheError::KeyUpdateError)?;
        ctx.ram_key_plain = true;
    } else {
        ks.add_object(client, target_slot, new_record)
            .map_err(|_| SheError::KeyUpdateError)?;
        let confirm = ks
            .read_key(client, target_slot)
            .map_err(|_| SheError::KeyUpdateError)?
            .ok_or(SheError::KeyUpdateError)?;
        if confirm != new_record {
            return Err(SheError::KeyUpdateError);
        }
    }

    // Step 6: confirmation M4/M5 under the *new* key.
    let k3 = Zeroizing::new(aes_mp16_2(&new_key, &C_ENC)?);
    let k4 = Zeroizing::new(aes_mp16_2(&new_key, &C_MAC)?);

    let mut m4 = [0u8; 32];
    m4[..16].copy_from_slice(m1);
    let mut word = encode_confirmation_word(header.counter);
    aes128_ecb_encrypt(&k3, &mut word)?;
    m4[16..].copy_from_slice(&word);

    let m5 = cmac_generate(&k4, &m4)?;

    Ok((m4, m5))
}

/// `LOAD_PLAIN_KEY`: installs `key` directly into the volatile `RAM_KEY`
/// slot with no authentication, no counter, and no flags. SHE's
/// unauthenticated fast-path, usable only to seed `RAM_KEY` for a
/// subsequent `EXPORT_RAM_KEY` (§8 property 6).
pub fn load_plain_key(
    ctx: &mut SheContext,
    ks: &mut impl Keystore,
    client: ClientId,
    key: &[u8; 16],
) -> Result<(), SheError> {
    ks.cache_key(
        client,
        SlotId::Key(KeyId::RAM_KEY),
        KeyRecord::new(KeyFlags(0), 0, *key),
    )
    .map_err(|_| SheError::KeyUpdateError)?;
    ctx.ram_key_plain = true;
    Ok(())
}
