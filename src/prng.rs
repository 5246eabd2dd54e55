//! Deterministic per-context PRNG (§4.G): `INIT_RND`, `RND`, `EXTEND_SEED`.

use crate::context::SheContext;
use crate::constants::{C_PRNG_KEY, C_PRNG_SEED};
use crate::error::SheError;
use crate::kdf::aes_mp16;
use crate::keystore::{ClientId, KeyId, Keystore, SlotId};
use crate::primitives::aes128_cbc_encrypt;

/// `INIT_RND`. One-shot: requires `ctx.rnd_inited == false`.
///
/// Ratchets the persisted `PRNG_SEED_ID` forward (§4.G step 4-5) before
/// deriving the session's working state, so a subsequent `INIT_RND` in a
/// later session never reuses the same seed.
pub fn init_rnd(ctx: &mut SheContext, ks: &mut impl Keystore, client: ClientId) -> Result<(), SheError> {
    if ctx.rnd_inited {
        return Err(SheError::SequenceError);
    }

    let secret = ks
        .read_key(client, SlotId::Key(KeyId::SECRET_KEY))?
        .ok_or(SheError::KeyNotAvailable)?;

    let k_seed = aes_mp16(&concat(&secret.key, &C_PRNG_SEED))?;

    let seed_prev = ks
        .read_key(client, SlotId::PrngSeed)?
        .ok_or(SheError::KeyNotAvailable)?;

    let mut seed_new = seed_prev.key;
    aes128_cbc_encrypt(&k_seed, &[0u8; 16], &mut seed_new)?;

    ks.add_object(
        client,
        SlotId::PrngSeed,
        crate::keystore::KeyRecord::new(seed_prev.flags, seed_prev.count, seed_new),
    )
    .map_err(|_| SheError::KeyUpdateError)?;

    ctx.prng_state = seed_new;
    ctx.prng_key = aes_mp16(&concat(&secret.key, &C_PRNG_KEY))?;
    ctx.rnd_inited = true;

    Ok(())
}

/// `RND`. Requires `ctx.rnd_inited`. Advances and returns `prng_state`.
pub fn rnd(ctx: &mut SheContext) -> Result<[u8; 16], SheError> {
    if !ctx.rnd_inited {
        return Err(SheError::SequenceError);
    }
    aes128_cbc_encrypt(&ctx.prng_key, &[0u8; 16], &mut ctx.prng_state)?;
    Ok(ctx.prng_state)
}

/// `EXTEND_SEED(entropy)`. Requires `ctx.rnd_inited`.
pub fn extend_seed(
    ctx: &mut SheContext,
    ks: &mut impl Keystore,
    client: ClientId,
    entropy: &[u8; 16],
) -> Result<(), SheError> {
    if !ctx.rnd_inited {
        return Err(SheError::SequenceError);
    }

    ctx.prng_state = aes_mp16(&concat(&ctx.prng_state, entropy))?;

    let persisted = ks
        .read_key(client, SlotId::PrngSeed)?
        .ok_or(SheError::KeyNotAvailable)?;
    let new_seed = aes_mp16(&concat(&persisted.key, entropy))?;
    ks.add_object(
        client,
        SlotId::PrngSeed,
        crate::keystore::KeyRecord::new(persisted.flags, persisted.count, new_seed),
    )
    .map_err(|_| SheError::KeyUpdateError)?;

    Ok(())
}

fn concat(a: &[u8; 16], b: &[u8; 16]) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[..16].copy_from_slice(a);
    buf[16..].copy_from_slice(b);
    buf
}
