//! Secure-boot engine (§4.D): three-phase CMAC verification of a
//! bootloader image against a stored reference MAC.

use cmac::Mac;

use crate::config::Config;
use crate::constants::sreg;
use crate::context::{BootState, SheContext};
use crate::error::SheError;
use crate::keystore::{ClientId, KeyId, Keystore, SlotId};
use crate::primitives::cmac_stream_new;

/// `SECURE_BOOT_INIT`.
///
/// Returns `Ok(false)` for the deliberate `NO_SECURE_BOOT` skip (no
/// `BOOT_MAC_KEY_ID` configured) and `Ok(true)` for a normal transition
/// into `UPDATE`. The dispatcher must not treat the `Ok(false)` case as a
/// failure requiring a boot-state reset (§4.D: "This is a skip, not a
/// failure").
pub fn init(
    ctx: &mut SheContext,
    ks: &impl Keystore,
    cfg: &Config,
    client: ClientId,
    size: u32,
) -> Result<bool, SheError> {
    if ctx.sb_state != BootState::Init {
        return Err(SheError::SequenceError);
    }

    let boot_key = ks.read_key(client, SlotId::Key(KeyId::BOOT_MAC_KEY))?;

    let Some(boot_key) = boot_key else {
        ctx.cmac_key_found = false;
        ctx.sb_state = if cfg.no_secure_boot_is_success {
            BootState::Success
        } else {
            BootState::Failure
        };
        return Ok(false);
    };

    let mut cmac = cmac_stream_new(&boot_key.key)?;
    cmac.update(&[0u8; 12]);
    let len_bytes = if cfg.boot_length_big_endian {
        size.to_be_bytes()
    } else {
        size.to_ne_bytes()
    };
    cmac.update(&len_bytes);

    ctx.cmac_ctx = Some(cmac);
    ctx.cmac_key_found = true;
    ctx.bl_size = size;
    ctx.bl_received = 0;
    ctx.sb_state = BootState::Update;

    Ok(true)
}

/// `SECURE_BOOT_UPDATE`.
pub fn update(ctx: &mut SheContext, chunk: &[u8]) -> Result<(), SheError> {
    if ctx.sb_state != BootState::Update {
        return Err(SheError::SequenceError);
    }

    let received = ctx.bl_received as usize + chunk.len();
    if received > ctx.bl_size as usize {
        return Err(SheError::SequenceError);
    }

    ctx.cmac_ctx
        .as_mut()
        .ok_or(SheError::SequenceError)?
        .update(chunk);
    ctx.bl_received = received as u32;

    if ctx.bl_received == ctx.bl_size {
        ctx.sb_state = BootState::Finish;
    }

    Ok(())
}

/// `SECURE_BOOT_FINISH`.
pub fn finish(ctx: &mut SheContext, ks: &impl Keystore, client: ClientId) -> Result<(), SheError> {
    if ctx.sb_state != BootState::Finish {
        return Err(SheError::SequenceError);
    }

    let cmac = ctx.cmac_ctx.take().ok_or(SheError::SequenceError)?;
    let digest: [u8; 16] = cmac.finalize().into_bytes().into();

    let expected = ks
        .read_key(client, SlotId::Key(KeyId::BOOT_MAC))?
        .ok_or(SheError::KeyNotAvailable)?;

    // Constant-time compare (§4.D, §8 property): XOR-accumulate rather
    // than short-circuit on first mismatch.
    let mut diff = 0u8;
    for i in 0..16 {
        diff |= digest[i] ^ expected.key[i];
    }

    if diff == 0 {
        ctx.sb_state = BootState::Success;
        Ok(())
    } else {
        ctx.sb_state = BootState::Failure;
        Err(SheError::GeneralError)
    }
}

/// `GET_STATUS`: always succeeds, returns the SREG bitfield (§4.D).
pub fn get_status(ctx: &SheContext) -> u16 {
    let mut reg = 0u16;
    if ctx.cmac_key_found {
        reg |= sreg::SECURE_BOOT;
    }
    if matches!(ctx.sb_state, BootState::Success | BootState::Failure) {
        reg |= sreg::BOOT_FINISHED;
    }
    if ctx.sb_state == BootState::Success {
        reg |= sreg::BOOT_OK;
    }
    if ctx.rnd_inited {
        reg |= sreg::RND_INIT;
    }
    reg
}
