//! The command dispatcher (§4.I): gates every opcode on session state, then
//! routes to the component that implements it. `handle` is this crate's
//! one public wire entry point — `buffer` is a packed request/response
//! region (response overwrites request in place) and `size` is read as the
//! request length on entry and written as the response length on return
//! (§6).
//!
//! Every response carries a fixed two-byte `rc` header (§4.I, §6: "the
//! return code is written to a fixed header byte within the buffer") —
//! the big-endian `SheError` bit value on failure, `0` on success — at
//! `buffer[0..2]`, with any handler payload shifted right to make room and
//! starting at `buffer[2..]`. `*size` on return covers the header plus the
//! payload.

use crate::aes_ops;
use crate::config::Config;
use crate::constants::Opcode;
use crate::context::{BootState, SheContext};
use crate::error::SheError;
use crate::key_update;
use crate::keystore::{ClientId, KeyId, Keystore};
use crate::prng;
use crate::ram_export;
use crate::secure_boot;

fn require_len(buffer: &[u8], len: usize) -> Result<(), SheError> {
    if buffer.len() < len {
        Err(SheError::BadArgs)
    } else {
        Ok(())
    }
}

fn require_size(size: usize, at_least: usize) -> Result<(), SheError> {
    if size < at_least {
        Err(SheError::BadArgs)
    } else {
        Ok(())
    }
}

/// Gates `action` against `ctx`'s session state per §4.I's precondition
/// list, evaluated before any handler runs.
fn check_preconditions(ctx: &SheContext, action: Opcode) -> Result<(), SheError> {
    if action == Opcode::SetUid {
        return if ctx.uid_set {
            Err(SheError::SequenceError)
        } else {
            Ok(())
        };
    }
    if !ctx.uid_set {
        return Err(SheError::SequenceError);
    }
    let boot_exempt = matches!(
        action,
        Opcode::SecureBootInit
            | Opcode::SecureBootUpdate
            | Opcode::SecureBootFinish
            | Opcode::GetStatus
    );
    if ctx.sb_state != BootState::Success && !boot_exempt {
        return Err(SheError::SequenceError);
    }
    Ok(())
}

/// Width of the `rc` header every response carries (§4.I, §6).
const RC_LEN: usize = 2;

/// Dispatches `action` against `buffer[..*size]`, writing the response (if
/// any) back into `buffer` and updating `*size` to its length.
///
/// The response always begins with the two-byte `rc` header: `0` on
/// success, the failing `SheError`'s bit value (big-endian) otherwise.
/// Any payload a handler produced is shifted right by `RC_LEN` bytes to
/// make room for it. A handler's own writes into `buffer` are discarded
/// (the header-only response is all that is returned) whenever the
/// command fails, since a partially written payload is not meaningful
/// for a failed operation.
///
/// Any `Err` returned from a secure-boot handler other than the deliberate
/// `NO_SECURE_BOOT` skip resets `ctx`'s boot state machine to `INIT` (§4.I,
/// §7), so the client may retry `SECURE_BOOT_INIT` from scratch; this
/// happens even when the handler had already recorded a terminal
/// `BootState::Failure` for its own direct callers.
pub fn handle(
    ctx: &mut SheContext,
    ks: &mut impl Keystore,
    cfg: &Config,
    client: ClientId,
    action: Opcode,
    buffer: &mut [u8],
    size: &mut usize,
) -> Result<(), SheError> {
    let outcome = run(ctx, ks, cfg, client, action, buffer, size);

    let payload_len = if outcome.is_ok() { *size } else { 0 };
    if buffer.len() < RC_LEN + payload_len {
        return Err(SheError::BadArgs);
    }
    buffer.copy_within(0..payload_len, RC_LEN);

    let rc: u16 = match outcome {
        Ok(()) => 0,
        Err(err) => err.bits(),
    };
    buffer[..RC_LEN].copy_from_slice(&rc.to_be_bytes());
    *size = RC_LEN + payload_len;

    outcome
}

/// Runs the preconditions, the handler, and the secure-boot reset-on-failure
/// logic, leaving `buffer`/`*size` holding the handler's raw payload (not
/// yet shifted for the `rc` header — `handle` does that uniformly for every
/// outcome).
fn run(
    ctx: &mut SheContext,
    ks: &mut impl Keystore,
    cfg: &Config,
    client: ClientId,
    action: Opcode,
    buffer: &mut [u8],
    size: &mut usize,
) -> Result<(), SheError> {
    check_preconditions(ctx, action)?;

    let is_boot_command = matches!(
        action,
        Opcode::SecureBootInit | Opcode::SecureBootUpdate | Opcode::SecureBootFinish
    );

    let result = dispatch_inner(ctx, ks, cfg, client, action, buffer, size);

    if is_boot_command {
        match result {
            // The deliberate `NO_SECURE_BOOT` skip (§4.D: "This is a skip,
            // not a failure") reports a non-zero code but must not undo the
            // state transition `secure_boot::init` already committed.
            Err(SheError::NoSecureBoot) => return result,
            Err(err) => {
                ctx.reset_boot_state();
                return Err(err);
            }
            Ok(()) => {}
        }
    }

    result
}

fn dispatch_inner(
    ctx: &mut SheContext,
    ks: &mut impl Keystore,
    cfg: &Config,
    client: ClientId,
    action: Opcode,
    buffer: &mut [u8],
    size: &mut usize,
) -> Result<(), SheError> {
    require_len(buffer, *size)?;

    match action {
        Opcode::SetUid => {
            require_len(buffer, 15)?;
            let mut uid = [0u8; 15];
            uid.copy_from_slice(&buffer[..15]);
            ctx.uid = uid;
            ctx.uid_set = true;
            *size = 0;
            Ok(())
        }

        Opcode::SecureBootInit => {
            require_len(buffer, 4)?;
            let req_size = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]);
            let advanced = secure_boot::init(ctx, ks, cfg, client, req_size)?;
            *size = 0;
            if advanced {
                Ok(())
            } else {
                Err(SheError::NoSecureBoot)
            }
        }

        Opcode::SecureBootUpdate => {
            secure_boot::update(ctx, &buffer[..*size])?;
            *size = 0;
            Ok(())
        }

        Opcode::SecureBootFinish => {
            secure_boot::finish(ctx, ks, client)?;
            *size = 0;
            Ok(())
        }

        Opcode::GetStatus => {
            let sreg = secure_boot::get_status(ctx);
            require_len(buffer, 2)?;
            buffer[..2].copy_from_slice(&sreg.to_be_bytes());
            *size = 2;
            Ok(())
        }

        Opcode::LoadKey => {
            require_len(buffer, 64)?;
            let mut m1 = [0u8; 16];
            let mut m2 = [0u8; 32];
            let mut m3 = [0u8; 16];
            m1.copy_from_slice(&buffer[0..16]);
            m2.copy_from_slice(&buffer[16..48]);
            m3.copy_from_slice(&buffer[48..64]);

            let (m4, m5) = key_update::load_key(ctx, ks, client, &m1, &m2, &m3)?;
            buffer[0..32].copy_from_slice(&m4);
            buffer[32..48].copy_from_slice(&m5);
            *size = 48;
            Ok(())
        }

        Opcode::LoadPlainKey => {
            require_len(buffer, 16)?;
            let mut key = [0u8; 16];
            key.copy_from_slice(&buffer[..16]);
            key_update::load_plain_key(ctx, ks, client, &key)?;
            *size = 0;
            Ok(())
        }

        Opcode::ExportRamKey => {
            let (m1, m2, m3, m4, m5) = ram_export::export_ram_key(ctx, ks, client)?;
            require_len(buffer, 112)?;
            buffer[0..16].copy_from_slice(&m1);
            buffer[16..48].copy_from_slice(&m2);
            buffer[48..64].copy_from_slice(&m3);
            buffer[64..96].copy_from_slice(&m4);
            buffer[96..112].copy_from_slice(&m5);
            *size = 112;
            Ok(())
        }

        Opcode::InitRnd => {
            prng::init_rnd(ctx, ks, client)?;
            *size = 0;
            Ok(())
        }

        Opcode::Rnd => {
            let out = prng::rnd(ctx)?;
            require_len(buffer, 16)?;
            buffer[..16].copy_from_slice(&out);
            *size = 16;
            Ok(())
        }

        Opcode::ExtendSeed => {
            require_len(buffer, 16)?;
            let mut entropy = [0u8; 16];
            entropy.copy_from_slice(&buffer[..16]);
            prng::extend_seed(ctx, ks, client, &entropy)?;
            *size = 0;
            Ok(())
        }

        Opcode::EncEcb | Opcode::DecEcb => {
            require_len(buffer, 1)?;
            require_size(*size, 1)?;
            let key_id = KeyId(buffer[0]);
            let payload = &mut buffer[1..*size];
            let len = if action == Opcode::EncEcb {
                aes_ops::enc_ecb(ks, client, key_id, payload)?
            } else {
                aes_ops::dec_ecb(ks, client, key_id, payload)?
            };
            buffer.copy_within(1..1 + len, 0);
            *size = len;
            Ok(())
        }

        Opcode::EncCbc | Opcode::DecCbc => {
            require_len(buffer, 17)?;
            require_size(*size, 17)?;
            let key_id = KeyId(buffer[0]);
            let mut iv = [0u8; 16];
            iv.copy_from_slice(&buffer[1..17]);
            let payload = &mut buffer[17..*size];
            let len = if action == Opcode::EncCbc {
                aes_ops::enc_cbc(ks, client, key_id, &iv, payload)?
            } else {
                aes_ops::dec_cbc(ks, client, key_id, &iv, payload)?
            };
            buffer.copy_within(17..17 + len, 0);
            *size = len;
            Ok(())
        }

        Opcode::GenMac => {
            require_len(buffer, 1)?;
            require_size(*size, 1)?;
            let key_id = KeyId(buffer[0]);
            let tag = aes_ops::gen_mac(ks, client, key_id, &buffer[1..*size])?;
            require_len(buffer, 16)?;
            buffer[..16].copy_from_slice(&tag);
            *size = 16;
            Ok(())
        }

        Opcode::VerifyMac => {
            require_len(buffer, 17)?;
            require_size(*size, 17)?;
            let key_id = KeyId(buffer[0]);
            let mut tag = [0u8; 16];
            tag.copy_from_slice(&buffer[1..17]);
            let valid = aes_ops::verify_mac(ks, client, key_id, &buffer[17..*size], &tag)?;
            buffer[0] = if valid { 0 } else { 1 };
            *size = 1;
            Ok(())
        }
    }
}
