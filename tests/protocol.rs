//! Integration tests exercising the full dispatcher for the concrete
//! scenarios in spec §8 (S1-S6) plus the cross-cutting invariants.

use she_core::config::Config;
use she_core::constants::{C_ENC, C_MAC, Opcode};
use she_core::context::{BootState, SheContext};
use she_core::error::SheError;
use she_core::kdf::aes_mp16_2;
use she_core::keystore::{KeyFlags, KeyId, KeyRecord, Keystore, MemoryKeystore, SlotId};
use she_core::primitives::{aes128_cbc_encrypt, cmac_generate2};

fn set_uid(ctx: &mut SheContext, ks: &mut MemoryKeystore, cfg: &Config, uid: [u8; 15]) {
    let mut buf = uid;
    let mut size = 15;
    she_core::handle(ctx, ks, cfg, 0, Opcode::SetUid, &mut buf, &mut size).unwrap();
}

fn build_load_key_request(
    uid: [u8; 15],
    id: u8,
    auth_id: u8,
    counter: u32,
    flags: u8,
    new_key: [u8; 16],
    k_auth: [u8; 16],
) -> [u8; 64] {
    let mut m1 = [0u8; 16];
    m1[..15].copy_from_slice(&uid);
    m1[15] = (id << 4) | auth_id;

    let k1 = aes_mp16_2(&k_auth, &C_ENC).unwrap();
    let k2 = aes_mp16_2(&k_auth, &C_MAC).unwrap();

    let mut m2 = she_core::codec::encode_m2_body(counter, flags, &new_key);
    aes128_cbc_encrypt(&k1, &[0u8; 16], &mut m2).unwrap();

    let m3 = cmac_generate2(&k2, &m1, &m2).unwrap();

    let mut request = [0u8; 64];
    request[0..16].copy_from_slice(&m1);
    request[16..48].copy_from_slice(&m2);
    request[48..64].copy_from_slice(&m3);
    request
}

// S1. UID latching: a second SET_UID fails and the latched UID is unchanged.
#[test]
fn s1_uid_latching() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();

    let uid = {
        let mut u = [0u8; 15];
        for (i, b) in u.iter_mut().enumerate() {
            *b = i as u8;
        }
        u
    };
    set_uid(&mut ctx, &mut ks, &cfg, uid);
    assert_eq!(ctx.uid, uid);

    let mut buf = [0xffu8; 15];
    let mut size = 15;
    let err = she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::SetUid, &mut buf, &mut size)
        .unwrap_err();
    assert_eq!(err, SheError::SequenceError);
    assert_eq!(ctx.uid, uid);
}

// Invariant 2: before SET_UID, every other command fails with SEQUENCE_ERROR.
#[test]
fn every_command_before_set_uid_is_sequence_error() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();

    for action in [
        Opcode::SecureBootInit,
        Opcode::GetStatus,
        Opcode::LoadKey,
        Opcode::LoadPlainKey,
        Opcode::ExportRamKey,
        Opcode::InitRnd,
        Opcode::Rnd,
        Opcode::ExtendSeed,
    ] {
        let mut buf = [0u8; 64];
        let mut size = 0;
        let err = she_core::handle(&mut ctx, &mut ks, &cfg, 0, action, &mut buf, &mut size)
            .unwrap_err();
        assert_eq!(err, SheError::SequenceError, "action {action:?}");
    }
}

// S2. Boot without a configured key: SECURE_BOOT_INIT returns NO_SECURE_BOOT,
// sb_state lands at SUCCESS (the skip is not a failure), and GET_STATUS
// reports BOOT_FINISHED without SECURE_BOOT or BOOT_OK.
#[test]
fn s2_boot_without_key_is_a_skip() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();
    set_uid(&mut ctx, &mut ks, &cfg, [0u8; 15]);

    let mut buf = 0u32.to_be_bytes();
    let mut size = 4;
    let err = she_core::handle(
        &mut ctx,
        &mut ks,
        &cfg,
        0,
        Opcode::SecureBootInit,
        &mut buf,
        &mut size,
    )
    .unwrap_err();
    assert_eq!(err, SheError::NoSecureBoot);
    assert_eq!(ctx.sb_state, BootState::Success);

    let mut buf = [0u8; 4];
    let mut size = 0;
    she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::GetStatus, &mut buf, &mut size).unwrap();
    let sreg = u16::from_be_bytes([buf[2], buf[3]]);
    assert_ne!(sreg & she_core::constants::sreg::BOOT_FINISHED, 0);
    assert_eq!(sreg & she_core::constants::sreg::BOOT_OK, 0);
    assert_eq!(sreg & she_core::constants::sreg::SECURE_BOOT, 0);
}

// S3. Boot success: install BOOT_MAC_KEY_ID and the matching BOOT_MAC,
// run INIT/UPDATE/FINISH, and expect SUCCESS with the full SREG set.
#[test]
fn s3_boot_success() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();
    set_uid(&mut ctx, &mut ks, &cfg, [0u8; 15]);

    let key = [0u8; 16];
    ks.add_object(
        0,
        SlotId::Key(KeyId::BOOT_MAC_KEY),
        KeyRecord::new(KeyFlags(0), 0, key),
    )
    .unwrap();

    let image = b"bootloaderimage!".repeat(4);
    let mut expected_input = Vec::new();
    expected_input.extend_from_slice(&[0u8; 12]);
    expected_input.extend_from_slice(&(image.len() as u32).to_ne_bytes());
    expected_input.extend_from_slice(&image);
    let expected_mac = she_core::primitives::cmac_generate(&key, &expected_input).unwrap();
    ks.add_object(
        0,
        SlotId::Key(KeyId::BOOT_MAC),
        KeyRecord::new(KeyFlags(0), 0, expected_mac),
    )
    .unwrap();

    let mut buf = (image.len() as u32).to_be_bytes();
    let mut size = 4;
    she_core::handle(
        &mut ctx,
        &mut ks,
        &cfg,
        0,
        Opcode::SecureBootInit,
        &mut buf,
        &mut size,
    )
    .unwrap();
    assert_eq!(ctx.sb_state, BootState::Update);

    let mut buf = image.clone();
    let mut size = image.len();
    she_core::handle(
        &mut ctx,
        &mut ks,
        &cfg,
        0,
        Opcode::SecureBootUpdate,
        &mut buf,
        &mut size,
    )
    .unwrap();
    assert_eq!(ctx.sb_state, BootState::Finish);

    let mut buf = [0u8; 2];
    let mut size = 0;
    she_core::handle(
        &mut ctx,
        &mut ks,
        &cfg,
        0,
        Opcode::SecureBootFinish,
        &mut buf,
        &mut size,
    )
    .unwrap();
    assert_eq!(ctx.sb_state, BootState::Success);

    let mut buf = [0u8; 4];
    let mut size = 0;
    she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::GetStatus, &mut buf, &mut size).unwrap();
    let sreg = u16::from_be_bytes([buf[2], buf[3]]);
    assert_ne!(sreg & she_core::constants::sreg::SECURE_BOOT, 0);
    assert_ne!(sreg & she_core::constants::sreg::BOOT_FINISHED, 0);
    assert_ne!(sreg & she_core::constants::sreg::BOOT_OK, 0);
}

fn boot_through_skip(ctx: &mut SheContext, ks: &mut MemoryKeystore, cfg: &Config) {
    let mut buf = 0u32.to_be_bytes();
    let mut size = 4;
    let err =
        she_core::handle(ctx, ks, cfg, 0, Opcode::SecureBootInit, &mut buf, &mut size).unwrap_err();
    assert_eq!(err, SheError::NoSecureBoot);
}

// S4. Key-update replay: a stale counter is rejected, a fresh counter
// succeeds, and resubmitting the same counter afterward is rejected too.
#[test]
fn s4_key_update_replay_protection() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();
    let uid = [7u8; 15];
    set_uid(&mut ctx, &mut ks, &cfg, uid);
    boot_through_skip(&mut ctx, &mut ks, &cfg);

    let k_auth = [0x11u8; 16];
    ks.add_object(
        0,
        SlotId::Key(KeyId(0x1)),
        KeyRecord::new(KeyFlags(0), 0, k_auth),
    )
    .unwrap();
    ks.add_object(
        0,
        SlotId::Key(KeyId(0x4)),
        KeyRecord::new(KeyFlags(0), 5, [0u8; 16]),
    )
    .unwrap();

    let mut request = build_load_key_request(uid, 0x4, 0x1, 5, 0, [0x01u8; 16], k_auth);
    let mut size = 64;
    let err = she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::LoadKey, &mut request, &mut size)
        .unwrap_err();
    assert_eq!(err, SheError::KeyUpdateError);

    let mut request = build_load_key_request(uid, 0x4, 0x1, 6, 0, [0x02u8; 16], k_auth);
    let mut size = 64;
    she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::LoadKey, &mut request, &mut size).unwrap();
    assert_eq!(size, 50);
    let stored = ks.read_key(0, SlotId::Key(KeyId(0x4))).unwrap().unwrap();
    assert_eq!(stored.count, 6);
    assert_eq!(stored.key, [0x02u8; 16]);

    let mut request = build_load_key_request(uid, 0x4, 0x1, 6, 0, [0x03u8; 16], k_auth);
    let mut size = 64;
    let err = she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::LoadKey, &mut request, &mut size)
        .unwrap_err();
    assert_eq!(err, SheError::KeyUpdateError);
    let unchanged = ks.read_key(0, SlotId::Key(KeyId(0x4))).unwrap().unwrap();
    assert_eq!(unchanged.count, 6);
    assert_eq!(unchanged.key, [0x02u8; 16]);
}

// S5. PRNG init plus two draws produce distinct, state-advancing outputs.
#[test]
fn s5_prng_init_then_two_draws() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();
    set_uid(&mut ctx, &mut ks, &cfg, [0u8; 15]);
    boot_through_skip(&mut ctx, &mut ks, &cfg);

    ks.add_object(
        0,
        SlotId::Key(KeyId::SECRET_KEY),
        KeyRecord::new(KeyFlags(0), 0, [0x21u8; 16]),
    )
    .unwrap();
    ks.add_object(
        0,
        SlotId::PrngSeed,
        KeyRecord::new(KeyFlags(0), 0, [0x43u8; 16]),
    )
    .unwrap();

    let mut buf = [0u8; 2];
    let mut size = 0;
    she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::InitRnd, &mut buf, &mut size).unwrap();
    assert!(ctx.rnd_inited);

    let mut buf1 = [0u8; 18];
    let mut size1 = 0;
    she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::Rnd, &mut buf1, &mut size1).unwrap();

    let mut buf2 = [0u8; 18];
    let mut size2 = 0;
    she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::Rnd, &mut buf2, &mut size2).unwrap();

    assert_ne!(&buf1[2..18], &buf2[2..18]);
    assert_ne!(&buf1[2..18], &[0u8; 16][..]);
    assert_ne!(&buf2[2..18], &[0u8; 16][..]);
}

// S6. Plain-load then export round-trip: LOAD_PLAIN_KEY followed by
// EXPORT_RAM_KEY produces M1..M5 that, fed back as LOAD_KEY in a fresh
// context against the same SECRET_KEY_ID, restores the same RAM slot bytes.
#[test]
fn s6_plain_load_then_export_round_trip() {
    let secret = [0x55u8; 16];
    let plain_key = [0x01u8; 16];
    let uid = [9u8; 15];

    // First session: load the key in plaintext, then export it.
    let mut ctx1 = SheContext::new();
    let mut ks1 = MemoryKeystore::default();
    let cfg = Config::default();
    set_uid(&mut ctx1, &mut ks1, &cfg, uid);
    boot_through_skip(&mut ctx1, &mut ks1, &cfg);
    ks1.add_object(
        0,
        SlotId::Key(KeyId::SECRET_KEY),
        KeyRecord::new(KeyFlags(0), 0, secret),
    )
    .unwrap();

    let mut buf = plain_key;
    let mut size = 16;
    she_core::handle(&mut ctx1, &mut ks1, &cfg, 0, Opcode::LoadPlainKey, &mut buf, &mut size)
        .unwrap();

    let mut export_buf = [0u8; 114];
    let mut export_size = 0;
    she_core::handle(
        &mut ctx1,
        &mut ks1,
        &cfg,
        0,
        Opcode::ExportRamKey,
        &mut export_buf,
        &mut export_size,
    )
    .unwrap();
    assert_eq!(export_size, 114);

    // Second, fresh session/context with the same SECRET_KEY_ID and UID:
    // feed the exported M1..M5 back in as a LOAD_KEY request.
    let mut ctx2 = SheContext::new();
    let mut ks2 = MemoryKeystore::default();
    set_uid(&mut ctx2, &mut ks2, &cfg, uid);
    boot_through_skip(&mut ctx2, &mut ks2, &cfg);
    ks2.add_object(
        0,
        SlotId::Key(KeyId::SECRET_KEY),
        KeyRecord::new(KeyFlags(0), 0, secret),
    )
    .unwrap();

    let mut load_buf = [0u8; 64];
    load_buf[0..16].copy_from_slice(&export_buf[2..18]); // M1
    load_buf[16..48].copy_from_slice(&export_buf[18..50]); // M2
    load_buf[48..64].copy_from_slice(&export_buf[50..66]); // M3
    let mut load_size = 64;
    she_core::handle(&mut ctx2, &mut ks2, &cfg, 0, Opcode::LoadKey, &mut load_buf, &mut load_size)
        .unwrap();

    let restored = ks2.read_key(0, SlotId::Key(KeyId::RAM_KEY)).unwrap().unwrap();
    assert_eq!(restored.key, plain_key);
}

// Invariant 5: WRITE_PROTECT on the target slot rejects the update and
// leaves the slot untouched.
#[test]
fn write_protected_slot_is_untouched_by_a_rejected_update() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();
    let uid = [3u8; 15];
    set_uid(&mut ctx, &mut ks, &cfg, uid);
    boot_through_skip(&mut ctx, &mut ks, &cfg);

    let k_auth = [0x66u8; 16];
    ks.add_object(
        0,
        SlotId::Key(KeyId(0x1)),
        KeyRecord::new(KeyFlags(0), 0, k_auth),
    )
    .unwrap();
    ks.add_object(
        0,
        SlotId::Key(KeyId(0x5)),
        KeyRecord::new(KeyFlags(KeyFlags::WRITE_PROTECT), 2, [0xAAu8; 16]),
    )
    .unwrap();

    let mut request = build_load_key_request(uid, 0x5, 0x1, 3, 0, [0xBBu8; 16], k_auth);
    let mut size = 64;
    let err = she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::LoadKey, &mut request, &mut size)
        .unwrap_err();
    assert_eq!(err, SheError::WriteProtected);

    let unchanged = ks.read_key(0, SlotId::Key(KeyId(0x5))).unwrap().unwrap();
    assert_eq!(unchanged.count, 2);
    assert_eq!(unchanged.key, [0xAAu8; 16]);
}

// Invariant 3: while sb_state != SUCCESS, anything outside the exempt set
// fails with SEQUENCE_ERROR, even after UID is latched.
#[test]
fn commands_gated_until_boot_completes() {
    let mut ctx = SheContext::new();
    let mut ks = MemoryKeystore::default();
    let cfg = Config::default();
    set_uid(&mut ctx, &mut ks, &cfg, [4u8; 15]);

    let mut buf = [0u8; 16];
    let mut size = 16;
    let err = she_core::handle(&mut ctx, &mut ks, &cfg, 0, Opcode::ExtendSeed, &mut buf, &mut size)
        .unwrap_err();
    assert_eq!(err, SheError::SequenceError);
}
