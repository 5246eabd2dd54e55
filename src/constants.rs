//! SHE fixed constants, opcodes, and status-register bit positions (§6).

/// KDF constant used to derive the M1/M2 encryption key from an auth key.
pub const C_ENC: [u8; 16] = [
    0x01, 0x01, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// KDF constant used to derive the M1/M2 CMAC key from an auth key.
pub const C_MAC: [u8; 16] = [
    0x01, 0x02, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// KDF constant used to derive the PRNG's working key from the secret key.
pub const C_PRNG_KEY: [u8; 16] = [
    0x01, 0x04, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// KDF constant used to derive the seed-ratcheting key from the secret key.
pub const C_PRNG_SEED: [u8; 16] = [
    0x01, 0x05, 0x53, 0x48, 0x45, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xB0,
];

/// Command opcodes dispatched through [`crate::dispatch::handle`] (§6).
///
/// Values are assigned sequentially in the order §6 lists them; SHE's
/// externally-specified numeric values are an integration detail for the
/// transport layer this core does not own (§1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    SetUid = 0x01,
    SecureBootInit = 0x02,
    SecureBootUpdate = 0x03,
    SecureBootFinish = 0x04,
    GetStatus = 0x05,
    LoadKey = 0x06,
    LoadPlainKey = 0x07,
    ExportRamKey = 0x08,
    InitRnd = 0x09,
    Rnd = 0x0a,
    ExtendSeed = 0x0b,
    EncEcb = 0x0c,
    EncCbc = 0x0d,
    DecEcb = 0x0e,
    DecCbc = 0x0f,
    GenMac = 0x10,
    VerifyMac = 0x11,
}

impl Opcode {
    pub const fn from_u16(value: u16) -> Option<Opcode> {
        Some(match value {
            0x01 => Opcode::SetUid,
            0x02 => Opcode::SecureBootInit,
            0x03 => Opcode::SecureBootUpdate,
            0x04 => Opcode::SecureBootFinish,
            0x05 => Opcode::GetStatus,
            0x06 => Opcode::LoadKey,
            0x07 => Opcode::LoadPlainKey,
            0x08 => Opcode::ExportRamKey,
            0x09 => Opcode::InitRnd,
            0x0a => Opcode::Rnd,
            0x0b => Opcode::ExtendSeed,
            0x0c => Opcode::EncEcb,
            0x0d => Opcode::EncCbc,
            0x0e => Opcode::DecEcb,
            0x0f => Opcode::DecCbc,
            0x10 => Opcode::GenMac,
            0x11 => Opcode::VerifyMac,
            _ => return None,
        })
    }
}

/// `GET_STATUS` SREG bits (§4.D, Open Question resolved in §9 of
/// `SPEC_FULL.md`). Bits `0x01` (`BUSY`) and `0x04` (`BOOT_INIT`) are
/// reserved and never set by this core.
pub mod sreg {
    pub const SECURE_BOOT: u16 = 0x02;
    pub const BOOT_FINISHED: u16 = 0x08;
    pub const BOOT_OK: u16 = 0x10;
    pub const RND_INIT: u16 = 0x20;
}
