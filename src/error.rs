//! The closed SHE error-kind set.
//!
//! Discriminants match the SHE specification's status bitfield verbatim
//! (the same convention the board's CSEc driver uses for `CommandResult`),
//! so a caller that needs the raw wire value can simply cast `as u16`.

use thiserror::Error;

/// Every error this core can return, plus the transport-level `BadArgs`.
///
/// `NoError` is deliberately absent: success is `Ok(_)`, never a variant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SheError {
    #[error("sequence error: command not permitted in the current state")]
    SequenceError = 0x2,

    #[error("key not available")]
    KeyNotAvailable = 0x4,

    #[error("key invalid")]
    KeyInvalid = 0x8,

    #[error("key empty")]
    KeyEmpty = 0x10,

    #[error("no secure boot configured")]
    NoSecureBoot = 0x20,

    #[error("key write-protected")]
    WriteProtected = 0x40,

    #[error("key update error")]
    KeyUpdateError = 0x80,

    #[error("rng seed error")]
    RngSeed = 0x100,

    #[error("debugging not permitted")]
    NoDebugging = 0x200,

    #[error("busy")]
    Busy = 0x400,

    #[error("memory failure")]
    MemoryFailure = 0x800,

    #[error("general error")]
    GeneralError = 0x1000,

    /// Transport-level: null/invalid arguments at the `handle` boundary.
    /// Never remapped to `GeneralError`.
    #[error("bad arguments")]
    BadArgs = 0xffff,
}

impl SheError {
    /// The SHE status bit this error is reported as on the wire.
    pub const fn bits(self) -> u16 {
        self as u16
    }
}

/// Failure from the underlying AES/CMAC primitive implementation (key/IV
/// length mismatches, internal verification failure, etc).
///
/// Per §4.A/§4.H this core treats the primitive library as a black-box
/// oracle: the only thing it knows to do with a primitive failure is
/// surface it as `GeneralError`, which is exactly what `GENERAL_ERROR`
/// means in §7 ("any other non-zero return normalizes to GENERAL_ERROR").
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveError;

impl From<PrimitiveError> for SheError {
    fn from(_: PrimitiveError) -> Self {
        SheError::GeneralError
    }
}

impl From<cipher::InvalidLength> for PrimitiveError {
    fn from(_: cipher::InvalidLength) -> Self {
        PrimitiveError
    }
}
