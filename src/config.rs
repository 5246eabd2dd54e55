//! Integrator-pinned configuration (§9 Open Questions).
//!
//! Not a CLI, not environment variables, not a filesystem path (§6: "No
//! CLI, no env vars, no filesystem paths at this layer") — just a small
//! struct the embedding service constructs once and threads through.

/// Resolves the two Open Questions the distilled spec explicitly declines
/// to guess at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Whether `SECURE_BOOT_INIT` without a configured `BOOT_MAC_KEY_ID`
    /// leaves `sb_state = Success` (permitting all subsequent commands)
    /// rather than leaving the boot gate closed. Defaults to `true`,
    /// matching the source behavior (§4.D, §9).
    pub no_secure_boot_is_success: bool,

    /// Whether the 32-bit bootloader-length field consumed into the boot
    /// CMAC at `SECURE_BOOT_INIT` is big-endian (`true`, the nominal SHE
    /// wire format) or host/little-endian (`false`, bit-exact with the
    /// reference fixtures in §8.S3). Defaults to `false`.
    pub boot_length_big_endian: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            no_secure_boot_is_success: true,
            boot_length_big_endian: false,
        }
    }
}
