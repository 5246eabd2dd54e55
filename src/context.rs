//! The per-client SHE session context (§3).

use cmac::Cmac;
use zeroize::Zeroize;

use aes::Aes128;

/// Secure-boot progress, modeled as a closed sum type per the §9
/// re-architecture guidance ("Model `sb_state` as a closed variant with
/// explicit transitions; reject out-of-state transitions at the type
/// level where possible").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootState {
    #[default]
    Init,
    Update,
    Finish,
    Success,
    Failure,
}

/// Per-client SHE session state (§3). Created zeroed at session start;
/// destroyed at session end. Persistent state (keys, counters, PRNG seed)
/// lives in the keystore, not here.
pub struct SheContext {
    pub uid: [u8; 15],
    pub uid_set: bool,

    pub sb_state: BootState,
    pub bl_size: u32,
    pub bl_received: u32,
    pub cmac_key_found: bool,
    pub(crate) cmac_ctx: Option<Cmac<Aes128>>,

    pub rnd_inited: bool,
    pub(crate) prng_state: [u8; 16],
    pub(crate) prng_key: [u8; 16],

    pub ram_key_plain: bool,
}

impl Default for SheContext {
    fn default() -> Self {
        SheContext {
            uid: [0; 15],
            uid_set: false,
            sb_state: BootState::default(),
            bl_size: 0,
            bl_received: 0,
            cmac_key_found: false,
            cmac_ctx: None,
            rnd_inited: false,
            prng_state: [0; 16],
            prng_key: [0; 16],
            ram_key_plain: false,
        }
    }
}

impl SheContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the secure-boot state machine to `INIT` after any non-skip
    /// failure in the boot sequence (§4.D), so the client may retry.
    pub(crate) fn reset_boot_state(&mut self) {
        self.sb_state = BootState::Init;
        self.bl_size = 0;
        self.bl_received = 0;
        self.cmac_key_found = false;
        self.cmac_ctx = None;
    }
}

impl Drop for SheContext {
    fn drop(&mut self) {
        // §5: PRNG key/state and any residual key material must be
        // zeroized on exit. `cmac_ctx`'s own drop is handled by the
        // primitive library's `zeroize` feature.
        self.prng_state.zeroize();
        self.prng_key.zeroize();
        self.uid.zeroize();
    }
}
