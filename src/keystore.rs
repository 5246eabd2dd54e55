//! Keystore adapter (§4.C): the out-of-scope NVM-backed key store.
//!
//! This module defines the trait contract only. A production
//! implementation — reading/writing actual non-volatile memory — is an
//! external collaborator (§1, §6); the `MemoryKeystore` here is a test
//! double used by this crate's own tests.

use crate::error::SheError;

/// A client/session identifier, namespacing keys per §3 ("addressed by
/// composite id `(type=SHE, client, slot)`").
pub type ClientId = u32;

/// The 4-bit SHE key-slot space plus the handful of extended slots only
/// reachable outside the M1-encoded update protocol (§3.NEW).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId(pub u8);

impl KeyId {
    pub const SECRET_KEY: KeyId = KeyId(0x0);
    pub const MASTER_ECU_KEY: KeyId = KeyId(0x1);
    pub const BOOT_MAC_KEY: KeyId = KeyId(0x2);
    pub const BOOT_MAC: KeyId = KeyId(0x3);
    pub const RAM_KEY: KeyId = KeyId(0xf);

    /// Whether this id fits in M1's 4-bit `ID`/`AuthID` nibble.
    pub const fn fits_m1_nibble(self) -> bool {
        self.0 <= 0xf
    }
}

/// Non-key NVM-addressable slots (§3.NEW): the PRNG seed has no
/// flags/counter, so it is not a `KeyId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    Key(KeyId),
    PrngSeed,
}

impl From<KeyId> for SlotId {
    fn from(id: KeyId) -> Self {
        SlotId::Key(id)
    }
}

/// The recognized SHE key-flag bits (§3). Other SHE flag bits are carried
/// verbatim in [`KeyFlags::raw`] but not enforced by this core.
///
/// Bit assignment within the byte is fixed by this crate (§4.B's wire
/// formula only makes bits `{0, 4, 5, 6, 7}` representable — see
/// `codec::encode_m2_body`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyFlags(pub u8);

impl KeyFlags {
    pub const WRITE_PROTECT: u8 = 0x80;
    pub const WILDCARD: u8 = 0x10;

    pub const fn write_protected(self) -> bool {
        self.0 & Self::WRITE_PROTECT != 0
    }

    pub const fn wildcard(self) -> bool {
        self.0 & Self::WILDCARD != 0
    }

    /// The raw flag byte, including bits this core does not interpret.
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// A stored key/slot record: flags, monotonic counter, and key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRecord {
    pub flags: KeyFlags,
    pub count: u32,
    pub key: [u8; 16],
}

impl KeyRecord {
    pub const fn new(flags: KeyFlags, count: u32, key: [u8; 16]) -> Self {
        KeyRecord { flags, count, key }
    }
}

/// The NVM-backed keystore contract this core dispatches against.
///
/// `read_key` returns `Ok(None)` for "not found" (a normal, expected
/// outcome many call sites handle explicitly) and `Err` only for a genuine
/// backend failure.
pub trait Keystore {
    fn read_key(&self, client: ClientId, slot: SlotId) -> Result<Option<KeyRecord>, SheError>;

    /// Volatile write (the RAM key slot): not required to survive restart.
    fn cache_key(
        &mut self,
        client: ClientId,
        slot: SlotId,
        record: KeyRecord,
    ) -> Result<(), SheError>;

    /// Persistent write; may evict any cached copy of the same slot.
    fn add_object(
        &mut self,
        client: ClientId,
        slot: SlotId,
        record: KeyRecord,
    ) -> Result<(), SheError>;
}

/// A simple in-memory keystore used by this crate's own tests. Not a
/// production NVM backend — see the module doc comment.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Default)]
pub struct MemoryKeystore {
    entries: alloc_free::Map,
}

#[cfg(any(test, feature = "test-support"))]
mod alloc_free {
    //! A tiny fixed-capacity association list. `no_std`-friendly without
    //! reaching for `alloc`: the test double doesn't need to scale.
    use super::{ClientId, KeyRecord, SlotId};

    const CAPACITY: usize = 64;

    #[derive(Debug)]
    pub struct Map {
        entries: [Option<((ClientId, SlotId), KeyRecord)>; CAPACITY],
    }

    impl Default for Map {
        fn default() -> Self {
            Map {
                entries: [None; CAPACITY],
            }
        }
    }

    impl Map {
        pub fn get(&self, key: (ClientId, SlotId)) -> Option<KeyRecord> {
            self.entries
                .iter()
                .flatten()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| *v)
        }

        pub fn insert(&mut self, key: (ClientId, SlotId), value: KeyRecord) {
            if let Some(slot) = self
                .entries
                .iter_mut()
                .find(|e| matches!(e, Some((k, _)) if *k == key))
            {
                *slot = Some((key, value));
                return;
            }
            if let Some(slot) = self.entries.iter_mut().find(|e| e.is_none()) {
                *slot = Some((key, value));
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Keystore for MemoryKeystore {
    fn read_key(&self, client: ClientId, slot: SlotId) -> Result<Option<KeyRecord>, SheError> {
        Ok(self.entries.get((client, slot)))
    }

    fn cache_key(
        &mut self,
        client: ClientId,
        slot: SlotId,
        record: KeyRecord,
    ) -> Result<(), SheError> {
        self.entries.insert((client, slot), record);
        Ok(())
    }

    fn add_object(
        &mut self,
        client: ClientId,
        slot: SlotId,
        record: KeyRecord,
    ) -> Result<(), SheError> {
        self.entries.insert((client, slot), record);
        Ok(())
    }
}
