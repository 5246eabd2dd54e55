//! Message-field codec: packs and unpacks the M1/M2 fields (§4.B).
//!
//! All multi-byte integers on the wire are big-endian.

/// Decoded M1 tail fields plus the UID it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct M1Fields {
    pub uid: [u8; 15],
    pub id: u8,
    pub auth_id: u8,
}

/// Splits a 16-byte M1 message into `UID || (ID<<4 | AuthID)`.
pub fn decode_m1(m1: &[u8; 16]) -> M1Fields {
    let mut uid = [0u8; 15];
    uid.copy_from_slice(&m1[..15]);
    M1Fields {
        uid,
        id: (m1[15] >> 4) & 0x0f,
        auth_id: m1[15] & 0x0f,
    }
}

/// Encodes `UID || (ID<<4 | AuthID)` into a 16-byte M1 message.
pub fn encode_m1(uid: &[u8; 15], id: u8, auth_id: u8) -> [u8; 16] {
    let mut m1 = [0u8; 16];
    m1[..15].copy_from_slice(uid);
    m1[15] = ((id & 0x0f) << 4) | (auth_id & 0x0f);
    m1
}

/// Decoded counter/flags header carried in the first 4 bytes of a
/// (decrypted) M2 body: `counter(28) || flags(5) || pad(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct M2Header {
    pub counter: u32,
    pub flags: u8,
}

/// Extracts `Counter` (28 bits) and `Flags` (5 bits) from the first 4 bytes
/// of a decrypted M2 body, per §4.B's bit layout.
pub fn decode_m2_header(m2: &[u8; 32]) -> M2Header {
    let word = u32::from_be_bytes([m2[0], m2[1], m2[2], m2[3]]);
    let counter = word >> 4;
    let flags = ((m2[3] & 0x0f) << 4) | ((m2[4] & 0x80) >> 7);
    M2Header { counter, flags }
}

/// Encodes a `counter(28) || flags(5) || pad(87) || key(128)` M2 body
/// (plaintext, pre-encryption), used by `EXPORT_RAM_KEY` (§4.F).
///
/// This is the exact inverse of [`decode_m2_header`]'s bit layout: the
/// nibble written to the low half of byte 3 becomes flag bits 4-7 on
/// decode, and the single bit written to the high bit of byte 4 becomes
/// flag bit 0. Flag bits 1-3 are not representable on the wire (§4.B's
/// literal formula), so this crate's own flag bit assignments (§3.NEW)
/// only ever use bits 0, 4, 5, 6, 7.
pub fn encode_m2_body(counter: u32, flags: u8, key: &[u8; 16]) -> [u8; 32] {
    let mut m2 = [0u8; 32];
    let nibble = (flags >> 4) & 0x0f;
    let word = ((counter & 0x0fff_ffff) << 4) | nibble as u32;
    m2[..4].copy_from_slice(&word.to_be_bytes());
    m2[4] = (flags & 0x01) << 7;
    m2[16..].copy_from_slice(key);
    m2
}

/// Encodes the 16-byte confirmation word used by M4's second half and the
/// RAM-export M4 (§4.E step 6, §4.F): the new counter in its high 28 bits,
/// a mandatory padding marker bit set immediately after, zeros thereafter.
pub fn encode_confirmation_word(counter: u32) -> [u8; 16] {
    let mut word = [0u8; 16];
    let top = ((counter & 0x0fff_ffff) << 4) | 0x8;
    word[..4].copy_from_slice(&top.to_be_bytes());
    word
}
