//! Server-side core of a SHE (Secure Hardware Extension) command handler:
//! UID latching, secure-boot verification, the authenticated key-update /
//! key-export protocol (M1..M5), AES bulk operations, and a deterministic
//! per-context PRNG.
//!
//! This crate is the software-core analogue of a CSEc/SHE hardware command
//! set: it owns the state machine and cryptographic protocol logic, and
//! depends on an external, audited AES/CMAC implementation (the `aes`,
//! `cbc`, and `cmac` crates) rather than hand-rolling block-cipher
//! internals. The NVM-backed keystore and the transport/framing layer that
//! delivers `(action, payload)` tuples are out of scope: see
//! [`keystore::Keystore`] for the former's trait contract.
//!
//! `no_std` by default; unit and integration tests build against `std`.
#![cfg_attr(not(test), no_std)]

pub mod aes_ops;
pub mod codec;
pub mod config;
pub mod constants;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod kdf;
pub mod key_update;
pub mod keystore;
pub mod prng;
pub mod primitives;
pub mod ram_export;
pub mod secure_boot;

pub use config::Config;
pub use constants::Opcode;
pub use context::SheContext;
pub use dispatch::handle;
pub use error::SheError;
pub use keystore::Keystore;
