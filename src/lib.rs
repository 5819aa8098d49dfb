//! Secvault - Fixed pool of owner-scoped encrypted vaults
//!
//! This crate provides a small arena of byte-addressable vaults, each
//! protected by an XOR keystream and scoped to a single owner. It uses:
//! - Fixed pool of slots created at startup (no dynamic growth)
//! - Per-vault interruptible exclusive guard (event-driven, no polling)
//! - Offset-addressed streaming encryption (position-independent keystream)
//! - Memory safety with zeroize on key material and vault contents
//!
//! ## Architecture
//!
//! ```text
//! Control endpoint                       Data endpoints (one per vault)
//!     ↓ code + 23-byte payload              ↓ seek/read/write
//! control (decode → VaultCommand)       io (DataChannel, PositionCursor)
//!     ↓                                     ↓
//! lifecycle (VaultController)  ────────  pool (VaultPool)
//!     ├── status and ownership checks       ↓ per-slot guard
//!     ├── allocation and zeroization    guard (Exclusive, CancelToken)
//!     └── exposure registration             ↓
//! boundary (ExposureRegistrar,         vault (VaultState, VaultKey)
//!           CopySource/CopySink)           ↓ XOR at absolute offsets
//!                                       keystream
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod boundary;
pub mod config;
pub mod control;
pub mod error;
pub mod guard;
pub mod io;
pub mod keystream;
pub mod lifecycle;
pub mod pool;
pub mod vault;

pub use boundary::{
    CopySink, CopySource, ExposureRegistrar, FailingRegistrar, MemoryRegistrar, RegistrationId,
    ShortCopy, SliceSink, SliceSource,
};
pub use config::{VaultConfig, VaultLimits};
pub use control::{
    error_code, handle_request, VaultCommand, CMD_CHANGE_KEY, CMD_CREATE, CMD_DELETE, CMD_ERASE,
    CONTROL_PAYLOAD_SIZE, WIRE_KEY_SIZE,
};
pub use error::{Result, VaultError};
pub use guard::{CancelToken, Exclusive, ExclusiveHandle, GuardError};
pub use io::{DataChannel, PositionCursor, Whence};
pub use keystream::{keystream_byte, xor_buffer, KEY_SIZE};
pub use lifecycle::VaultController;
pub use pool::VaultPool;
pub use vault::{OwnerId, VaultKey, VaultState, VaultStatus};
