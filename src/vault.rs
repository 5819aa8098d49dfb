//! Per-slot vault state.
//!
//! One `VaultState` holds everything a single slot knows: lifecycle status,
//! owner identity, capacity, used-length high-water mark, key material and
//! the data buffer. The state never moves between slots; the slot's guard
//! (see [`crate::guard`]) lives for the whole process, only the contents
//! reset across create/delete cycles.
//!
//! # Security Properties
//!
//! - **Zeroize on reset**: key material and the data buffer are securely
//!   cleared when the vault is deleted or the state is dropped
//! - **Owner gate**: the owner token recorded at creation is authoritative
//!   for every state-changing and data-access operation

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::boundary::RegistrationId;
use crate::keystream::KEY_SIZE;

/// Lifecycle status of a vault slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// Uninitialized or deleted; the slot holds no data and no owner
    Free,
    /// Created and usable by its owner
    Active,
}

/// Opaque identity token of a vault owner.
///
/// The core only ever compares tokens for equality; callers pass their
/// identity explicitly to every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u32);

/// Fixed-length vault encryption key.
///
/// Always exactly [`KEY_SIZE`] bytes; shorter user keys are NUL-padded, and
/// the padding participates in the keystream like any other byte.
/// Automatically zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_SIZE]);

impl VaultKey {
    /// Create a key from exactly [`KEY_SIZE`] bytes
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a key from up to [`KEY_SIZE`] bytes, NUL-padding the rest.
    /// Input beyond [`KEY_SIZE`] bytes is ignored.
    #[must_use]
    pub fn from_padded(bytes: &[u8]) -> Self {
        let mut key = [0u8; KEY_SIZE];
        let len = bytes.len().min(KEY_SIZE);
        key[..len].copy_from_slice(&bytes[..len]);
        Self(key)
    }

    /// Get the key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.write_str("VaultKey(..)")
    }
}

/// State of one vault slot
pub struct VaultState {
    /// Lifecycle status
    pub(crate) status: VaultStatus,
    /// Identity of the creator; `None` while the slot is Free
    pub(crate) owner: Option<OwnerId>,
    /// Maximum byte length, fixed for the vault's Active lifetime
    pub(crate) capacity: u64,
    /// High-water mark of bytes ever written since the last Erase/Create
    pub(crate) used_length: u64,
    /// Encryption key, replaced only by Create and ChangeKey
    pub(crate) key: VaultKey,
    /// Data buffer; `capacity` bytes while Active, empty while Free
    pub(crate) data: Vec<u8>,
    /// Exposure registration handle held while Active
    pub(crate) registration: Option<RegistrationId>,
}

impl VaultState {
    /// A Free slot with no owner, no key and no data
    #[must_use]
    pub(crate) fn free() -> Self {
        Self {
            status: VaultStatus::Free,
            owner: None,
            capacity: 0,
            used_length: 0,
            key: VaultKey::new([0u8; KEY_SIZE]),
            data: Vec::new(),
            registration: None,
        }
    }

    /// Lifecycle status
    #[must_use]
    pub fn status(&self) -> VaultStatus {
        self.status
    }

    /// Owner identity, `None` while Free
    #[must_use]
    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    /// Maximum byte length
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// High-water mark of bytes written since the last Erase/Create
    #[must_use]
    pub fn used_length(&self) -> u64 {
        self.used_length
    }

    /// Whether `requester` is the recorded owner of an owned vault
    #[must_use]
    pub(crate) fn is_owned_by(&self, requester: OwnerId) -> bool {
        self.owner == Some(requester)
    }

    /// Reset the slot to Free.
    ///
    /// Zeroizes key and data, drops the data buffer and clears the
    /// registration handle. Idempotent: resetting a Free slot only
    /// re-zeroes fields.
    pub(crate) fn reset(&mut self) {
        self.status = VaultStatus::Free;
        self.owner = None;
        self.capacity = 0;
        self.used_length = 0;
        self.key.zeroize();
        self.data.zeroize();
        self.data = Vec::new();
        self.registration = None;
    }
}

impl Drop for VaultState {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
