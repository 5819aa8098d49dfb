//! Fixed-size arena of vault slots.
//!
//! The pool is created once at process start with N slots and never grows
//! or shrinks. A slot's index (0..N-1) is its permanent identifier; Delete
//! returns a slot to Free, and the same index is then eligible for a future
//! Create with a different owner, capacity and key.
//!
//! The pool does no ownership or status validation; those checks belong to
//! the operation layer.

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::guard::Exclusive;
use crate::vault::VaultState;

/// Fixed arena of vault slots, indexed by a stable identifier
pub struct VaultPool {
    slots: Vec<Exclusive<VaultState>>,
    config: VaultConfig,
}

impl VaultPool {
    /// Create a pool with `config.limits().n_vaults` Free slots
    #[must_use]
    pub fn new(config: VaultConfig) -> Self {
        let slots = (0..config.limits().n_vaults)
            .map(|_| Exclusive::new(VaultState::free()))
            .collect();
        Self { slots, config }
    }

    /// Pool configuration
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Number of slots in the pool
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool has no slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get the guard of the slot at `index`.
    ///
    /// Fails with [`VaultError::OutOfRange`] when `index` is beyond the
    /// pool; no other validation happens at this layer.
    pub fn slot(&self, index: usize) -> Result<&Exclusive<VaultState>> {
        self.slots.get(index).ok_or(VaultError::OutOfRange)
    }
}

impl Default for VaultPool {
    fn default() -> Self {
        Self::new(VaultConfig::default())
    }
}
