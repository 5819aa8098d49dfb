//! Vault lifecycle controller.
//!
//! Executes the four lifecycle commands against a target slot:
//!
//! - **Create**: allocate a zeroed buffer, record owner and key, expose the
//!   data channel through the registrar
//! - **ChangeKey**: replace the key of an Active vault; existing bytes are
//!   not re-encrypted and become unrecoverable under the new key
//! - **Erase**: zero the data and reset the used-length high-water mark
//! - **Delete**: withdraw the exposure registration and reset the slot to
//!   Free
//!
//! Every command acquires the target slot's guard before validating and
//! releases it on every path. Precondition order follows the control
//! protocol: Create checks AlreadyActive before InvalidSize before
//! allocation; the other commands check NotActive before PermissionDenied.

use std::sync::Arc;

use crate::boundary::ExposureRegistrar;
use crate::control::VaultCommand;
use crate::error::{Result, VaultError};
use crate::guard::CancelToken;
use crate::pool::VaultPool;
use crate::vault::{OwnerId, VaultKey, VaultStatus};

/// Executes lifecycle commands against a vault pool
pub struct VaultController<R: ExposureRegistrar> {
    pool: Arc<VaultPool>,
    registrar: R,
}

impl<R: ExposureRegistrar> VaultController<R> {
    /// Create a controller over `pool`, exposing data channels through
    /// `registrar`
    pub fn new(pool: Arc<VaultPool>, registrar: R) -> Self {
        Self { pool, registrar }
    }

    /// The pool this controller operates on
    #[must_use]
    pub fn pool(&self) -> &Arc<VaultPool> {
        &self.pool
    }

    /// Execute a decoded control command on behalf of `owner`
    pub fn execute(&self, command: VaultCommand, owner: OwnerId, token: &CancelToken) -> Result<()> {
        match command {
            VaultCommand::Create {
                index,
                capacity,
                key,
            } => self.create(index, capacity, key, owner, token),
            VaultCommand::ChangeKey { index, key } => self.change_key(index, key, owner, token),
            VaultCommand::Erase { index } => self.erase(index, owner, token),
            VaultCommand::Delete { index } => self.delete(index, owner, token),
        }
    }

    /// Create the vault at `index` with the given capacity and key.
    ///
    /// On success the vault is Active, zero-filled, owned by `owner`, and
    /// its data channel is reachable through the registrar. On any failure
    /// the slot is left unmodified.
    pub fn create(
        &self,
        index: usize,
        capacity: u64,
        key: VaultKey,
        owner: OwnerId,
        token: &CancelToken,
    ) -> Result<()> {
        let limits = *self.pool.config().limits();
        let slot = self.pool.slot(index)?;
        let mut state = slot.lock(token)?;

        if state.status() == VaultStatus::Active {
            log::warn!("vault {index} was already created");
            return Err(VaultError::AlreadyActive);
        }

        if capacity < 1 || capacity > limits.max_capacity {
            log::warn!("vault {index} requested invalid capacity {capacity}");
            return Err(VaultError::InvalidSize(capacity));
        }

        let mut data = Vec::new();
        data.try_reserve_exact(capacity as usize)
            .map_err(|_| VaultError::AllocationFailed)?;
        data.resize(capacity as usize, 0);

        let registration = self.registrar.expose(index)?;

        state.status = VaultStatus::Active;
        state.owner = Some(owner);
        state.capacity = capacity;
        state.used_length = 0;
        state.key = key;
        state.data = data;
        state.registration = Some(registration);

        log::info!("created vault {index} with capacity {capacity}");
        Ok(())
    }

    /// Replace the key of the Active vault at `index`.
    ///
    /// Does not touch data or used-length; bytes written under the old key
    /// are not re-encrypted.
    pub fn change_key(
        &self,
        index: usize,
        key: VaultKey,
        owner: OwnerId,
        token: &CancelToken,
    ) -> Result<()> {
        let slot = self.pool.slot(index)?;
        let mut state = slot.lock(token)?;

        if state.status() != VaultStatus::Active {
            return Err(VaultError::NotActive);
        }
        if !state.is_owned_by(owner) {
            log::warn!("owner {owner:?} denied key change on vault {index}");
            return Err(VaultError::PermissionDenied);
        }

        state.key = key;

        log::info!("changed key of vault {index}");
        Ok(())
    }

    /// Zero all capacity bytes of the Active vault at `index` and reset its
    /// used-length. Capacity, key, owner and status are unchanged.
    pub fn erase(&self, index: usize, owner: OwnerId, token: &CancelToken) -> Result<()> {
        let slot = self.pool.slot(index)?;
        let mut state = slot.lock(token)?;

        if state.status() != VaultStatus::Active {
            return Err(VaultError::NotActive);
        }
        if !state.is_owned_by(owner) {
            log::warn!("owner {owner:?} denied erase on vault {index}");
            return Err(VaultError::PermissionDenied);
        }

        state.data.fill(0);
        state.used_length = 0;

        log::info!("erased vault {index}");
        Ok(())
    }

    /// Tear down the Active vault at `index`: withdraw its exposure
    /// registration and reset the slot to Free. The index becomes eligible
    /// for a future Create with a different owner.
    pub fn delete(&self, index: usize, owner: OwnerId, token: &CancelToken) -> Result<()> {
        let slot = self.pool.slot(index)?;
        let mut state = slot.lock(token)?;

        if state.status() != VaultStatus::Active {
            return Err(VaultError::NotActive);
        }
        if !state.is_owned_by(owner) {
            log::warn!("owner {owner:?} denied delete on vault {index}");
            return Err(VaultError::PermissionDenied);
        }

        if let Some(registration) = state.registration.take() {
            self.registrar.withdraw(registration);
        }
        state.reset();

        log::info!("deleted vault {index}");
        Ok(())
    }

    /// Reset every Active vault and withdraw its registration.
    ///
    /// Called at process teardown so no buffers or stale host-side
    /// registrations outlive the pool.
    pub fn shutdown(&self) {
        let token = CancelToken::new();
        for index in 0..self.pool.len() {
            let slot = match self.pool.slot(index) {
                Ok(slot) => slot,
                Err(_) => continue,
            };
            if let Ok(mut state) = slot.lock(&token) {
                if let Some(registration) = state.registration.take() {
                    self.registrar.withdraw(registration);
                }
                state.reset();
            }
        }
        log::info!("vault pool shut down");
    }
}
