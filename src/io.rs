//! Per-vault data channel: offset-addressed partial Read and Write.
//!
//! A [`DataChannel`] is one open handle onto an Active vault. It carries a
//! [`PositionCursor`] and moves bytes through the copy boundary, applying
//! the positional XOR keystream on the way. Seek, Read and Write all take
//! the same per-vault guard as the lifecycle commands, so the control path
//! and the data path never touch a vault concurrently.
//!
//! Bookkeeping always uses the byte count the copy boundary actually
//! delivered, never the requested count: a short copy advances the cursor
//! and the used-length high-water mark only by what really moved.

use std::sync::Arc;

use zeroize::Zeroize;

use crate::boundary::{CopySink, CopySource};
use crate::error::{Result, VaultError};
use crate::guard::CancelToken;
use crate::keystream::xor_buffer;
use crate::pool::VaultPool;
use crate::vault::{OwnerId, VaultStatus};

/// Reference point for a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute: `new = offset`
    Set,
    /// Relative: `new = current + offset`
    Current,
    /// From the end: `new = capacity - 1 - offset`.
    ///
    /// Defined relative to capacity, not used-length, and off by one from
    /// conventional seek-from-end. Preserved as a given contract.
    End,
}

/// Seek position of one open handle, always within `[0, capacity)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionCursor {
    position: u64,
}

impl PositionCursor {
    /// Current absolute position
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Compute and apply a new position; fails with
    /// [`VaultError::OutOfRange`] when the target falls outside
    /// `[0, capacity)`, leaving the cursor unchanged.
    pub(crate) fn seek(&mut self, offset: i64, whence: Whence, capacity: u64) -> Result<u64> {
        let target: i128 = match whence {
            Whence::Set => i128::from(offset),
            Whence::Current => i128::from(self.position) + i128::from(offset),
            Whence::End => i128::from(capacity) - 1 - i128::from(offset),
        };

        if target < 0 || target >= i128::from(capacity) {
            return Err(VaultError::OutOfRange);
        }

        self.position = target as u64;
        Ok(self.position)
    }

    pub(crate) fn advance(&mut self, delivered: u64) {
        self.position += delivered;
    }
}

/// One open handle onto a vault's byte content
pub struct DataChannel {
    pool: Arc<VaultPool>,
    index: usize,
    owner: OwnerId,
    cursor: PositionCursor,
}

impl DataChannel {
    /// Open a handle onto the vault at `index` as `owner`.
    ///
    /// Fails with [`VaultError::PermissionDenied`] unless `owner` is the
    /// vault's recorded owner; a Free vault has no owner and rejects every
    /// open. Ownership is re-checked on every subsequent operation, since
    /// the vault can be deleted and re-created while the handle is open.
    pub fn open(
        pool: Arc<VaultPool>,
        index: usize,
        owner: OwnerId,
        token: &CancelToken,
    ) -> Result<Self> {
        {
            let slot = pool.slot(index)?;
            let state = slot.lock(token)?;
            if !state.is_owned_by(owner) {
                log::warn!("owner {owner:?} denied open on vault {index}");
                return Err(VaultError::PermissionDenied);
            }
        }

        Ok(Self {
            pool,
            index,
            owner,
            cursor: PositionCursor::default(),
        })
    }

    /// Vault index this handle addresses
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current cursor position
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Move the cursor; returns the new absolute position.
    ///
    /// Serializes with every other operation on the same vault.
    pub fn seek(&mut self, offset: i64, whence: Whence, token: &CancelToken) -> Result<u64> {
        let slot = self.pool.slot(self.index)?;
        let state = slot.lock(token)?;

        if !state.is_owned_by(self.owner) {
            return Err(VaultError::PermissionDenied);
        }

        self.cursor.seek(offset, whence, state.capacity())
    }

    /// Read up to `requested` decrypted bytes at the cursor into `sink`.
    ///
    /// Only bytes below the used-length high-water mark are available; a
    /// return of `0` signals end-of-used-data, not an error. The cursor
    /// advances by the count the sink actually accepted.
    pub fn read(
        &mut self,
        requested: usize,
        sink: &mut impl CopySink,
        token: &CancelToken,
    ) -> Result<usize> {
        let slot = self.pool.slot(self.index)?;
        let state = slot.lock(token)?;

        if state.status() != VaultStatus::Active {
            return Err(VaultError::NotActive);
        }
        if !state.is_owned_by(self.owner) {
            log::warn!("owner {:?} denied read on vault {}", self.owner, self.index);
            return Err(VaultError::PermissionDenied);
        }

        let position = self.cursor.position();
        let available = state.used_length().saturating_sub(position);
        let to_copy = (requested as u64).min(available) as usize;
        if to_copy == 0 {
            // End of used data; the cursor may also sit beyond the capacity
            // of a re-created vault, which makes nothing available either.
            return Ok(0);
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(to_copy)
            .map_err(|_| VaultError::AllocationFailed)?;
        let start = position as usize;
        buffer.extend_from_slice(&state.data[start..start + to_copy]);

        xor_buffer(&mut buffer, position, &state.key);

        let delivered = sink.copy_out(&buffer).min(to_copy);
        buffer.zeroize();

        self.cursor.advance(delivered as u64);
        Ok(delivered)
    }

    /// Write up to `provided` bytes from `source` at the cursor.
    ///
    /// Clipped to capacity: a write starting at or beyond capacity moves
    /// nothing and returns `0`. Updates the used-length high-water mark and
    /// advances the cursor by the count the source actually supplied.
    pub fn write(
        &mut self,
        provided: usize,
        source: &mut impl CopySource,
        token: &CancelToken,
    ) -> Result<usize> {
        let slot = self.pool.slot(self.index)?;
        let mut state = slot.lock(token)?;

        if state.status() != VaultStatus::Active {
            return Err(VaultError::NotActive);
        }
        if !state.is_owned_by(self.owner) {
            log::warn!("owner {:?} denied write on vault {}", self.owner, self.index);
            return Err(VaultError::PermissionDenied);
        }

        let position = self.cursor.position();
        let available = state.capacity().saturating_sub(position);
        let to_copy = (provided as u64).min(available) as usize;
        if to_copy == 0 {
            return Ok(0);
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(to_copy)
            .map_err(|_| VaultError::AllocationFailed)?;
        buffer.resize(to_copy, 0);

        let received = source.copy_in(&mut buffer).min(to_copy);

        xor_buffer(&mut buffer[..received], position, &state.key);

        let start = position as usize;
        state.data[start..start + received].copy_from_slice(&buffer[..received]);
        buffer.zeroize();

        let end = position + received as u64;
        if end > state.used_length() {
            state.used_length = end;
        }

        self.cursor.advance(received as u64);
        Ok(received)
    }
}
