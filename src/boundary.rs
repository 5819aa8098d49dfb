//! Trust-boundary collaborators.
//!
//! The core consumes two external interfaces, specified here at their call
//! contracts only:
//!
//! - the **copy boundary** ([`CopySource`] / [`CopySink`]) moves bytes
//!   between caller-supplied buffers and the core's transient buffers; both
//!   directions may deliver fewer bytes than requested, and the actual
//!   count is authoritative for all bookkeeping
//! - the **exposure registrar** ([`ExposureRegistrar`]) makes a vault's
//!   data channel reachable under a stable identifier on Create and
//!   withdraws it on Delete; discovery and naming live outside the core
//!
//! In-memory implementations are provided for tests and embedding, in the
//! same spirit as an in-memory filesystem backend.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, VaultError};

// ============================================================
// COPY BOUNDARY
// ============================================================

/// Destination for decrypted bytes leaving the core (the copy-out primitive)
pub trait CopySink {
    /// Deliver `bytes` to the caller; returns how many were actually
    /// delivered, which may be fewer than `bytes.len()`
    fn copy_out(&mut self, bytes: &[u8]) -> usize;
}

/// Source of plaintext bytes entering the core (the copy-in primitive)
pub trait CopySource {
    /// Fill `buffer` from the caller; returns how many bytes were actually
    /// received, which may be fewer than `buffer.len()`
    fn copy_in(&mut self, buffer: &mut [u8]) -> usize;
}

impl<T: CopySink + ?Sized> CopySink for &mut T {
    fn copy_out(&mut self, bytes: &[u8]) -> usize {
        (**self).copy_out(bytes)
    }
}

impl<T: CopySource + ?Sized> CopySource for &mut T {
    fn copy_in(&mut self, buffer: &mut [u8]) -> usize {
        (**self).copy_in(buffer)
    }
}

impl CopySink for Vec<u8> {
    fn copy_out(&mut self, bytes: &[u8]) -> usize {
        self.extend_from_slice(bytes);
        bytes.len()
    }
}

/// Copy-out into a fixed caller buffer; delivers at most the buffer length
pub struct SliceSink<'a> {
    buffer: &'a mut [u8],
    filled: usize,
}

impl<'a> SliceSink<'a> {
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, filled: 0 }
    }

    /// Number of bytes delivered so far
    #[must_use]
    pub fn filled(&self) -> usize {
        self.filled
    }
}

impl CopySink for SliceSink<'_> {
    fn copy_out(&mut self, bytes: &[u8]) -> usize {
        let room = self.buffer.len() - self.filled;
        let n = bytes.len().min(room);
        self.buffer[self.filled..self.filled + n].copy_from_slice(&bytes[..n]);
        self.filled += n;
        n
    }
}

/// Copy-in from a caller byte slice
pub struct SliceSource<'a> {
    data: &'a [u8],
    consumed: usize,
}

impl<'a> SliceSource<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, consumed: 0 }
    }
}

impl CopySource for SliceSource<'_> {
    fn copy_in(&mut self, buffer: &mut [u8]) -> usize {
        let remaining = &self.data[self.consumed..];
        let n = buffer.len().min(remaining.len());
        buffer[..n].copy_from_slice(&remaining[..n]);
        self.consumed += n;
        n
    }
}

/// Copy boundary that delivers at most `limit` bytes per call.
///
/// Models a boundary that legitimately reports short counts, for exercising
/// the actual-count bookkeeping.
pub struct ShortCopy<T> {
    inner: T,
    limit: usize,
}

impl<T> ShortCopy<T> {
    #[must_use]
    pub fn new(inner: T, limit: usize) -> Self {
        Self { inner, limit }
    }
}

impl<T: CopySink> CopySink for ShortCopy<T> {
    fn copy_out(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.limit);
        self.inner.copy_out(&bytes[..n])
    }
}

impl<T: CopySource> CopySource for ShortCopy<T> {
    fn copy_in(&mut self, buffer: &mut [u8]) -> usize {
        let n = buffer.len().min(self.limit);
        self.inner.copy_in(&mut buffer[..n])
    }
}

// ============================================================
// EXPOSURE REGISTRAR
// ============================================================

/// Handle for one exposure registration, held by the vault while Active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

/// Makes vault data channels reachable from the host environment.
///
/// Implementations use interior mutability; registrar calls happen while
/// the target vault's guard is held.
pub trait ExposureRegistrar {
    /// Expose the data channel of the vault at `index` under a stable
    /// identifier. Fails with [`VaultError::AllocationFailed`] when the
    /// host-side resource cannot be obtained.
    fn expose(&self, index: usize) -> Result<RegistrationId>;

    /// Withdraw a previous registration
    fn withdraw(&self, registration: RegistrationId);
}

/// In-memory registrar for tests and embedding.
///
/// Records every exposure and withdrawal; clones share the same records.
#[derive(Default, Clone)]
pub struct MemoryRegistrar {
    inner: Arc<Mutex<RegistrarRecords>>,
}

#[derive(Default)]
struct RegistrarRecords {
    next_id: u64,
    /// Currently exposed registrations as (id, vault index)
    exposed: Vec<(u64, usize)>,
    expose_count: usize,
    withdraw_count: usize,
}

impl MemoryRegistrar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Vault indices currently exposed
    #[must_use]
    pub fn exposed_indices(&self) -> Vec<usize> {
        self.records().exposed.iter().map(|&(_, idx)| idx).collect()
    }

    /// Total number of expose calls (for testing)
    #[must_use]
    pub fn expose_count(&self) -> usize {
        self.records().expose_count
    }

    /// Total number of withdraw calls (for testing)
    #[must_use]
    pub fn withdraw_count(&self) -> usize {
        self.records().withdraw_count
    }

    fn records(&self) -> std::sync::MutexGuard<'_, RegistrarRecords> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExposureRegistrar for MemoryRegistrar {
    fn expose(&self, index: usize) -> Result<RegistrationId> {
        let mut records = self.records();
        let id = records.next_id;
        records.next_id += 1;
        records.exposed.push((id, index));
        records.expose_count += 1;
        Ok(RegistrationId(id))
    }

    fn withdraw(&self, registration: RegistrationId) {
        let mut records = self.records();
        records.exposed.retain(|&(id, _)| id != registration.0);
        records.withdraw_count += 1;
    }
}

/// Registrar whose expose calls always fail (for testing error paths)
#[derive(Default, Clone)]
pub struct FailingRegistrar;

impl ExposureRegistrar for FailingRegistrar {
    fn expose(&self, _index: usize) -> Result<RegistrationId> {
        Err(VaultError::AllocationFailed)
    }

    fn withdraw(&self, _registration: RegistrationId) {}
}
