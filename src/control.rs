//! Control channel: fixed-layout command decoding and dispatch.
//!
//! The privileged control endpoint receives one message per lifecycle
//! command. The numeric command codes and the NUL-padded key layout live
//! only here; the core API takes the decoded [`VaultCommand`].
//!
//! # Wire format
//!
//! Payload, [`CONTROL_PAYLOAD_SIZE`] bytes:
//!
//! ```text
//! offset  0..11   key     NUL-padded, last byte forced to NUL
//! offset 11..19   size    u64 little-endian, meaningful only for Create
//! offset 19..23   device  u32 little-endian vault index
//! ```
//!
//! Command codes: `0 = Create`, `1 = ChangeKey`, `5 = Erase`, `3 = Delete`.
//! The non-contiguous numbering is part of the wire contract.
//!
//! The response is a single signed code: `0` for success, a negative value
//! from [`error_code`] otherwise.

use crate::boundary::ExposureRegistrar;
use crate::error::{Result, VaultError};
use crate::guard::CancelToken;
use crate::keystream::KEY_SIZE;
use crate::lifecycle::VaultController;
use crate::vault::{OwnerId, VaultKey};

/// Key field length on the wire: the key plus one NUL terminator byte
pub const WIRE_KEY_SIZE: usize = KEY_SIZE + 1;

/// Total payload length of a control message
pub const CONTROL_PAYLOAD_SIZE: usize = WIRE_KEY_SIZE + 8 + 4;

/// Wire code for Create
pub const CMD_CREATE: u32 = 0;
/// Wire code for ChangeKey
pub const CMD_CHANGE_KEY: u32 = 1;
/// Wire code for Erase
pub const CMD_ERASE: u32 = 5;
/// Wire code for Delete
pub const CMD_DELETE: u32 = 3;

/// A decoded control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultCommand {
    /// Create the vault at `index` with `capacity` bytes and `key`
    Create {
        index: usize,
        capacity: u64,
        key: VaultKey,
    },
    /// Replace the key of the vault at `index`
    ChangeKey { index: usize, key: VaultKey },
    /// Zero the contents of the vault at `index`
    Erase { index: usize },
    /// Tear down the vault at `index`
    Delete { index: usize },
}

impl VaultCommand {
    /// Decode a control message from its command code and payload.
    ///
    /// Fails with [`VaultError::MalformedRequest`] on a wrong payload
    /// length or an unknown command code. Index bounds are not checked
    /// here; the pool rejects them with `OutOfRange`.
    pub fn decode(code: u32, payload: &[u8]) -> Result<Self> {
        if payload.len() != CONTROL_PAYLOAD_SIZE {
            return Err(VaultError::MalformedRequest);
        }

        let mut key_bytes = [0u8; WIRE_KEY_SIZE];
        key_bytes.copy_from_slice(&payload[..WIRE_KEY_SIZE]);
        // The terminator byte is never key material
        key_bytes[KEY_SIZE] = 0;
        let key = VaultKey::from_padded(&key_bytes[..KEY_SIZE]);

        let size_bytes: [u8; 8] = payload[WIRE_KEY_SIZE..WIRE_KEY_SIZE + 8]
            .try_into()
            .map_err(|_| VaultError::MalformedRequest)?;
        let capacity = u64::from_le_bytes(size_bytes);

        let device_bytes: [u8; 4] = payload[WIRE_KEY_SIZE + 8..]
            .try_into()
            .map_err(|_| VaultError::MalformedRequest)?;
        let index = u32::from_le_bytes(device_bytes) as usize;

        match code {
            CMD_CREATE => Ok(Self::Create {
                index,
                capacity,
                key,
            }),
            CMD_CHANGE_KEY => Ok(Self::ChangeKey { index, key }),
            CMD_ERASE => Ok(Self::Erase { index }),
            CMD_DELETE => Ok(Self::Delete { index }),
            _ => {
                log::warn!("received unknown control code {code:#x}");
                Err(VaultError::MalformedRequest)
            }
        }
    }

    /// Wire code of this command
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::Create { .. } => CMD_CREATE,
            Self::ChangeKey { .. } => CMD_CHANGE_KEY,
            Self::Erase { .. } => CMD_ERASE,
            Self::Delete { .. } => CMD_DELETE,
        }
    }

    /// Target vault index
    #[must_use]
    pub fn index(&self) -> usize {
        match *self {
            Self::Create { index, .. }
            | Self::ChangeKey { index, .. }
            | Self::Erase { index }
            | Self::Delete { index } => index,
        }
    }

    /// Encode this command's payload (for clients and tests)
    #[must_use]
    pub fn encode(&self) -> [u8; CONTROL_PAYLOAD_SIZE] {
        let mut payload = [0u8; CONTROL_PAYLOAD_SIZE];
        let (key, capacity) = match self {
            Self::Create { capacity, key, .. } => (Some(key), *capacity),
            Self::ChangeKey { key, .. } => (Some(key), 0),
            Self::Erase { .. } | Self::Delete { .. } => (None, 0),
        };
        if let Some(key) = key {
            payload[..KEY_SIZE].copy_from_slice(key.as_bytes());
        }
        payload[WIRE_KEY_SIZE..WIRE_KEY_SIZE + 8].copy_from_slice(&capacity.to_le_bytes());
        payload[WIRE_KEY_SIZE + 8..].copy_from_slice(&(self.index() as u32).to_le_bytes());
        payload
    }
}

/// Signed wire code for an error response
#[must_use]
pub fn error_code(err: &VaultError) -> i32 {
    match err {
        VaultError::PermissionDenied => -1,
        VaultError::NotActive => -2,
        VaultError::AlreadyActive => -3,
        VaultError::InvalidSize(_) => -4,
        VaultError::OutOfRange => -5,
        VaultError::AllocationFailed => -6,
        VaultError::Interrupted => -7,
        VaultError::MalformedRequest => -8,
    }
}

/// Decode and execute one control request; returns the wire response code
/// (`0` on success, negative on failure).
pub fn handle_request<R: ExposureRegistrar>(
    controller: &VaultController<R>,
    code: u32,
    payload: &[u8],
    owner: OwnerId,
    token: &CancelToken,
) -> i32 {
    let outcome =
        VaultCommand::decode(code, payload).and_then(|cmd| controller.execute(cmd, owner, token));

    match outcome {
        Ok(()) => 0,
        Err(err) => {
            log::warn!("control request failed: {err}");
            error_code(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::MemoryRegistrar;
    use crate::config::VaultConfig;
    use crate::pool::VaultPool;
    use crate::vault::VaultStatus;
    use std::sync::Arc;

    const OWNER: OwnerId = OwnerId(1000);

    #[test]
    fn test_decode_create() {
        let mut payload = [0u8; CONTROL_PAYLOAD_SIZE];
        payload[..5].copy_from_slice(b"ABCDE");
        payload[WIRE_KEY_SIZE..WIRE_KEY_SIZE + 8].copy_from_slice(&64u64.to_le_bytes());
        payload[WIRE_KEY_SIZE + 8..].copy_from_slice(&2u32.to_le_bytes());

        let cmd = VaultCommand::decode(CMD_CREATE, &payload).unwrap();
        assert_eq!(
            cmd,
            VaultCommand::Create {
                index: 2,
                capacity: 64,
                key: VaultKey::from_padded(b"ABCDE"),
            }
        );
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(
            VaultCommand::decode(CMD_CREATE, &[0u8; CONTROL_PAYLOAD_SIZE - 1]),
            Err(VaultError::MalformedRequest)
        );
        assert_eq!(
            VaultCommand::decode(CMD_CREATE, &[0u8; CONTROL_PAYLOAD_SIZE + 1]),
            Err(VaultError::MalformedRequest)
        );
    }

    #[test]
    fn test_decode_rejects_unknown_code() {
        let payload = [0u8; CONTROL_PAYLOAD_SIZE];
        for code in [2, 4, 6, 0xFF] {
            assert_eq!(
                VaultCommand::decode(code, &payload),
                Err(VaultError::MalformedRequest)
            );
        }
    }

    #[test]
    fn test_wire_codes_are_noncontiguous_contract() {
        assert_eq!(CMD_CREATE, 0);
        assert_eq!(CMD_CHANGE_KEY, 1);
        assert_eq!(CMD_ERASE, 5);
        assert_eq!(CMD_DELETE, 3);
    }

    #[test]
    fn test_terminator_byte_is_ignored() {
        // A payload whose 11th key byte is garbage decodes to the same key
        let mut payload = [0u8; CONTROL_PAYLOAD_SIZE];
        payload[..3].copy_from_slice(b"KEY");
        payload[KEY_SIZE] = 0xFF;

        let cmd = VaultCommand::decode(CMD_CHANGE_KEY, &payload).unwrap();
        assert_eq!(
            cmd,
            VaultCommand::ChangeKey {
                index: 0,
                key: VaultKey::from_padded(b"KEY"),
            }
        );
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let cmd = VaultCommand::Create {
            index: 3,
            capacity: 512,
            key: VaultKey::from_padded(b"roundtrip"),
        };
        assert_eq!(
            VaultCommand::decode(cmd.code(), &cmd.encode()).unwrap(),
            cmd
        );

        let cmd = VaultCommand::Erase { index: 1 };
        assert_eq!(
            VaultCommand::decode(cmd.code(), &cmd.encode()).unwrap(),
            cmd
        );
    }

    #[test]
    fn test_handle_request_full_cycle() {
        let pool = Arc::new(VaultPool::new(VaultConfig::default()));
        let controller = VaultController::new(pool, MemoryRegistrar::new());
        let token = CancelToken::new();

        let create = VaultCommand::Create {
            index: 0,
            capacity: 32,
            key: VaultKey::from_padded(b"wire"),
        };
        assert_eq!(
            handle_request(&controller, create.code(), &create.encode(), OWNER, &token),
            0
        );

        let state = controller.pool().slot(0).unwrap().lock(&token).unwrap();
        assert_eq!(state.status(), VaultStatus::Active);
        drop(state);

        // Deleting as a different owner surfaces the permission code
        let delete = VaultCommand::Delete { index: 0 };
        assert_eq!(
            handle_request(
                &controller,
                delete.code(),
                &delete.encode(),
                OwnerId(9),
                &token
            ),
            error_code(&VaultError::PermissionDenied)
        );

        assert_eq!(
            handle_request(&controller, delete.code(), &delete.encode(), OWNER, &token),
            0
        );
    }

    #[test]
    fn test_handle_request_malformed() {
        let pool = Arc::new(VaultPool::new(VaultConfig::default()));
        let controller = VaultController::new(pool, MemoryRegistrar::new());
        let token = CancelToken::new();

        assert_eq!(
            handle_request(&controller, CMD_CREATE, &[1, 2, 3], OWNER, &token),
            error_code(&VaultError::MalformedRequest)
        );
    }

    #[test]
    fn test_error_codes_are_negative_and_distinct() {
        let errors = [
            VaultError::PermissionDenied,
            VaultError::NotActive,
            VaultError::AlreadyActive,
            VaultError::InvalidSize(0),
            VaultError::OutOfRange,
            VaultError::AllocationFailed,
            VaultError::Interrupted,
            VaultError::MalformedRequest,
        ];
        let codes: Vec<i32> = errors.iter().map(error_code).collect();
        assert!(codes.iter().all(|&c| c < 0));
        let mut deduped = codes.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len());
    }
}
