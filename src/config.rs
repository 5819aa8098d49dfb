//! Vault pool configuration
//!
//! Allows configuring pool limits (in test builds).

/// Pool limit values
#[derive(Clone, Copy, Debug)]
pub struct VaultLimits {
    /// Number of vault slots in the pool
    pub n_vaults: usize,
    /// Maximum capacity of a single vault in bytes
    pub max_capacity: u64,
}

impl VaultLimits {
    /// Production values (4 slots, 1 MiB vaults)
    pub const PROD: Self = Self {
        n_vaults: 4,
        max_capacity: 1_048_576, // 1 MiB
    };

    /// Test values for fast tests (4 slots, 4 KiB vaults)
    pub const TEST: Self = Self {
        n_vaults: 4,
        max_capacity: 4096,
    };

    /// Tiny values for unit tests (very fast)
    pub const TINY: Self = Self {
        n_vaults: 2,
        max_capacity: 64,
    };
}

impl Default for VaultLimits {
    fn default() -> Self {
        #[cfg(any(test, feature = "test-constants"))]
        { Self::TEST }
        #[cfg(not(any(test, feature = "test-constants")))]
        { Self::PROD }
    }
}

/// Vault pool configuration
#[derive(Clone, Copy, Debug)]
pub struct VaultConfig {
    /// Limit values (only used in test builds; production always uses PROD)
    #[cfg(any(test, feature = "test-constants"))]
    limit_values: VaultLimits,
}

impl VaultConfig {
    /// Create config with default limit values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config with custom limit values (test builds only)
    /// In production builds, limit values are always PROD
    #[cfg(any(test, feature = "test-constants"))]
    pub fn with_limits(limits: VaultLimits) -> Self {
        Self {
            limit_values: limits,
        }
    }

    /// Get limit values
    /// In production, always returns PROD values regardless of what was set
    pub fn limits(&self) -> &VaultLimits {
        #[cfg(any(test, feature = "test-constants"))]
        { &self.limit_values }
        #[cfg(not(any(test, feature = "test-constants")))]
        { &VaultLimits::PROD }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            #[cfg(any(test, feature = "test-constants"))]
            limit_values: VaultLimits::default(),
        }
    }
}
