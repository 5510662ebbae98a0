//! Error types for multi-pass reductions.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for reduction operations.
pub type Result<T> = std::result::Result<T, GpuError>;

/// Coarse classification of a [`GpuError`].
///
/// Every failure aborts the enclosing computation; the kind only tells the
/// caller which layer gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid sizes or settings, detected before any device work.
    Configuration,
    /// The device program could not be compiled.
    Build,
    /// A kernel failed to launch or run.
    Execution,
    /// Allocation, transfer or synchronization failed in the host library.
    HostLibrary,
}

/// Error types that can occur while planning or running a reduction.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Degenerate sizes (N == 0, W == 0, ...) or an invalid engine setting.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Device program failed to build.
    #[error("Kernel build failed on {device}:\n{log}")]
    BuildFailed {
        /// Name of the device the program was built for
        device: String,
        /// Build log, verbatim
        log: String,
    },

    /// Kernel enqueue or execution failed.
    #[error("Kernel execution failed: {0}")]
    KernelExecutionFailed(String),

    /// Out of device memory.
    #[error("Out of GPU memory: {0}")]
    OutOfMemory(String),

    /// Invalid buffer size or range.
    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Expected buffer size
        expected: usize,
        /// Actual buffer size
        actual: usize,
    },

    /// Memory transfer failed (host ↔ device).
    #[error("Memory transfer failed: {0}")]
    MemoryTransferFailed(String),

    /// Device synchronization failed.
    #[error("Device synchronization failed: {0}")]
    SynchronizationFailed(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GpuError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) | Self::Config(_) => ErrorKind::Configuration,
            Self::BuildFailed { .. } => ErrorKind::Build,
            Self::KernelExecutionFailed(_) => ErrorKind::Execution,
            Self::OutOfMemory(_)
            | Self::InvalidBufferSize { .. }
            | Self::MemoryTransferFailed(_)
            | Self::SynchronizationFailed(_) => ErrorKind::HostLibrary,
        }
    }

    /// Build log attached to a [`GpuError::BuildFailed`], if any.
    pub fn build_log(&self) -> Option<&str> {
        match self {
            Self::BuildFailed { log, .. } => Some(log),
            _ => None,
        }
    }
}
