//! Compute device abstraction.
//!
//! The reduction engine only needs a handful of capabilities from a device:
//! build a kernel, report its preferred work-group size, move buffers in and
//! out, launch one pass and wait for it. [`ComputeDevice`] captures exactly
//! that, so the same engine drives the host emulation and the CubeCL backends.

use std::fmt;

use crate::error::Result;

/// The two device kernels the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionKernel {
    /// Sum reduction; the last pass divides by `N`.
    Mean,
    /// Squared deviations from a mean on pass 0, sum reduction afterwards;
    /// the last pass divides by `N - 1`.
    Variance,
}

impl ReductionKernel {
    /// Entry point name of the kernel in the device program.
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::Mean => "mean_reduce_kernel",
            Self::Variance => "variance_reduce_kernel",
        }
    }

    /// Divisor applied on the final pass for a dataset of `n` elements.
    pub fn final_divisor(self, n: u32) -> u32 {
        match self {
            Self::Mean => n,
            Self::Variance => n.saturating_sub(1),
        }
    }
}

impl fmt::Display for ReductionKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

/// NDRange of one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Total work-items, a multiple of `local_size`.
    pub global_size: usize,
    /// Work-group size.
    pub local_size: usize,
}

impl LaunchConfig {
    /// Number of work-groups in the launch.
    pub fn work_groups(&self) -> usize {
        self.global_size / self.local_size
    }
}

/// Scalar arguments bound to a reduction kernel for one pass.
///
/// Every field is set for every pass; nothing carries over from the
/// previous launch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassArgs {
    /// Index of the pass in the chain.
    pub pass_index: u32,
    /// Whether the kernel must apply the final divisor.
    pub is_last_pass: bool,
    /// Original, unpadded dataset length.
    pub n: u32,
    /// Logical element count of the input; reads at or past it yield 0.
    pub elements_to_reduce: u32,
    /// Local scratch size in elements (equals the work-group size).
    pub local_scratch: usize,
    /// Mean to subtract; only bound for [`ReductionKernel::Variance`].
    pub mean: Option<f32>,
}

/// A device able to run the reduction kernels.
///
/// Launches issued through one device execute in order. Implementations
/// must write exactly `launch.work_groups()` partials into `output` per
/// [`enqueue`](ComputeDevice::enqueue).
pub trait ComputeDevice {
    /// Device-resident `f32` buffer.
    type Buffer;

    /// Human readable device name.
    fn name(&self) -> String;

    /// Build the device program for `kernel`.
    ///
    /// # Errors
    ///
    /// [`GpuError::BuildFailed`](crate::GpuError::BuildFailed) with the build
    /// log when compilation fails.
    fn build(&self, kernel: ReductionKernel) -> Result<()>;

    /// Preferred work-group size for `kernel` on this device.
    fn preferred_work_group_size(&self, kernel: ReductionKernel) -> Result<usize>;

    /// Whether `kernel` can be launched with work-groups of `w` units.
    fn supports_work_group_size(&self, _kernel: ReductionKernel, w: usize) -> bool {
        w > 0
    }

    /// Upload `data` into a new read-only buffer.
    fn create_buffer(&self, data: &[f32]) -> Result<Self::Buffer>;

    /// Allocate a zero-initialised read-write buffer of `len` elements.
    fn allocate(&self, len: usize) -> Result<Self::Buffer>;

    /// Launch one reduction pass reading `input` and writing `output`.
    fn enqueue(
        &self,
        kernel: ReductionKernel,
        launch: LaunchConfig,
        input: &Self::Buffer,
        output: &Self::Buffer,
        args: &PassArgs,
    ) -> Result<()>;

    /// Block until every enqueued launch has completed.
    fn finish(&self) -> Result<()>;

    /// Read `len` elements starting at `offset` back to the host.
    fn read_buffer(&self, buffer: &Self::Buffer, offset: usize, len: usize) -> Result<Vec<f32>>;
}
