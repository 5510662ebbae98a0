//! Host emulation of the reduction kernels.
//!
//! [`HostDevice`] runs the same kernel contract as the GPU backends on the
//! CPU: one partial per work-group, each group tree-reduced in a scratch
//! array of `W` elements. Work-groups are independent and may run in
//! parallel.

use std::sync::RwLock;

use rayon::prelude::*;

use crate::device::{ComputeDevice, LaunchConfig, PassArgs, ReductionKernel};
use crate::error::{GpuError, Result};

/// Work-group size reported by [`HostDevice::new`].
pub const DEFAULT_HOST_WORK_GROUP_SIZE: usize = 256;

/// How work-groups of one launch are scheduled on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// One work-group after the other on the calling thread.
    Serial,
    /// Work-groups spread over the rayon thread pool.
    #[default]
    ParallelGroups,
}

/// Host memory standing in for a device buffer.
///
/// The length is fixed at allocation; launches only overwrite elements.
#[derive(Debug)]
pub struct HostBuffer {
    data: RwLock<Vec<f32>>,
    len: usize,
}

impl HostBuffer {
    fn new(data: Vec<f32>) -> Self {
        let len = data.len();
        Self { data: RwLock::new(data), len }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// CPU device implementing the reduction kernel contract.
#[derive(Debug, Clone)]
pub struct HostDevice {
    mean_work_group_size: usize,
    variance_work_group_size: usize,
    strategy: ExecutionStrategy,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    /// Host device reporting [`DEFAULT_HOST_WORK_GROUP_SIZE`] for both kernels.
    pub fn new() -> Self {
        Self::with_work_group_sizes(DEFAULT_HOST_WORK_GROUP_SIZE, DEFAULT_HOST_WORK_GROUP_SIZE)
    }

    /// Host device reporting distinct work-group sizes per kernel.
    pub fn with_work_group_sizes(mean: usize, variance: usize) -> Self {
        Self {
            mean_work_group_size: mean,
            variance_work_group_size: variance,
            strategy: ExecutionStrategy::default(),
        }
    }

    /// Choose how work-groups are scheduled.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Scheduling strategy in use.
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }
}

fn lock_poisoned(what: &str) -> GpuError {
    GpuError::SynchronizationFailed(format!("{what} buffer lock poisoned"))
}

/// Reduce work-group `group` of a launch to its partial.
fn reduce_group(
    kernel: ReductionKernel,
    input: &[f32],
    group: usize,
    work_group_size: usize,
    args: &PassArgs,
) -> f32 {
    let elements = args.elements_to_reduce as usize;
    let n = args.n as usize;
    let mean = args.mean.unwrap_or(0.0);
    let squares = kernel == ReductionKernel::Variance && args.pass_index == 0;

    let mut scratch = vec![0.0f32; work_group_size];
    for (local, slot) in scratch.iter_mut().enumerate() {
        let gid = group * work_group_size + local;
        let value = if gid < elements { input[gid] } else { 0.0 };
        *slot = if !squares {
            value
        } else if gid < n {
            let d = value - mean;
            d * d
        } else {
            0.0
        };
    }

    // Halving tree; the upper half folds into the lower half, odd sizes keep
    // the middle element for the next round.
    let mut active = work_group_size;
    while active > 1 {
        let half = active.div_ceil(2);
        for i in 0..active - half {
            scratch[i] += scratch[i + half];
        }
        active = half;
    }

    let total = scratch[0];
    if args.is_last_pass {
        total / kernel.final_divisor(args.n) as f32
    } else {
        total
    }
}

impl ComputeDevice for HostDevice {
    type Buffer = HostBuffer;

    fn name(&self) -> String {
        format!("host ({:?})", self.strategy)
    }

    fn build(&self, _kernel: ReductionKernel) -> Result<()> {
        Ok(())
    }

    fn preferred_work_group_size(&self, kernel: ReductionKernel) -> Result<usize> {
        Ok(match kernel {
            ReductionKernel::Mean => self.mean_work_group_size,
            ReductionKernel::Variance => self.variance_work_group_size,
        })
    }

    fn create_buffer(&self, data: &[f32]) -> Result<HostBuffer> {
        Ok(HostBuffer::new(data.to_vec()))
    }

    fn allocate(&self, len: usize) -> Result<HostBuffer> {
        Ok(HostBuffer::new(vec![0.0; len]))
    }

    fn enqueue(
        &self,
        kernel: ReductionKernel,
        launch: LaunchConfig,
        input: &HostBuffer,
        output: &HostBuffer,
        args: &PassArgs,
    ) -> Result<()> {
        let w = launch.local_size;
        if w == 0 || launch.global_size % w != 0 {
            return Err(GpuError::KernelExecutionFailed(format!(
                "global size {} is not a multiple of local size {}",
                launch.global_size, w
            )));
        }
        if args.local_scratch != w {
            return Err(GpuError::KernelExecutionFailed(format!(
                "local scratch of {} elements does not match work-group size {}",
                args.local_scratch, w
            )));
        }
        if kernel == ReductionKernel::Variance && args.mean.is_none() {
            return Err(GpuError::KernelExecutionFailed(format!(
                "{kernel}: mean argument not bound"
            )));
        }
        if std::ptr::eq(input, output) {
            return Err(GpuError::KernelExecutionFailed(
                "input and output buffers alias".to_string(),
            ));
        }

        let groups = launch.work_groups();
        let partials: Vec<f32> = {
            let guard = input.data.read().map_err(|_| lock_poisoned("input"))?;
            let input: &[f32] = &guard;
            if input.len() < args.elements_to_reduce as usize {
                return Err(GpuError::KernelExecutionFailed(format!(
                    "input holds {} elements, pass reads {}",
                    input.len(),
                    args.elements_to_reduce
                )));
            }
            match self.strategy {
                ExecutionStrategy::Serial => (0..groups)
                    .map(|g| reduce_group(kernel, input, g, w, args))
                    .collect(),
                ExecutionStrategy::ParallelGroups => (0..groups)
                    .into_par_iter()
                    .map(|g| reduce_group(kernel, input, g, w, args))
                    .collect(),
            }
        };

        let mut output = output.data.write().map_err(|_| lock_poisoned("output"))?;
        if output.len() < groups {
            return Err(GpuError::KernelExecutionFailed(format!(
                "output holds {} elements, launch writes {}",
                output.len(),
                groups
            )));
        }
        output[..groups].copy_from_slice(&partials);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        // Launches complete before `enqueue` returns.
        Ok(())
    }

    fn read_buffer(&self, buffer: &HostBuffer, offset: usize, len: usize) -> Result<Vec<f32>> {
        let data = buffer.data.read().map_err(|_| lock_poisoned("read-back"))?;
        let end = offset.checked_add(len).unwrap_or(usize::MAX);
        if end > data.len() {
            return Err(GpuError::InvalidBufferSize { expected: end, actual: data.len() });
        }
        Ok(data[offset..end].to_vec())
    }
}
