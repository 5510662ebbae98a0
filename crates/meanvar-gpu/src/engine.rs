//! Mean and sample variance over arbitrarily large datasets.
//!
//! Each `compute_*` call plans the pass chain for the dataset length, stages
//! three device buffers, runs every pass through a [`ReductionDispatcher`]
//! and reads the scalar back from index 0 of the last pass's output. Nothing
//! is cached between calls.
//!
//! # Example
//!
//! ```
//! use meanvar_gpu::{AggregateEngine, HostDevice};
//!
//! let engine = AggregateEngine::new(HostDevice::new())?;
//! let data = vec![1.0f32, 2.0, 3.0, 4.0];
//! let mean = engine.compute_mean(&data)?;
//! let var = engine.compute_variance(&data, mean)?;
//! assert_eq!(mean, 2.5);
//! assert!((var - 5.0 / 3.0).abs() < 1e-6);
//! # Ok::<(), meanvar_gpu::GpuError>(())
//! ```

use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::device::{ComputeDevice, ReductionKernel};
use crate::dispatch::ReductionDispatcher;
use crate::error::{GpuError, Result};
use crate::memory::StagingBuffers;
use crate::plan::{plan_with_cap, ReductionPlan};

/// Mean and sample variance of one dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanVariance {
    /// Arithmetic mean.
    pub mean: f32,
    /// Sample variance (divided by `N - 1`).
    pub variance: f32,
}

/// Runs multi-pass reductions on a [`ComputeDevice`].
///
/// Work-group sizes are fixed when the engine is created, one per kernel.
pub struct AggregateEngine<D: ComputeDevice> {
    device: D,
    config: EngineConfig,
    mean_work_group_size: usize,
    variance_work_group_size: usize,
}

impl<D: ComputeDevice> AggregateEngine<D> {
    /// Engine with the default configuration.
    pub fn new(device: D) -> Result<Self> {
        Self::with_config(device, EngineConfig::default())
    }

    /// Build both kernels on `device` and fix their work-group sizes.
    ///
    /// # Errors
    ///
    /// [`GpuError::BuildFailed`] when a kernel does not compile,
    /// [`GpuError::InvalidConfiguration`] for an invalid config, a zero
    /// work-group size or one the device cannot launch.
    pub fn with_config(device: D, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let mut sizes = [0usize; 2];
        for (slot, kernel, configured) in [
            (0, ReductionKernel::Mean, config.mean_work_group_size),
            (1, ReductionKernel::Variance, config.variance_work_group_size),
        ] {
            device.build(kernel)?;
            let w = match configured {
                Some(w) => w,
                None => device.preferred_work_group_size(kernel)?,
            };
            if w == 0 {
                return Err(GpuError::InvalidConfiguration(format!(
                    "{} reported a zero work-group size for {kernel}",
                    device.name()
                )));
            }
            if !device.supports_work_group_size(kernel, w) {
                return Err(GpuError::InvalidConfiguration(format!(
                    "{} cannot launch {kernel} with work-group size {w}",
                    device.name()
                )));
            }
            sizes[slot] = w;
        }

        info!(
            device = %device.name(),
            mean_w = sizes[0],
            variance_w = sizes[1],
            "reduction engine ready"
        );

        Ok(Self {
            device,
            config,
            mean_work_group_size: sizes[0],
            variance_work_group_size: sizes[1],
        })
    }

    /// Underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Work-group size used for `kernel`.
    pub fn work_group_size(&self, kernel: ReductionKernel) -> usize {
        match kernel {
            ReductionKernel::Mean => self.mean_work_group_size,
            ReductionKernel::Variance => self.variance_work_group_size,
        }
    }

    /// Plan `kernel` would run for a dataset of `n` elements.
    pub fn plan_for(&self, kernel: ReductionKernel, n: usize) -> Result<ReductionPlan> {
        plan_with_cap(n, self.work_group_size(kernel), self.config.max_passes)
    }

    /// Arithmetic mean of `data`.
    #[instrument(skip(self, data), fields(n = data.len(), w = self.mean_work_group_size))]
    pub fn compute_mean(&self, data: &[f32]) -> Result<f32> {
        self.reduce(ReductionKernel::Mean, data, None)
    }

    /// Sample variance of `data` around `mean`.
    ///
    /// `mean` must be the mean of `data` (from [`compute_mean`] or an
    /// external reference). A different value is not detected: the result
    /// is then the mean squared deviation from that value, scaled by
    /// `N / (N - 1)`.
    ///
    /// [`compute_mean`]: AggregateEngine::compute_mean
    #[instrument(skip(self, data), fields(n = data.len(), w = self.variance_work_group_size))]
    pub fn compute_variance(&self, data: &[f32], mean: f32) -> Result<f32> {
        if data.len() < 2 {
            return Err(GpuError::InvalidConfiguration(format!(
                "sample variance needs at least 2 elements, got {}",
                data.len()
            )));
        }
        self.reduce(ReductionKernel::Variance, data, Some(mean))
    }

    /// Sum of `data`, derived from the mean.
    pub fn compute_sum(&self, data: &[f32]) -> Result<f32> {
        Ok(self.compute_mean(data)? * data.len() as f32)
    }

    /// Mean, then sample variance around it.
    pub fn compute_mean_variance(&self, data: &[f32]) -> Result<MeanVariance> {
        let mean = self.compute_mean(data)?;
        let variance = self.compute_variance(data, mean)?;
        Ok(MeanVariance { mean, variance })
    }

    fn reduce(&self, kernel: ReductionKernel, data: &[f32], mean: Option<f32>) -> Result<f32> {
        let plan = self.plan_for(kernel, data.len())?;
        info!(
            "number of required kernel launches = {} (for N = {}, work group size = {})",
            plan.pass_count(),
            plan.n(),
            plan.work_group_size()
        );

        let buffers = StagingBuffers::allocate(&self.device, &plan, data)?;
        let dispatcher = ReductionDispatcher::new(&self.device, kernel, &plan, mean);
        for pass in plan.passes() {
            dispatcher.dispatch(&buffers, &pass)?;
        }

        let last = plan.pass_count() - 1;
        let result = self.device.read_buffer(buffers.destination(last), 0, 1)?;
        result.first().copied().ok_or(GpuError::InvalidBufferSize {
            expected: 1,
            actual: 0,
        })
    }
}
