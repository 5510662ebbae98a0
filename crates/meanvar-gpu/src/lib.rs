//! Multi-pass parallel reductions on work-group based compute devices.
//!
//! This crate computes the mean and sample variance of `f32` datasets far
//! larger than one work-group by chaining partial-reduction passes whose
//! count and shapes are derived from the dataset length and the device's
//! work-group size.
//!
//! # Features
//!
//! - **Planned passes**: [`plan`] sizes every pass and staging buffer up front
//! - **Bounded memory**: three device buffers per computation, reused ping-pong
//! - **Pluggable devices**: [`HostDevice`] on the CPU, CubeCL on the GPU
//!
//! # Feature Flags
//!
//! - `gpu`: CubeCL kernels and the [`ComputeDevice`] implementation over CubeCL
//! - `cuda`: Enable CUDA backend (NVIDIA GPUs)
//! - `wgpu`: Enable WGPU backend (Vulkan/Metal/DirectX12)
//!
//! # Examples
//!
//! ```rust,ignore
//! use meanvar_gpu::{init_wgpu_runtime, AggregateEngine};
//!
//! let engine = AggregateEngine::new(init_wgpu_runtime()?)?;
//! let mean = engine.compute_mean(&data)?;
//! let var = engine.compute_variance(&data, mean)?;
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod device;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod host;
pub mod memory;
pub mod plan;
pub mod reference;

#[cfg(feature = "gpu")]
pub mod runtime;

#[cfg(feature = "gpu")]
pub mod kernels;

#[cfg(feature = "gpu")]
pub mod ops;

#[cfg(test)]
mod tests;

// Re-exports
pub use config::{ConfigError, EngineConfig};
pub use device::{ComputeDevice, LaunchConfig, PassArgs, ReductionKernel};
pub use dispatch::ReductionDispatcher;
pub use engine::{AggregateEngine, MeanVariance};
pub use error::{ErrorKind, GpuError, Result};
pub use host::{ExecutionStrategy, HostBuffer, HostDevice};
pub use memory::StagingBuffers;
pub use plan::{plan, plan_with_cap, PassShape, ReductionPlan};
pub use reference::{compare, host_mean, host_variance, relative_error, Comparison, MetricCheck};

#[cfg(feature = "gpu")]
pub use runtime::*;
