//! CubeCL runtime wrapper for GPU execution.
//!
//! [`RuntimeContext`] owns a CubeCL compute client and implements
//! [`ComputeDevice`](crate::ComputeDevice) on top of it (see [`crate::ops`]).

use crate::error::{GpuError, Result};
use cubecl::prelude::*;
use cubecl::server::Handle;
use std::marker::PhantomData;

// Re-export CubeCL's Runtime trait so downstream crates don't need cubecl directly
pub use cubecl::Runtime as CubeclRuntime;

/// Work-group size used unless overridden; the common GPU block size.
pub const DEFAULT_GPU_WORK_GROUP_SIZE: usize = 256;

/// GPU runtime context with CubeCL client.
pub struct RuntimeContext<R: Runtime> {
    client: ComputeClient<R::Server, R::Channel>,
    work_group_size: usize,
    _phantom: PhantomData<R>,
}

impl<R: Runtime> RuntimeContext<R> {
    /// Create a new runtime context with the specified device.
    pub fn new(device: R::Device) -> Self {
        Self {
            client: R::client(&device),
            work_group_size: DEFAULT_GPU_WORK_GROUP_SIZE,
            _phantom: PhantomData,
        }
    }

    /// Use `size` as the work-group size reported for both kernels.
    ///
    /// # Errors
    ///
    /// The shared-memory tree in the kernels needs a power of two.
    pub fn with_work_group_size(mut self, size: usize) -> Result<Self> {
        if !size.is_power_of_two() {
            return Err(GpuError::InvalidConfiguration(format!(
                "GPU work-group size must be a power of two, got {size}"
            )));
        }
        self.work_group_size = size;
        Ok(self)
    }

    /// Get a reference to the compute client.
    pub fn client(&self) -> &ComputeClient<R::Server, R::Channel> {
        &self.client
    }

    /// Work-group size reported to the engine.
    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    /// Get the backend name (e.g. "cuda", "wgpu<wgsl>").
    pub fn backend_name(&self) -> &'static str {
        R::name()
    }

    /// Get memory device properties (max page size, alignment).
    pub fn memory_properties(&self) -> (u64, u64) {
        let props = self.client.properties();
        let mem = props.memory_properties();
        (mem.max_page_size, mem.alignment)
    }

    /// Synchronize all pending GPU operations.
    ///
    /// `client.read()` is a blocking sync point in CubeCL: reading a tiny
    /// buffer forces every enqueued kernel to complete.
    pub fn sync(&self) {
        let handle = self.client.empty(1);
        let _ = self.client.read(handle.binding());
    }
}

/// Device buffer of `f32` elements.
pub struct GpuBuffer<R: Runtime> {
    handle: Handle,
    len: usize,
    _phantom: PhantomData<R>,
}

impl<R: Runtime> GpuBuffer<R> {
    /// Wrap a handle holding `len` elements.
    pub fn from_handle(handle: Handle, len: usize) -> Self {
        Self {
            handle,
            len,
            _phantom: PhantomData,
        }
    }

    /// Get the total number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get a reference to the underlying handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Initialize a CUDA runtime on device 0.
#[cfg(feature = "cuda")]
pub fn init_cuda_runtime() -> Result<RuntimeContext<cubecl_cuda::CudaRuntime>> {
    use cubecl_cuda::CudaDevice;

    let device = CudaDevice::new(0);
    Ok(RuntimeContext::new(device))
}

/// Initialize a WGPU runtime with the best available adapter.
#[cfg(feature = "wgpu")]
pub fn init_wgpu_runtime() -> Result<RuntimeContext<cubecl_wgpu::WgpuRuntime>> {
    use cubecl_wgpu::WgpuDevice;

    let device = WgpuDevice::BestAvailable;
    Ok(RuntimeContext::new(device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "cuda")]
    fn test_cuda_runtime_init() {
        if let Ok(runtime) = init_cuda_runtime() {
            println!("Backend: {}", runtime.backend_name());
            assert_eq!(runtime.work_group_size(), DEFAULT_GPU_WORK_GROUP_SIZE);
            runtime.sync();
        }
    }

    #[test]
    #[cfg(feature = "wgpu")]
    fn test_wgpu_runtime_init() {
        if let Ok(runtime) = init_wgpu_runtime() {
            println!("Backend: {}", runtime.backend_name());
            assert!(runtime.with_work_group_size(100).is_err());
        }
    }
}
