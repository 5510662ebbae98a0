//! [`ComputeDevice`] over a CubeCL runtime.
//!
//! Launches the kernels in [`crate::kernels::reduction`] with one cube per
//! work-group. CubeCL compiles kernels lazily on first launch, so
//! [`ComputeDevice::build`] only validates the launch shape.

use crate::device::{ComputeDevice, LaunchConfig, PassArgs, ReductionKernel};
use crate::error::{GpuError, Result};
use crate::kernels::reduction::{mean_reduce_kernel, variance_reduce_kernel};
use crate::runtime::{GpuBuffer, RuntimeContext};
use cubecl::prelude::*;

impl<R: Runtime> ComputeDevice for RuntimeContext<R> {
    type Buffer = GpuBuffer<R>;

    fn name(&self) -> String {
        self.backend_name().to_string()
    }

    fn build(&self, kernel: ReductionKernel) -> Result<()> {
        if !self.work_group_size().is_power_of_two() {
            return Err(GpuError::BuildFailed {
                device: self.name(),
                log: format!(
                    "{kernel}: shared-memory tree needs a power-of-two work-group size, got {}",
                    self.work_group_size()
                ),
            });
        }
        Ok(())
    }

    fn preferred_work_group_size(&self, _kernel: ReductionKernel) -> Result<usize> {
        Ok(self.work_group_size())
    }

    fn supports_work_group_size(&self, _kernel: ReductionKernel, w: usize) -> bool {
        w.is_power_of_two()
    }

    fn create_buffer(&self, data: &[f32]) -> Result<GpuBuffer<R>> {
        let bytes = bytemuck::cast_slice(data);
        let handle = self.client().create(bytes);
        Ok(GpuBuffer::from_handle(handle, data.len()))
    }

    fn allocate(&self, len: usize) -> Result<GpuBuffer<R>> {
        // Zeroed so that reads past the last partial see the identity.
        self.create_buffer(&vec![0.0f32; len])
    }

    fn enqueue(
        &self,
        kernel: ReductionKernel,
        launch: LaunchConfig,
        input: &GpuBuffer<R>,
        output: &GpuBuffer<R>,
        args: &PassArgs,
    ) -> Result<()> {
        let w = launch.local_size;
        if w != args.local_scratch || !w.is_power_of_two() || launch.global_size % w != 0 {
            return Err(GpuError::KernelExecutionFailed(format!(
                "{kernel}: invalid launch {}x{} with {} elements of local scratch",
                launch.global_size, w, args.local_scratch
            )));
        }
        let groups = launch.work_groups();
        if output.len() < groups {
            return Err(GpuError::KernelExecutionFailed(format!(
                "{kernel}: output holds {} elements, launch writes {groups}",
                output.len()
            )));
        }

        let cube_count = CubeCount::Static(groups as u32, 1, 1);
        let cube_dim = CubeDim::new(w as u32, 1, 1);
        let client = self.client();
        let is_last = u32::from(args.is_last_pass);

        // Safety: every index the kernels touch is below `elements_to_reduce`
        // (input) or the work-group count (output), both checked above.
        unsafe {
            match kernel {
                ReductionKernel::Mean => mean_reduce_kernel::launch_unchecked::<f32, R>(
                    client,
                    cube_count,
                    cube_dim,
                    ArrayArg::from_raw_parts(input.handle(), input.len(), 1),
                    ArrayArg::from_raw_parts(output.handle(), output.len(), 1),
                    ScalarArg::new(args.pass_index),
                    ScalarArg::new(is_last),
                    ScalarArg::new(args.n),
                    ScalarArg::new(args.elements_to_reduce),
                    w as u32,
                ),
                ReductionKernel::Variance => {
                    let mean = args.mean.ok_or_else(|| {
                        GpuError::KernelExecutionFailed(format!("{kernel}: mean argument not bound"))
                    })?;
                    variance_reduce_kernel::launch_unchecked::<f32, R>(
                        client,
                        cube_count,
                        cube_dim,
                        ArrayArg::from_raw_parts(input.handle(), input.len(), 1),
                        ArrayArg::from_raw_parts(output.handle(), output.len(), 1),
                        ScalarArg::new(args.pass_index),
                        ScalarArg::new(is_last),
                        ScalarArg::new(args.n),
                        ScalarArg::new(args.elements_to_reduce),
                        ScalarArg::new(mean),
                        w as u32,
                    )
                }
            }
        }

        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.sync();
        Ok(())
    }

    fn read_buffer(&self, buffer: &GpuBuffer<R>, offset: usize, len: usize) -> Result<Vec<f32>> {
        let end = offset.checked_add(len).unwrap_or(usize::MAX);
        if end > buffer.len() {
            return Err(GpuError::InvalidBufferSize {
                expected: end,
                actual: buffer.len(),
            });
        }
        let bytes = self.client().read(buffer.handle().clone().binding());
        let data: &[f32] = bytemuck::try_cast_slice(&bytes)
            .map_err(|e| GpuError::MemoryTransferFailed(e.to_string()))?;
        data.get(offset..end)
            .map(<[f32]>::to_vec)
            .ok_or(GpuError::InvalidBufferSize {
                expected: end,
                actual: data.len(),
            })
    }
}
