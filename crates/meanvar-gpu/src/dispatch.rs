//! Launching one reduction pass.

use tracing::debug;

use crate::device::{ComputeDevice, LaunchConfig, PassArgs, ReductionKernel};
use crate::error::{GpuError, Result};
use crate::memory::StagingBuffers;
use crate::plan::{PassShape, ReductionPlan};

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        GpuError::InvalidConfiguration(format!("{what} = {value} does not fit a 32-bit kernel argument"))
    })
}

/// Binds arguments for, launches and waits on the passes of one plan.
pub struct ReductionDispatcher<'a, D: ComputeDevice> {
    device: &'a D,
    kernel: ReductionKernel,
    plan: &'a ReductionPlan,
    mean: Option<f32>,
}

impl<'a, D: ComputeDevice> ReductionDispatcher<'a, D> {
    /// Dispatcher for `kernel` over the passes of `plan`.
    ///
    /// `mean` is bound only for [`ReductionKernel::Variance`].
    pub fn new(
        device: &'a D,
        kernel: ReductionKernel,
        plan: &'a ReductionPlan,
        mean: Option<f32>,
    ) -> Self {
        let mean = match kernel {
            ReductionKernel::Mean => None,
            ReductionKernel::Variance => mean,
        };
        Self { device, kernel, plan, mean }
    }

    /// NDRange of `pass`.
    pub fn launch_config(&self, pass: &PassShape) -> LaunchConfig {
        LaunchConfig {
            global_size: pass.global_work_size,
            local_size: self.plan.work_group_size(),
        }
    }

    /// Full argument set for `pass`.
    pub fn pass_args(&self, pass: &PassShape) -> Result<PassArgs> {
        Ok(PassArgs {
            pass_index: to_u32(pass.index, "pass index")?,
            is_last_pass: pass.is_last,
            n: to_u32(self.plan.n(), "N")?,
            elements_to_reduce: to_u32(pass.elements, "elements to reduce")?,
            local_scratch: self.plan.work_group_size(),
            mean: self.mean,
        })
    }

    /// Launch `pass` and block until its partials are visible.
    pub fn dispatch(&self, buffers: &StagingBuffers<D::Buffer>, pass: &PassShape) -> Result<()> {
        let launch = self.launch_config(pass);
        let args = self.pass_args(pass)?;
        debug!(
            kernel = %self.kernel,
            pass = pass.index,
            global = launch.global_size,
            local = launch.local_size,
            elements = pass.elements,
            groups = launch.work_groups(),
            last = pass.is_last,
            "dispatching reduction pass"
        );

        self.device.enqueue(
            self.kernel,
            launch,
            buffers.source(pass.index),
            buffers.destination(pass.index),
            &args,
        )?;
        self.device.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostDevice;
    use crate::plan::plan;

    #[test]
    fn test_args_for_final_pass() {
        let device = HostDevice::new();
        let plan = plan(1024, 256).unwrap();
        let dispatcher = ReductionDispatcher::new(&device, ReductionKernel::Mean, &plan, None);

        let first = dispatcher.pass_args(&plan.pass(0)).unwrap();
        assert_eq!(first.pass_index, 0);
        assert!(!first.is_last_pass);
        assert_eq!(first.elements_to_reduce, 1024);

        let last = dispatcher.pass_args(&plan.pass(1)).unwrap();
        assert_eq!(last.pass_index, 1);
        assert!(last.is_last_pass);
        assert_eq!(last.n, 1024);
        assert_eq!(last.elements_to_reduce, 4);
        assert_eq!(last.local_scratch, 256);
        assert_eq!(dispatcher.launch_config(&plan.pass(1)).global_size, 256);
    }

    #[test]
    fn test_mean_only_bound_for_variance() {
        let device = HostDevice::new();
        let plan = plan(10, 4).unwrap();
        let shape = plan.pass(0);

        let mean = ReductionDispatcher::new(&device, ReductionKernel::Mean, &plan, Some(1.0));
        assert_eq!(mean.pass_args(&shape).unwrap().mean, None);

        let var = ReductionDispatcher::new(&device, ReductionKernel::Variance, &plan, Some(1.0));
        assert_eq!(var.pass_args(&shape).unwrap().mean, Some(1.0));
    }

    #[test]
    fn test_dispatch_writes_partials() {
        let device = HostDevice::new();
        let plan = plan(10, 4).unwrap();
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let buffers = StagingBuffers::allocate(&device, &plan, &data).unwrap();
        let dispatcher = ReductionDispatcher::new(&device, ReductionKernel::Mean, &plan, None);

        dispatcher.dispatch(&buffers, &plan.pass(0)).unwrap();

        let partials = device.read_buffer(buffers.destination(0), 0, 3).unwrap();
        assert_eq!(partials, vec![6.0, 22.0, 17.0]);
    }
}
