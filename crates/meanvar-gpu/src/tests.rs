//! Integration tests across planner, staging buffers and dispatcher.

#[cfg(test)]
mod integration {
    use crate::{
        plan, AggregateEngine, ComputeDevice, HostDevice, ReductionDispatcher, ReductionKernel,
        StagingBuffers,
    };

    #[test]
    fn test_manual_pass_loop_matches_engine() {
        let device = HostDevice::with_work_group_sizes(16, 16);
        let data: Vec<f32> = (0..5000).map(|i| (i % 7) as f32).collect();

        let plan = plan(data.len(), 16).expect("plan");
        let buffers = StagingBuffers::allocate(&device, &plan, &data).expect("staging");
        let dispatcher = ReductionDispatcher::new(&device, ReductionKernel::Mean, &plan, None);
        for pass in plan.passes() {
            dispatcher.dispatch(&buffers, &pass).expect("dispatch");
        }
        let last = plan.pass_count() - 1;
        let manual = device.read_buffer(buffers.destination(last), 0, 1).expect("read")[0];

        let engine = AggregateEngine::new(device).expect("engine");
        assert_eq!(engine.compute_mean(&data).expect("mean"), manual);
    }

    #[test]
    fn test_every_pass_writes_planned_partials() {
        let device = HostDevice::with_work_group_sizes(8, 8);
        let data = vec![1.0f32; 1000];
        let plan = plan(data.len(), 8).expect("plan");
        let buffers = StagingBuffers::allocate(&device, &plan, &data).expect("staging");
        let dispatcher = ReductionDispatcher::new(&device, ReductionKernel::Mean, &plan, None);

        // 1000 -> 125 -> 16 -> 2 -> 1
        assert_eq!(plan.elements_to_reduce(), &[1000, 125, 16, 2]);
        for pass in plan.passes() {
            dispatcher.dispatch(&buffers, &pass).expect("dispatch");
            let written = device
                .read_buffer(buffers.destination(pass.index), 0, pass.work_groups)
                .expect("read");
            if !pass.is_last {
                // partials preserve the running total
                let total: f32 = written.iter().sum();
                assert_eq!(total, 1000.0);
            } else {
                assert_eq!(written, vec![1.0]);
            }
        }
    }
}
