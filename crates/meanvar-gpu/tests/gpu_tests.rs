//! Reductions on CubeCL devices, checked against the host references.

use meanvar_gpu::*;

#[allow(dead_code)]
const TOLERANCE: f32 = 1e-4;

#[allow(dead_code)]
fn pattern(n: usize) -> Vec<f32> {
    (0..n).map(|i| ((i * 37) % 101) as f32).collect()
}

#[allow(dead_code)]
fn check_sizes<D: ComputeDevice>(engine: &AggregateEngine<D>, w: usize) {
    for n in [1, w - 1, w, w + 1, w * w, w * w + 1, 1 << 20] {
        let data = pattern(n);
        let mean = engine.compute_mean(&data).unwrap();
        let cpu_mean = host_mean(&data).unwrap();
        assert!(relative_error(cpu_mean, mean) < TOLERANCE, "n = {n}: {mean} vs {cpu_mean}");
        if n < 2 {
            continue;
        }
        let var = engine.compute_variance(&data, mean).unwrap();
        let cpu_var = host_variance(&data, cpu_mean).unwrap();
        assert!(relative_error(cpu_var, var) < TOLERANCE, "n = {n}: {var} vs {cpu_var}");
    }
}

#[allow(dead_code)]
fn check_matches_host_device<D: ComputeDevice>(engine: &AggregateEngine<D>, w: usize) {
    let host = AggregateEngine::new(HostDevice::with_work_group_sizes(w, w)).unwrap();
    let data = pattern(70_000);
    let gpu = engine.compute_mean_variance(&data).unwrap();
    let cpu = host.compute_mean_variance(&data).unwrap();
    let cmp = compare(gpu.mean, cpu.mean, gpu.variance, cpu.variance, TOLERANCE);
    assert!(cmp.passed(), "{cmp}");
}

#[cfg(feature = "cuda")]
mod cuda_tests {
    use super::*;

    fn get_engine(w: usize) -> Option<AggregateEngine<RuntimeContext<cubecl_cuda::CudaRuntime>>> {
        let runtime = init_cuda_runtime().ok()?.with_work_group_size(w).ok()?;
        AggregateEngine::new(runtime).ok()
    }

    #[test]
    fn test_mean_variance_various_sizes() {
        let Some(engine) = get_engine(256) else { return };
        check_sizes(&engine, 256);
    }

    #[test]
    fn test_small_work_group() {
        let Some(engine) = get_engine(32) else { return };
        check_sizes(&engine, 32);
    }

    #[test]
    fn test_all_ones() {
        let Some(engine) = get_engine(256) else { return };
        assert_eq!(engine.compute_mean(&vec![1.0; 1024]).unwrap(), 1.0);
        assert_eq!(engine.compute_mean(&vec![1.0; 1000]).unwrap(), 1.0);
    }

    #[test]
    fn test_matches_host_device() {
        let Some(engine) = get_engine(64) else { return };
        check_matches_host_device(&engine, 64);
    }
}

#[cfg(feature = "wgpu")]
mod wgpu_tests {
    use super::*;

    fn get_engine(w: usize) -> Option<AggregateEngine<RuntimeContext<cubecl_wgpu::WgpuRuntime>>> {
        let runtime = init_wgpu_runtime().ok()?.with_work_group_size(w).ok()?;
        AggregateEngine::new(runtime).ok()
    }

    #[test]
    fn test_mean_variance_various_sizes() {
        let Some(engine) = get_engine(256) else { return };
        check_sizes(&engine, 256);
    }

    #[test]
    fn test_small_work_group() {
        let Some(engine) = get_engine(32) else { return };
        check_sizes(&engine, 32);
    }

    #[test]
    fn test_matches_host_device() {
        let Some(engine) = get_engine(64) else { return };
        check_matches_host_device(&engine, 64);
    }
}

