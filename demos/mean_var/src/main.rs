use meanvar_gpu::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DATASET_LEN: usize = 1 << 24;
const SEED: u64 = 42;

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Reduction failed ({:?}): {e}", e.kind());
            if let Some(log) = e.build_log() {
                eprintln!("Build log:\n{log}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Optional TOML file from the first argument, then `MEANVAR_*` overrides.
fn load_config() -> std::result::Result<EngineConfig, ConfigError> {
    let base = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_toml(Path::new(&path))?,
        None => EngineConfig::default(),
    };
    base.with_env_overrides()
}

fn run(config: EngineConfig) -> Result<bool> {
    println!("=== Multi-pass mean and variance ===\n");

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let data: Vec<f32> = (0..DATASET_LEN).map(|_| rng.gen_range(0.0..100.0)).collect();
    tracing::info!(seed = SEED, n = data.len(), "dataset generated");
    println!("Generated {} values in [0, 100)", data.len());

    #[cfg(feature = "cuda")]
    let stats = {
        println!("Initializing CUDA runtime...");
        let runtime = init_cuda_runtime()?;
        print_device_info(&runtime);
        run_device(runtime, config.clone(), &data)?
    };

    #[cfg(all(feature = "wgpu", not(feature = "cuda")))]
    let stats = {
        println!("Initializing WGPU runtime...");
        let runtime = init_wgpu_runtime()?;
        print_device_info(&runtime);
        run_device(runtime, config.clone(), &data)?
    };

    #[cfg(not(any(feature = "cuda", feature = "wgpu")))]
    let stats = {
        println!("No GPU features enabled, using the host device.");
        println!("Build with: cargo run -p mean_var --features cuda");
        println!("        or: cargo run -p mean_var --features wgpu\n");
        run_device(HostDevice::new(), config.clone(), &data)?
    };

    println!("###############################");
    println!("mean_GPU = {}", stats.mean);
    println!("var_GPU = {}", stats.variance);
    println!("###############################\n");

    let start = Instant::now();
    let cpu_mean = host_mean(&data)?;
    let cpu_var = host_variance(&data, cpu_mean)?;
    println!("CPU reference: {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);

    println!("###############################");
    println!("mean_CPU = {cpu_mean}");
    println!("var_CPU = {cpu_var}");
    println!("###############################\n");

    let comparison = compare(stats.mean, cpu_mean, stats.variance, cpu_var, config.tolerance);
    println!("###############################");
    println!("{comparison}");
    println!("###############################");

    Ok(comparison.passed())
}

fn run_device<D: ComputeDevice>(
    device: D,
    config: EngineConfig,
    data: &[f32],
) -> Result<MeanVariance> {
    let engine = AggregateEngine::with_config(device, config)?;
    println!("Device: {}", engine.device().name());
    for kernel in [ReductionKernel::Mean, ReductionKernel::Variance] {
        let plan = engine.plan_for(kernel, data.len())?;
        println!(
            "  {kernel}: work group size {}, {} passes",
            plan.work_group_size(),
            plan.pass_count()
        );
    }

    let start = Instant::now();
    let stats = engine.compute_mean_variance(data)?;
    println!(
        "Device computation: {:.2} ms\n",
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(stats)
}

/// Print backend info to confirm the GPU is being used.
#[cfg(any(feature = "cuda", feature = "wgpu"))]
fn print_device_info<R: CubeclRuntime>(runtime: &RuntimeContext<R>) {
    println!("  Backend:       {}", runtime.backend_name());
    let (max_page, align) = runtime.memory_properties();
    println!("  Max page size: {} bytes ({:.0} MB)", max_page, max_page as f64 / 1_048_576.0);
    println!("  Alignment:     {} bytes", align);
    println!();
}
