//! Work-group reduction kernels.
//!
//! Both kernels follow the same contract: work-group `g` loads
//! `input[g * W .. g * W + W]` into shared memory (indices at or past
//! `elements_to_reduce` load zero), tree-reduces it and unit 0 writes the
//! partial to `output[g]`. On the last pass the partial is divided by the
//! kernel's divisor.
//!
//! The shared-memory tree halves the stride every step, so `W` must be a
//! power of two.

use cubecl::prelude::*;

/// Sum reduction; the last pass divides by `n`.
#[cube(launch_unchecked)]
pub fn mean_reduce_kernel<F: Float>(
    input: &Array<F>,
    output: &mut Array<F>,
    _pass_index: u32,
    is_last_pass: u32,
    n: u32,
    elements_to_reduce: u32,
    #[comptime] work_group_size: u32,
) {
    let mut scratch = SharedMemory::<F>::new(work_group_size);
    let tid = UNIT_POS;
    let block_id = CUBE_POS;
    let global_id = block_id * CUBE_DIM_X + tid;

    let mut value = F::new(0.0);
    if global_id < elements_to_reduce {
        value = input[global_id];
    }
    scratch[tid] = value;
    sync_units();

    let mut stride = CUBE_DIM_X / 2;
    while stride > 0 {
        if tid < stride {
            scratch[tid] = scratch[tid] + scratch[tid + stride];
        }
        sync_units();
        stride /= 2;
    }

    if tid == 0 {
        let mut total = scratch[0];
        if is_last_pass == 1 {
            total = total / F::cast_from(n);
        }
        output[block_id] = total;
    }
}

/// Squared deviations from `mean` on pass 0, plain sums afterwards; the last
/// pass divides by `n - 1`.
#[cube(launch_unchecked)]
pub fn variance_reduce_kernel<F: Float>(
    input: &Array<F>,
    output: &mut Array<F>,
    pass_index: u32,
    is_last_pass: u32,
    n: u32,
    elements_to_reduce: u32,
    mean: F,
    #[comptime] work_group_size: u32,
) {
    let mut scratch = SharedMemory::<F>::new(work_group_size);
    let tid = UNIT_POS;
    let block_id = CUBE_POS;
    let global_id = block_id * CUBE_DIM_X + tid;

    // Padded slots stay zero: their deviation is defined as 0, not -mean.
    let mut value = F::new(0.0);
    if global_id < elements_to_reduce {
        value = input[global_id];
        if pass_index == 0 {
            let d = value - mean;
            value = d * d;
        }
    }
    scratch[tid] = value;
    sync_units();

    let mut stride = CUBE_DIM_X / 2;
    while stride > 0 {
        if tid < stride {
            scratch[tid] = scratch[tid] + scratch[tid + stride];
        }
        sync_units();
        stride /= 2;
    }

    if tid == 0 {
        let mut total = scratch[0];
        if is_last_pass == 1 {
            total = total / F::cast_from(n - 1);
        }
        output[block_id] = total;
    }
}
