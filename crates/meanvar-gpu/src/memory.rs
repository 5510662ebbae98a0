//! Staging buffers for one reduction.
//!
//! A computation owns exactly three device buffers: the (padded) input and
//! two ping-pong buffers. Pass 0 reads the input; pass `i > 0` reads the
//! slot pass `i - 1` wrote and writes the other one, so no pass ever reads a
//! buffer it is writing.
//!
//! ```text
//! pass:    0        1        2        3
//! reads:   input    slot 0   slot 1   slot 0
//! writes:  slot 0   slot 1   slot 0   slot 1
//! ```

use std::borrow::Cow;

use tracing::debug;

use crate::device::ComputeDevice;
use crate::error::{GpuError, Result};
use crate::plan::ReductionPlan;

/// Ping-pong slot written by `pass`.
pub fn output_slot(pass: usize) -> usize {
    pass % 2
}

/// Extend `data` with zeros up to `len` elements, borrowing when no padding
/// is needed.
pub fn pad_with_identity(data: &[f32], len: usize) -> Cow<'_, [f32]> {
    if data.len() >= len {
        return Cow::Borrowed(data);
    }
    let mut padded = Vec::with_capacity(len);
    padded.extend_from_slice(data);
    padded.resize(len, 0.0);
    Cow::Owned(padded)
}

/// Device buffers backing one `compute*` call.
pub struct StagingBuffers<B> {
    input: B,
    ping_pong: [B; 2],
    capacities: [usize; 3],
}

impl<B> StagingBuffers<B> {
    /// Upload `data` and allocate the ping-pong buffers sized by `plan`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not have the length `plan` was made
    /// for, or if the device fails to allocate.
    pub fn allocate<D>(device: &D, plan: &ReductionPlan, data: &[f32]) -> Result<Self>
    where
        D: ComputeDevice<Buffer = B>,
    {
        if data.len() != plan.n() {
            return Err(GpuError::InvalidBufferSize {
                expected: plan.n(),
                actual: data.len(),
            });
        }

        let capacities = plan.buffer_sizes();
        let staged = pad_with_identity(data, capacities[0]);
        if staged.len() != data.len() {
            debug!(
                "resize was needed, from N = {} to N = {} (appended elements are zeros)",
                data.len(),
                staged.len()
            );
        }

        let input = device.create_buffer(&staged)?;
        let ping = device.allocate(capacities[1])?;
        let pong = device.allocate(capacities[2])?;

        Ok(Self {
            input,
            ping_pong: [ping, pong],
            capacities,
        })
    }

    /// Buffer read by `pass`.
    pub fn source(&self, pass: usize) -> &B {
        if pass == 0 {
            &self.input
        } else {
            &self.ping_pong[output_slot(pass - 1)]
        }
    }

    /// Buffer written by `pass`.
    pub fn destination(&self, pass: usize) -> &B {
        &self.ping_pong[output_slot(pass)]
    }

    /// Capacities of the input, slot 0 and slot 1 buffers.
    pub fn capacities(&self) -> [usize; 3] {
        self.capacities
    }
}
