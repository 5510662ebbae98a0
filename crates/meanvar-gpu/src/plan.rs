//! Sizing of multi-pass reductions.
//!
//! A reduction over `N` elements with work-group size `W` runs as a chain of
//! passes. Pass `i` consumes `elements_to_reduce[i]` logical elements,
//! launches `global_work_size[i]` work-items (the element count rounded up to
//! a multiple of `W`) and emits one partial per work-group. The next pass
//! consumes those partials, until a pass emits a single value.
//!
//! ```text
//! N = 1000, W = 256
//!
//! pass 0: 1000 elements -> global 1024 -> 4 partials
//! pass 1:    4 elements -> global  256 -> 1 partial (final)
//! ```

use crate::error::{GpuError, Result};

/// Pass cap used by [`plan`].
pub const DEFAULT_MAX_PASSES: usize = 64;

/// Shape of one reduction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassShape {
    /// Position of the pass in the chain.
    pub index: usize,
    /// Logical (unpadded) element count consumed by the pass.
    pub elements: usize,
    /// Number of work-items launched, a multiple of the work-group size.
    pub global_work_size: usize,
    /// Number of work-groups, one partial each.
    pub work_groups: usize,
    /// Whether this pass produces the final scalar.
    pub is_last: bool,
}

impl PassShape {
    /// Identity elements appended to reach the global work size.
    pub fn padding(&self) -> usize {
        self.global_work_size - self.elements
    }
}

/// Immutable schedule for reducing `N` elements with work-group size `W`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionPlan {
    n: usize,
    work_group_size: usize,
    elements_to_reduce: Vec<usize>,
    global_work_size: Vec<usize>,
    buffer_sizes: [usize; 3],
}

/// Plan a reduction of `n` elements with work-group size `w`.
///
/// # Errors
///
/// Returns [`GpuError::InvalidConfiguration`] when `n` or `w` is zero, when
/// `w == 1` cannot collapse more than one element, or when more than
/// [`DEFAULT_MAX_PASSES`] passes would be needed.
pub fn plan(n: usize, w: usize) -> Result<ReductionPlan> {
    plan_with_cap(n, w, DEFAULT_MAX_PASSES)
}

/// Like [`plan`], with an explicit pass cap.
pub fn plan_with_cap(n: usize, w: usize, max_passes: usize) -> Result<ReductionPlan> {
    if n == 0 {
        return Err(GpuError::InvalidConfiguration(
            "cannot reduce an empty dataset (N == 0)".to_string(),
        ));
    }
    if w == 0 {
        return Err(GpuError::InvalidConfiguration(
            "work-group size must be positive (W == 0)".to_string(),
        ));
    }
    if w == 1 && n > 1 {
        return Err(GpuError::InvalidConfiguration(format!(
            "work-group size 1 never collapses N = {n} elements"
        )));
    }

    let mut elements_to_reduce = vec![n];
    let mut last = n;
    loop {
        let partials = last.div_ceil(w);
        if partials <= 1 {
            break;
        }
        if elements_to_reduce.len() >= max_passes {
            return Err(GpuError::InvalidConfiguration(format!(
                "N = {n} with W = {w} needs more than {max_passes} passes"
            )));
        }
        elements_to_reduce.push(partials);
        last = partials;
    }

    let global_work_size: Vec<usize> = elements_to_reduce
        .iter()
        .map(|&e| e.next_multiple_of(w))
        .collect();

    // Pass i writes slot i % 2; the slot must hold what the next pass reads
    // (padded) or the final scalar.
    let pass_count = elements_to_reduce.len();
    let mut staging = [1usize; 2];
    for pass in 0..pass_count {
        let needed = match global_work_size.get(pass + 1) {
            Some(&next_global) => next_global,
            None => global_work_size[pass] / w,
        };
        let slot = &mut staging[pass % 2];
        *slot = (*slot).max(needed);
    }

    Ok(ReductionPlan {
        n,
        work_group_size: w,
        elements_to_reduce,
        global_work_size: global_work_size.clone(),
        buffer_sizes: [global_work_size[0], staging[0], staging[1]],
    })
}

impl ReductionPlan {
    /// Original, unpadded element count.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Work-group size the plan was computed for.
    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    /// Number of passes, at least 1.
    pub fn pass_count(&self) -> usize {
        self.elements_to_reduce.len()
    }

    /// Logical element count consumed by each pass.
    pub fn elements_to_reduce(&self) -> &[usize] {
        &self.elements_to_reduce
    }

    /// Padded work-item count of each pass.
    pub fn global_work_size(&self) -> &[usize] {
        &self.global_work_size
    }

    /// Capacities of the input buffer and the two staging buffers.
    pub fn buffer_sizes(&self) -> [usize; 3] {
        self.buffer_sizes
    }

    /// Number of partials written by `pass`.
    pub fn output_count(&self, pass: usize) -> usize {
        self.global_work_size[pass] / self.work_group_size
    }

    /// Shape of `pass`.
    ///
    /// # Panics
    ///
    /// Panics if `pass >= self.pass_count()`.
    pub fn pass(&self, pass: usize) -> PassShape {
        PassShape {
            index: pass,
            elements: self.elements_to_reduce[pass],
            global_work_size: self.global_work_size[pass],
            work_groups: self.output_count(pass),
            is_last: pass + 1 == self.pass_count(),
        }
    }

    /// Iterate the passes in launch order.
    pub fn passes(&self) -> impl Iterator<Item = PassShape> + '_ {
        (0..self.pass_count()).map(|pass| self.pass(pass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_passes_for_1024_by_256() {
        let plan = plan(1024, 256).unwrap();
        assert_eq!(plan.pass_count(), 2);
        assert_eq!(plan.elements_to_reduce(), &[1024, 4]);
        assert_eq!(plan.global_work_size(), &[1024, 256]);
        assert_eq!(plan.output_count(0), 4);
        assert_eq!(plan.output_count(1), 1);
    }

    #[test]
    fn test_padding_for_1000_by_256() {
        let plan = plan(1000, 256).unwrap();
        let first = plan.pass(0);
        assert_eq!(first.elements, 1000);
        assert_eq!(first.global_work_size, 1024);
        assert_eq!(first.work_groups, 4);
        assert_eq!(first.padding(), 24);
        assert!(plan.pass(1).is_last);
    }

    #[test]
    fn test_single_pass_when_n_fits_one_group() {
        for n in [1, 2, 255, 256] {
            let plan = plan(n, 256).unwrap();
            assert_eq!(plan.pass_count(), 1, "n = {n}");
            assert_eq!(plan.global_work_size(), &[256]);
            assert_eq!(plan.output_count(0), 1);
        }
    }

    #[test]
    fn test_one_past_a_group_needs_two_passes() {
        let plan = plan(257, 256).unwrap();
        assert_eq!(plan.elements_to_reduce(), &[257, 2]);
        assert_eq!(plan.global_work_size(), &[512, 256]);
    }

    #[test]
    fn test_buffer_sizes_alternate() {
        // 3 passes: 70000 -> 274 -> 2 -> 1
        let plan = plan(70_000, 256).unwrap();
        assert_eq!(plan.elements_to_reduce(), &[70_000, 274, 2]);
        let [input, a, b] = plan.buffer_sizes();
        assert_eq!(input, 70_144);
        // pass 0 -> slot a, read by pass 1 padded to 512; pass 2 -> slot a, 1 value
        assert_eq!(a, 512);
        // pass 1 -> slot b, read by pass 2 padded to 256
        assert_eq!(b, 256);
    }

    #[test]
    fn test_n_one_is_trivial() {
        let plan = plan(1, 1).unwrap();
        assert_eq!(plan.pass_count(), 1);
        assert_eq!(plan.buffer_sizes(), [1, 1, 1]);
    }

    #[test]
    fn test_degenerate_inputs_are_rejected() {
        assert!(matches!(plan(0, 256), Err(GpuError::InvalidConfiguration(_))));
        assert!(matches!(plan(10, 0), Err(GpuError::InvalidConfiguration(_))));
        assert!(matches!(plan(10, 1), Err(GpuError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_pass_cap() {
        // 2^20 with W = 2 needs 20 passes
        assert_eq!(plan_with_cap(1 << 20, 2, 20).unwrap().pass_count(), 20);
        assert!(plan_with_cap(1 << 20, 2, 19).is_err());
    }
}
