// escape.rs — CPU reference escape-time kernel.
//
// The escape-radius theorem: once an orbit's norm exceeds 2 (squared
// norm > 4.0), the sequence z ← z² + c is guaranteed to diverge to
// infinity, so the first iteration crossing that threshold is a proof
// of divergence. Points whose orbit stays bounded for the whole
// iteration budget are presumed members of the set and recorded as 0.
//
// The complex recurrence is written out in explicit real/imaginary
// components rather than through a complex-number type — the GPU kernel
// in shaders/escape.wgsl has no complex type either, and keeping the
// two textually parallel makes the pair easy to diff by eye.

use crate::map::{DivergenceMap, EscapeParams};

/// Divergence iteration count for a single grid point.
///
/// Maps the discrete coordinate `(x, y)` onto the fixed complex-plane
/// window re ∈ [-2, 1], im ∈ [-1, 1] and iterates z ← z² + c from
/// z = 0. Returns the first iteration (1-based) whose squared norm
/// exceeds 4.0, or 0 if the orbit stays bounded for the whole budget.
///
/// Pure and total: every `(x, y)` inside the grid has a well-defined
/// result, so the same logic can run on GPU lanes that have no way to
/// signal failure. `EscapeParams` guarantees `width >= 2` and
/// `height >= 2`, keeping the interpolation divisors nonzero.
pub fn escape_time(x: u32, y: u32, params: &EscapeParams) -> u32 {
    let c_re = x as f64 * 3.0 / (params.width() - 1) as f64 - 2.0;
    let c_im = y as f64 * 2.0 / (params.height() - 1) as f64 - 1.0;

    let mut z_re = 0.0f64;
    let mut z_im = 0.0f64;

    for i in 1..=params.max_iterations() {
        let next_re = z_re * z_re - z_im * z_im + c_re;
        z_im = 2.0 * z_re * z_im + c_im;
        z_re = next_re;

        if z_re * z_re + z_im * z_im > 4.0 {
            return i;
        }
    }

    0
}

/// Single-threaded reference evaluator.
///
/// Fills the whole divergence map in row-major order on the calling
/// thread. This is the authoritative implementation the GPU harness is
/// validated against, and the deterministic fallback for environments
/// without a compute device. It cannot fail: the only error conditions
/// are parameter preconditions, already enforced by [`EscapeParams`].
#[derive(Debug, Default)]
pub struct CpuEvaluator;

impl CpuEvaluator {
    pub fn new() -> Self {
        CpuEvaluator
    }

    /// Evaluate every grid point and return the completed map.
    pub fn evaluate(&self, params: &EscapeParams) -> DivergenceMap {
        let mut map = DivergenceMap::new(params);
        for y in 0..params.height() {
            for x in 0..params.width() {
                map.set(x, y, escape_time(x, y, params));
            }
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
