// map.rs — Evaluation parameters and the divergence-map container.
//
// `EscapeParams` is the validated configuration for one evaluation:
// grid dimensions plus the iteration bound. Construction is the single
// place where the preconditions are checked — the kernels run in a
// context with no error channel (one GPU lane per grid point), so a
// constructed `EscapeParams` is the proof that every lane's input is
// valid and no check is needed device-side.
//
// `DivergenceMap` is the dense row-major result grid. Rows are always
// packed (stride == width): the GPU output comes back through a
// buffer→buffer copy, which unlike texture copies carries no row
// alignment requirement.

use std::fmt;

// ---------------------------------------------------------------------------
// EscapeParams
// ---------------------------------------------------------------------------

/// Validated evaluation parameters: sample-grid dimensions and the
/// maximum number of orbit iterations per point.
///
/// The grid maps linearly onto the complex-plane window
/// re ∈ [-2, 1], im ∈ [-1, 1]. Both dimensions must be at least 2 —
/// the pixel→plane mapping divides by `width - 1` and `height - 1`.
///
/// Fields are private so an `EscapeParams` can only exist with the
/// preconditions already checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeParams {
    width: u32,
    height: u32,
    max_iterations: u32,
}

impl EscapeParams {
    /// Validate and construct evaluation parameters.
    ///
    /// # Errors
    /// `ParamsError::GridTooSmall` if either dimension is below 2,
    /// `ParamsError::ZeroIterationBound` if `max_iterations` is 0.
    pub fn new(width: u32, height: u32, max_iterations: u32) -> Result<Self, ParamsError> {
        if width < 2 || height < 2 {
            return Err(ParamsError::GridTooSmall { width, height });
        }
        if max_iterations == 0 {
            return Err(ParamsError::ZeroIterationBound);
        }
        Ok(EscapeParams { width, height, max_iterations })
    }

    /// Grid width (number of sample columns).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height (number of sample rows).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Maximum orbit iterations evaluated per point.
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Total number of grid points (`width * height`).
    pub fn n_points(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for EscapeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}×{}, {} iterations",
            self.width, self.height, self.max_iterations
        )
    }
}

/// Errors from parameter validation. All are configuration errors caught
/// before any evaluation work is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsError {
    /// Either grid dimension is below 2. The pixel→plane mapping
    /// interpolates across `width - 1` / `height - 1` steps, so a
    /// 1-wide or 1-high grid would divide by zero.
    GridTooSmall { width: u32, height: u32 },
    /// The iteration bound is 0 — no orbit step would ever run.
    ZeroIterationBound,
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamsError::GridTooSmall { width, height } => write!(
                f,
                "grid {width}×{height} too small: both dimensions must be at least 2"
            ),
            ParamsError::ZeroIterationBound => {
                write!(f, "iteration bound must be at least 1")
            }
        }
    }
}

impl std::error::Error for ParamsError {}

// ---------------------------------------------------------------------------
// DivergenceMap
// ---------------------------------------------------------------------------

/// Dense row-major grid of divergence iteration counts, one `u32` per
/// grid point.
///
/// Entry semantics:
///   - `0` — the orbit did not diverge within the iteration bound
///     (the point is presumed to belong to the Mandelbrot set).
///   - `k` in `1..=max_iterations` — the orbit's squared norm first
///     exceeded 4.0 at iteration `k`.
///
/// Entry `(x, y)` lives at index `y * width + x`, matching the slot
/// each GPU lane writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivergenceMap {
    width: u32,
    height: u32,
    data: Vec<u32>,
}

impl DivergenceMap {
    /// Create a zero-filled map for the given parameters.
    pub fn new(params: &EscapeParams) -> Self {
        DivergenceMap {
            width: params.width(),
            height: params.height(),
            data: vec![0u32; params.n_points()],
        }
    }

    /// Wrap an existing row-major vector (e.g. a GPU readback).
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: u32, height: u32, data: Vec<u32>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize,
            "data length {} does not match {}×{} grid",
            data.len(),
            width,
            height
        );
        DivergenceMap { width, height, data }
    }

    /// Map width (number of columns).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Map height (number of rows).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Divergence count at `(x, y)`.
    ///
    /// # Panics
    /// Panics if `x >= width` or `y >= height`.
    pub fn get(&self, x: u32, y: u32) -> u32 {
        assert!(x < self.width && y < self.height,
            "({x}, {y}) out of bounds for {}×{} map", self.width, self.height);
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Set the divergence count at `(x, y)`.
    ///
    /// # Panics
    /// Panics if `x >= width` or `y >= height`.
    pub fn set(&mut self, x: u32, y: u32, value: u32) {
        assert!(x < self.width && y < self.height,
            "({x}, {y}) out of bounds for {}×{} map", self.width, self.height);
        self.data[y as usize * self.width as usize + x as usize] = value;
    }

    /// The full map as a flat row-major slice.
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    /// Largest divergence count in the map. `0` when every point is
    /// presumed in-set.
    pub fn max_divergence(&self) -> u32 {
        self.data.iter().copied().max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
