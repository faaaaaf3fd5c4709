// mandelmap — Mandelbrot divergence maps on the GPU.
//
// For every point of a rectangular sample grid over the complex plane,
// compute whether the point belongs to the Mandelbrot set and, if not,
// after how many iterations its orbit is known to diverge.
//
// The CPU implementation in `escape` is the authoritative reference;
// the wgpu dispatch harness under `gpu/` mirrors it and is validated
// against it.

pub mod escape;
pub mod gpu;
pub mod map;
pub mod render;
