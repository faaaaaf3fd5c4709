// gpu/mod.rs — wgpu dispatch harness.
//
// The escape-time computation is a pure data-parallel map: one
// independent task per grid point, each writing its own output slot,
// no communication between tasks. That makes it a single compute
// dispatch over a 2-D index space with one completion barrier and one
// readback at the end.
//
// The CPU implementation in `crate::escape` remains the authoritative
// reference — the GPU kernel is validated against it. Device
// arithmetic is f32 (WGSL has no f64), the reference is f64, so a
// small fraction of pixels on basin boundaries may report a different
// divergence iteration; the validation tests bound that fraction
// explicitly.

pub mod context;
pub mod escape;
