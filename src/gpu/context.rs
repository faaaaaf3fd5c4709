// gpu/context.rs — wgpu context: adapter selection and launch geometry.
//
// Responsibilities:
//   - Enumerate Vulkan adapters and pick a real GPU when one exists.
//   - Hold the device/queue pair every dispatch goes through.
//   - Expose `WorkgroupSize` and the ceiling-division dispatch math
//     that covers a width×height grid with 2-D workgroups.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` uses power-preference heuristics
// that can grab llvmpipe/softpipe on headless or WSL2 machines (the
// software renderer appears as a valid Vulkan device). We enumerate
// explicitly and prefer hardware, taking a software adapter only as a
// last resort. The chosen adapter is logged so a slow run is never a
// mystery.
//
// CONTEXT INJECTION:
// There is deliberately no global or lazily-initialized context. The
// caller constructs a `GpuContext` once and passes it by reference
// into every evaluator call, which keeps device selection explicit
// and lets tests validate the dispatch path against the CPU reference
// without hidden state.

use std::fmt;

/// A workgroup size configuration for 2-D compute dispatches.
///
/// The product `x * y` is the number of kernel invocations per
/// workgroup and must not exceed the device's
/// `max_compute_invocations_per_workgroup` limit — enforced by
/// [`GpuContext::set_workgroup_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// 16×8 = 128 invocations: four 32-wide NVIDIA warps or two
    /// 64-wide AMD wavefronts, with the 16-wide x dimension matching
    /// row-major output locality.
    pub const DEFAULT: WorkgroupSize = WorkgroupSize { x: 16, y: 8 };

    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// The GPU execution context: adapter, device, queue, and the active
/// workgroup configuration.
///
/// Create once via [`GpuContext::new`] and reuse — Vulkan instance and
/// device initialization is the expensive part, a dispatch is cheap.
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is
/// declared last so the `wgpu::Instance` outlives `device` and
/// `queue`; some Vulkan translation layers crash when the instance is
/// destroyed while device-level objects still reference it.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    /// Keeps the `wgpu::Instance` alive until `device` and `queue`
    /// are dropped. Never accessed directly.
    _instance: wgpu::Instance,
}

impl GpuContext {
    /// Acquire a GPU context on the best available Vulkan adapter.
    ///
    /// # Errors
    /// [`GpuError::NoSuitableAdapter`] if no Vulkan adapter exists at
    /// all, [`GpuError::DeviceRequest`] if the device request fails.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, GpuError> {
        // Vulkan only. ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER lets
        // wgpu enumerate translation layers (e.g. dzn on WSL2) that
        // declare themselves non-conformant; compute-only dispatch
        // does not rely on any conformance-gated rendering behaviour.
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            flags,
            ..Default::default()
        });

        let all_adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(wgpu::Backends::VULKAN)
            .into_iter()
            .collect();

        if all_adapters.is_empty() {
            return Err(GpuError::NoSuitableAdapter);
        }

        for a in &all_adapters {
            let info = a.get_info();
            eprintln!(
                "[mandelmap] Vulkan adapter: {} ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        // Tier 1: real hardware (or a VM/translation layer fronting
        // real hardware). Tier 2: whatever exists, even software —
        // the adapter name was logged above so the choice is visible.
        let adapter = all_adapters
            .into_iter()
            .find(|a| matches!(
                a.get_info().device_type,
                wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other
            ))
            .or_else(|| instance
                .enumerate_adapters(wgpu::Backends::VULKAN)
                .into_iter()
                .next())
            .ok_or(GpuError::NoSuitableAdapter)?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name,
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("mandelmap"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        Ok(GpuContext {
            device,
            queue,
            adapter_info,
            workgroup_size: WorkgroupSize::DEFAULT,
            _instance: instance,
        })
    }

    /// Override the default workgroup size.
    ///
    /// Returns `Err` if the total invocation count (x * y) exceeds the
    /// device's `max_compute_invocations_per_workgroup`.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<(), GpuError> {
        let total = x * y;
        let max = self.device.limits().max_compute_invocations_per_workgroup;
        if total > max {
            return Err(GpuError::WorkgroupTooLarge { total, max });
        }
        self.workgroup_size = WorkgroupSize { x, y };
        Ok(())
    }

    /// Dispatch dimensions needed to cover a `width × height` grid
    /// with the active workgroup size.
    ///
    /// Ceiling division: the last workgroup in each dimension may hang
    /// past the grid edge, and the kernel guards those lanes with
    ///
    /// ```wgsl
    /// if gid.x >= width || gid.y >= height { return; }
    /// ```
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        dispatch_size(self.workgroup_size, width, height)
    }
}

impl fmt::Display for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuContext {{ adapter: {}, workgroup: {} }}",
            self.adapter_info, self.workgroup_size
        )
    }
}

/// Ceiling-division dispatch math, separated from the context so it is
/// testable without a device.
fn dispatch_size(wg: WorkgroupSize, width: u32, height: u32) -> (u32, u32) {
    let dx = (width + wg.x - 1) / wg.x;
    let dy = (height + wg.y - 1) / wg.y;
    (dx, dy)
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU context acquisition and dispatch. All fatal: the
/// computation is deterministic and stateless, so retrying with the
/// same inputs reproduces the same failure.
#[derive(Debug)]
pub enum GpuError {
    /// No Vulkan adapter found at all — not even a software renderer.
    NoSuitableAdapter,
    /// wgpu device request failed (driver issue, unsupported limits).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Requested workgroup size exceeds the device's invocation limit.
    WorkgroupTooLarge { total: u32, max: u32 },
    /// The divergence map would exceed the device's storage-buffer
    /// binding limit. Detected before any device work is scheduled.
    OutputTooLarge { bytes: u64, max: u64 },
    /// Mapping the readback buffer failed; no partial map is produced.
    Readback(wgpu::BufferAsyncError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoSuitableAdapter => write!(
                f,
                "no Vulkan adapter available; check that a Vulkan driver is \
                 installed and `vulkaninfo` lists a device"
            ),
            GpuError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            GpuError::WorkgroupTooLarge { total, max } => write!(
                f,
                "workgroup size {total} exceeds device limit of {max} invocations"
            ),
            GpuError::OutputTooLarge { bytes, max } => write!(
                f,
                "divergence map of {bytes} bytes exceeds the device's \
                 storage-buffer limit of {max} bytes"
            ),
            GpuError::Readback(e) => write!(f, "result readback failed: {e}"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceRequest(e) => Some(e),
            GpuError::Readback(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================
// Tests
// ============================================================
