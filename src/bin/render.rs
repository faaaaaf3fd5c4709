// bin/render.rs — evaluate a divergence map and write it as a PNG.
//
// The map is normalized by its maximum divergence count, so the
// slowest-escaping points render brightest and in-set points are
// black.
//
// USAGE
//   cargo run --release --bin render
//   cargo run --release --bin render -- 1920 1280 250
//   cargo run --release --bin render -- --cpu
//
// `--cpu` runs the single-threaded f64 reference evaluator instead of
// the GPU dispatch. Defaults: 1152×768, 100 iterations.

use std::process;
use std::time::Instant;

use mandelmap::escape::CpuEvaluator;
use mandelmap::gpu::context::GpuContext;
use mandelmap::gpu::escape::GpuEvaluator;
use mandelmap::map::EscapeParams;
use mandelmap::render::normalize;

const OUTPUT_PATH: &str = "mandelbrot.png";

fn main() {
    let mut use_cpu = false;
    let mut dims: Vec<u32> = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--cpu" => use_cpu = true,
            other => match other.parse() {
                Ok(v) => dims.push(v),
                Err(_) => {
                    eprintln!("Usage: render [--cpu] [width height iterations]");
                    process::exit(1);
                }
            },
        }
    }

    let width = dims.first().copied().unwrap_or(1152);
    let height = dims.get(1).copied().unwrap_or(768);
    let max_iterations = dims.get(2).copied().unwrap_or(100);

    let params = EscapeParams::new(width, height, max_iterations).unwrap_or_else(|e| {
        eprintln!("Invalid parameters: {e}");
        process::exit(1);
    });
    println!("Evaluating {params}");

    let map = if use_cpu {
        let t0 = Instant::now();
        let map = CpuEvaluator::new().evaluate(&params);
        println!("CPU reference: {:.2} ms", t0.elapsed().as_secs_f64() * 1000.0);
        map
    } else {
        let gpu = GpuContext::new().unwrap_or_else(|e| {
            eprintln!("GPU unavailable: {e}");
            eprintln!("(re-run with --cpu for the reference evaluator)");
            process::exit(1);
        });
        println!("GPU: {}", gpu.adapter_info);

        let evaluator = GpuEvaluator::new(&gpu);
        let t0 = Instant::now();
        let map = evaluator.evaluate(&gpu, &params).unwrap_or_else(|e| {
            eprintln!("Dispatch failed: {e}");
            process::exit(1);
        });
        println!("GPU dispatch + readback: {:.2} ms", t0.elapsed().as_secs_f64() * 1000.0);
        map
    };

    println!("Max divergence: {} iterations", map.max_divergence());

    let pixels = normalize(&map);
    let img = image::GrayImage::from_raw(map.width(), map.height(), pixels)
        .expect("normalized buffer matches map dimensions");
    img.save(OUTPUT_PATH).unwrap_or_else(|e| {
        eprintln!("Failed to write {OUTPUT_PATH}: {e}");
        process::exit(1);
    });
    println!("→ {OUTPUT_PATH}");
}
