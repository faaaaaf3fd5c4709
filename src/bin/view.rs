// bin/view.rs — evaluate a divergence map and show it in a window.
//
// USAGE
//   cargo run --release --bin view
//   cargo run --release --bin view -- 1440 960 200
//   cargo run --release --bin view -- --cpu
//
// Controls:
//   Q/Esc — quit

use std::process;
use std::time::Instant;

use minifb::{Key, Window, WindowOptions};

use mandelmap::escape::CpuEvaluator;
use mandelmap::gpu::context::GpuContext;
use mandelmap::gpu::escape::GpuEvaluator;
use mandelmap::map::EscapeParams;
use mandelmap::render::normalize;

fn main() {
    let mut use_cpu = false;
    let mut dims: Vec<u32> = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--cpu" => use_cpu = true,
            other => match other.parse() {
                Ok(v) => dims.push(v),
                Err(_) => {
                    eprintln!("Usage: view [--cpu] [width height iterations]");
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

    let t0 = Instant::now();
    let map = if use_cpu {
        CpuEvaluator::new().evaluate(&params)
    } else {
        let gpu = GpuContext::new().unwrap_or_else(|e| {
            eprintln!("GPU unavailable: {e}");
            eprintln!("(re-run with --cpu for the reference evaluator)");
            process::exit(1);
        });
        println!("GPU: {}", gpu.adapter_info);
        GpuEvaluator::new(&gpu).evaluate(&gpu, &params).unwrap_or_else(|e| {
            eprintln!("Dispatch failed: {e}");
            process::exit(1);
        })
    };
    println!("Evaluated {params} in {:.2} ms",
        t0.elapsed().as_secs_f64() * 1000.0);

    // Grayscale → packed 0RGB for minifb.
    let framebuffer: Vec<u32> = normalize(&map)
        .into_iter()
        .map(|v| {
            let v = v as u32;
            (v << 16) | (v << 8) | v
        })
        .collect();

    let mut window = Window::new(
        "mandelmap — Q/Esc to quit",
        width as usize,
        height as usize,
        WindowOptions::default(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Failed to open window: {e}");
        process::exit(1);
    });
    window.set_target_fps(60);

    while window.is_open()
        && !window.is_key_down(Key::Escape)
        && !window.is_key_down(Key::Q)
    {
        window
            .update_with_buffer(&framebuffer, width as usize, height as usize)
            .unwrap_or_else(|e| {
                eprintln!("Window update failed: {e}");
                process::exit(1);
            });
    }
}
