//! Instruments a small numerical workload with the profiler lifecycle.
//!
//! Shows named timers, a one-shot timed block and a loop profile, all reported as fixed-layout
//! lines on stdout. Diagnostics from the library go to stderr.
//!
//! Run with: `cargo run --example block_timer_basic`.
#![expect(
    clippy::arithmetic_side_effects,
    clippy::cast_precision_loss,
    reason = "this is example code that does not need production-level safety"
)]

use std::hint::black_box;
use std::io;
use std::ops::ControlFlow;

use block_timer::Profiler;

const SIZE: usize = 200;

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let mut profiler = Profiler::new();
    profiler.begin().unwrap();

    // Fix the report order before anything runs.
    profiler.declare(["assemble", "multiply"]).unwrap();

    let matrix = profiler
        .measure("assemble", |_| {
            (0..SIZE * SIZE)
                .map(|i| (i % 7) as f64 + 0.5)
                .collect::<Vec<_>>()
        })
        .unwrap();
    let vector = vec![1.0_f64; SIZE];

    for _ in 0..5 {
        profiler.start("multiply").unwrap();
        black_box(multiply(&matrix, &vector));
        profiler.stop("multiply").unwrap();
    }

    profiler
        .time_block("norm", |_| {
            black_box(matrix.iter().map(|x| x * x).sum::<f64>().sqrt());
        })
        .unwrap();

    let mut residual = 1.0_f64;
    profiler
        .run_loop(50, "relax", |_| {
            residual *= 0.5;
            black_box(multiply(&matrix, &vector));

            if residual < 1e-6 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

    let report = profiler.finalize().unwrap();

    println!();
    println!("Mean time per label:");
    for entry in report.entries() {
        println!(
            "  {}: {:?} over {} calls",
            entry.label(),
            entry.mean(),
            entry.invocation_count()
        );
    }
}

fn multiply(matrix: &[f64], vector: &[f64]) -> Vec<f64> {
    matrix
        .chunks_exact(vector.len())
        .map(|row| row.iter().zip(vector).map(|(a, b)| a * b).sum())
        .collect()
}
