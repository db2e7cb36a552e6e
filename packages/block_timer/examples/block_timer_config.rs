//! Configures profiling from TOML and writes the report into a run directory.
//!
//! The label list restricts instrumentation to the phases of interest; everything else runs
//! unmeasured. Afterwards the run directory is listed.
//!
//! Run with: `cargo run --example block_timer_config`.

use std::env;
use std::fs;
use std::hint::black_box;
use std::io;
use std::process;

use block_timer::fileio::{EntryKind, make_dir, read_all_lines, remove_dir, walk};
use block_timer::{Profiler, ProfilerConfig};

fn main() -> Result<(), block_timer::Error> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let run_dir = env::temp_dir().join(format!("block_timer_run_{}", process::id()));
    make_dir(&run_dir)?;

    let log = run_dir.join("timings.log");
    let config = ProfilerConfig::from_toml_str(&format!(
        r#"
        clock = "process_cpu"
        session_comment = "solver"
        labels = ["solve"]

        [sink]
        kind = "file"
        path = {log:?}
        "#
    ))?;

    let mut profiler = Profiler::with_config(&config)?;
    profiler.begin()?;

    // Not instrumented: the start and stop succeed but measure nothing.
    profiler.start("read_input")?;
    black_box((0..10_000_u64).sum::<u64>());
    profiler.stop("read_input")?;

    profiler.measure("solve", |_| {
        black_box((1..1_000_000_u64).fold(1_u64, |acc, i| acc.wrapping_mul(i | 1)))
    })?;
    profiler.finalize()?;

    for entry in walk(&run_dir)? {
        let marker = match entry.kind() {
            EntryKind::Directory => "dir ",
            EntryKind::File => "file",
        };
        println!("{marker} {}", entry.path().display());
    }

    for line in read_all_lines(&log)? {
        println!("{line}");
    }

    fs::remove_file(&log).map_err(|source| block_timer::Error::Io {
        path: log.clone(),
        source,
    })?;
    remove_dir(&run_dir)?;

    Ok(())
}
