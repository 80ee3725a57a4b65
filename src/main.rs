//! Command-line driver for the block-tiled matrix multiply.
//!
//! Selects a platform and device, compiles the companion kernel from a
//! source file, stages two randomly generated input matrices and times one
//! or more dispatches.  Builds drive the in-process reference backend by
//! default; with the `opencl` feature the same sequence runs against a real
//! OpenCL runtime.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;
use rand::Rng;

use cl_matmul::{dispatch, read_result, Backend, BufferSet, Session};

/// Time a block-tiled matrix multiplication on an accelerator device.
#[derive(Parser, Debug)]
#[command(name = "cl_matmul")]
#[command(about = "Block-tiled matrix multiply on an OpenCL-capable device", version)]
struct Cli {
    /// Platform selection
    #[arg(short, long, default_value_t = 0)]
    platform: usize,

    /// Device selection
    #[arg(short, long, default_value_t = 0)]
    device: usize,

    /// Kernel source file
    #[arg(short, long, default_value = "./matrix_multiply.cl")]
    kernel: PathBuf,

    /// Row width of both input matrices, in elements
    #[arg(long, default_value_t = 128)]
    pitch: u32,

    /// Number of rows in matrix A (must be divisible by the 16-wide tile)
    #[arg(long, default_value_t = 512)]
    rows_a: usize,

    /// Number of rows in matrix B (must be divisible by the 16-wide tile)
    #[arg(long, default_value_t = 512)]
    rows_b: usize,

    /// Number of timed dispatches against the staged buffers
    #[arg(long, default_value_t = 1)]
    runs: u32,
}

#[cfg(feature = "opencl")]
fn backend() -> impl Backend {
    cl_matmul::OpenClBackend::new()
}

#[cfg(not(feature = "opencl"))]
fn backend() -> impl Backend {
    cl_matmul::HostBackend::new()
}

fn run(cli: &Cli) -> cl_matmul::Result<()> {
    println!("platform id     : {}", cli.platform);
    println!("device id       : {}", cli.device);

    let session = Session::new(backend(), cli.platform, cli.device)?;
    let program = session.compile_file(&cli.kernel)?;

    let mut rng = rand::thread_rng();
    let mat_a: Vec<f32> = (0..cli.rows_a * cli.pitch as usize)
        .map(|_| rng.gen_range(0.0f32..1.0))
        .collect();
    let mat_b: Vec<f32> = (0..cli.rows_b * cli.pitch as usize)
        .map(|_| rng.gen_range(0.0f32..1.0))
        .collect();
    info!(
        "staging {}x{} and {}x{} inputs (pitch {})",
        cli.rows_a, cli.pitch, cli.rows_b, cli.pitch, cli.pitch
    );
    let buffers = BufferSet::stage(&session, &program, &mat_a, &mat_b, cli.pitch)?;

    for run in 0..cli.runs {
        let elapsed = dispatch(&session, &buffers)?;
        println!("run {run:>3} elapsed : {elapsed:?}");
    }

    // The output stays device-resident during the timed runs; fetch it once
    // at the end so the work is observable.
    let result = read_result(&session, &buffers)?;
    let checksum: f32 = result.iter().sum();
    println!("result elements : {}", result.len());
    println!("result checksum : {checksum}");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error           : {err}");
            ExitCode::FAILURE
        }
    }
}
