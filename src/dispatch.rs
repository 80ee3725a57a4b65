//! Kernel dispatch with timing instrumentation.
//!
//! Free functions in the spirit of a thin dispatch layer: [`dispatch`] binds
//! the staged buffers and the pitch scalar to the kernel, partitions a 2D
//! index space over the input row counts, enqueues one execution and returns
//! the elapsed wall-clock time of that execution alone.  Every call re-binds
//! all arguments unconditionally; re-binding is idempotent and cheap, and it
//! avoids state-tracking bugs from partial rebinds.
//!
//! The timer brackets only device execution: the queue is drained before the
//! timer starts (so queued predecessors are not measured) and drained again
//! before it stops.  Both drains block; a hung device-side kernel blocks the
//! host indefinitely, there is no watchdog.
//!
//! Dispatch does not copy the output back to the host.  The result stays
//! device-resident; [`read_result`] performs the explicit device-to-host
//! transfer when host-visible values are needed.

use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::buffer::BufferSet;
use crate::error::{Error, Result};
use crate::session::Session;

/// Local work-group size expected by the companion kernel.
///
/// This tiling is a contract between dispatcher and kernel: the kernel's
/// group layout assumes 16x16 tiles, and the global work size must be
/// divisible by the tile in both dimensions.
pub const DEFAULT_TILE: [usize; 2] = [16, 16];

/// Dispatch one execution with the default 16x16 tile.
pub fn dispatch<B: Backend>(session: &Session<B>, buffers: &BufferSet<B>) -> Result<Duration> {
    dispatch_with_tile(session, buffers, DEFAULT_TILE)
}

/// Dispatch one execution with an explicit local tile and time it.
///
/// The global work size is `(rows_a, rows_b)`.  Repeated calls against the
/// same [`BufferSet`] are legal and expected; each call re-binds arguments
/// and independently times one enqueue-and-wait cycle.
pub fn dispatch_with_tile<B: Backend>(
    session: &Session<B>,
    buffers: &BufferSet<B>,
    tile: [usize; 2],
) -> Result<Duration> {
    let backend = session.backend();

    // Fixed positional argument order: A, B, C, pitch.
    backend.set_buffer_arg(&buffers.kernel, 0, &buffers.mat_a)?;
    backend.set_buffer_arg(&buffers.kernel, 1, &buffers.mat_b)?;
    backend.set_buffer_arg(&buffers.kernel, 2, &buffers.result)?;
    backend.set_scalar_arg(&buffers.kernel, 3, buffers.pitch())?;

    let global = [buffers.rows_a(), buffers.rows_b()];
    for (g, l) in global.iter().zip(tile.iter()) {
        if *l == 0 || g % l != 0 {
            return Err(Error::Validation(format!(
                "global work size {g} is not divisible by tile size {l}"
            )));
        }
    }

    // Drain in-flight work so the timer brackets only this dispatch.
    backend.finish(session.queue())?;
    let start = Instant::now();
    backend.enqueue(session.queue(), &buffers.kernel, global, tile)?;
    backend.finish(session.queue())?;
    Ok(start.elapsed())
}

/// Copy the device-resident output buffer back to the host.
pub fn read_result<B: Backend>(session: &Session<B>, buffers: &BufferSet<B>) -> Result<Vec<f32>> {
    let mut out = vec![0.0f32; buffers.result_len()];
    session
        .backend()
        .read_buffer(session.queue(), &buffers.result, &mut out)?;
    Ok(out)
}
