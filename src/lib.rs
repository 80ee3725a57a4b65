//! Host-side orchestration for a block-tiled dense matrix multiply on an
//! OpenCL-capable accelerator.  The crate selects a compute platform and
//! device, compiles a kernel program from source at runtime, stages input
//! matrices into device-resident buffers, launches the tiled kernel over a
//! 2D index space and measures wall-clock execution latency.  The API is
//! synchronous and blocking: dispatch drains the queue before and after the
//! timed execution.
//!
//! The orchestration layer is generic over [`Backend`], the raw contract a
//! single-device accelerator runtime must satisfy.  [`HostBackend`] is an
//! in-process reference implementation that requires no driver; enabling the
//! `opencl` feature adds a backend that drives a real OpenCL runtime.
//!
//! The usual sequence is session, compile, stage, dispatch:
//!
//! ```
//! use cl_matmul::{dispatch, BufferSet, HostBackend, Session};
//!
//! # fn main() -> cl_matmul::Result<()> {
//! let session = Session::new(HostBackend::new(), 0, 0)?;
//! let program = session.compile_source(
//!     "__kernel void matrix_multiply_block(__global const float* a, \
//!      __global const float* b, __global float* c, uint pitch) {}",
//! )?;
//! let mat = vec![1.0f32; 16 * 4];
//! let buffers = BufferSet::stage(&session, &program, &mat, &mat, 4)?;
//! let elapsed = dispatch(&session, &buffers)?;
//! # let _ = elapsed;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod program;
pub mod registry;
pub mod session;

// Re-export the most common types at the crate root so that users can
// simply `use cl_matmul::*;`.
pub use backend::{Backend, HostBackend};
#[cfg(feature = "opencl")]
pub use backend::OpenClBackend;
pub use buffer::{BufferSet, KERNEL_ENTRY_POINT};
pub use dispatch::{dispatch, dispatch_with_tile, read_result, DEFAULT_TILE};
pub use error::{Error, Result};
pub use program::CompiledProgram;
pub use registry::{DeviceDesc, DeviceRegistry, PlatformDesc};
pub use session::Session;
