//! The raw accelerator contract.
//!
//! [`Backend`] captures the operations any single-device accelerator runtime
//! must satisfy for the orchestration layer to drive it: platform and device
//! enumeration, context and queue creation, runtime program compilation with
//! build-diagnostic capture, buffer allocation, kernel argument binding, and
//! NDRange enqueue.  The session, compiler, stager and dispatcher are generic
//! over this trait and never touch a native API directly.
//!
//! Two implementations are provided: [`HostBackend`], an in-process reference
//! that executes the block multiply on the CPU and needs no driver, and
//! (behind the `opencl` feature) [`OpenClBackend`], which drives a real
//! OpenCL runtime through the `ocl` crate.

use std::fmt::Debug;

use crate::error::Result;

pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;

pub use host::HostBackend;
#[cfg(feature = "opencl")]
pub use opencl::OpenClBackend;

/// Raw operations of a single-device accelerator runtime.
///
/// Handle types are opaque to the orchestration layer.  All methods take
/// `&self`; a backend value is cheap to clone and clones share any internal
/// bookkeeping state.
pub trait Backend: Clone {
    type Platform: Clone;
    type Device: Clone + Debug;
    type Context: Debug;
    type Queue: Debug;
    type Program: Debug;
    type Kernel: Debug;
    type Buffer: Debug;

    /// Enumerate the available platforms.
    fn platforms(&self) -> Result<Vec<Self::Platform>>;

    /// Human-readable platform name.
    fn platform_name(&self, platform: &Self::Platform) -> Result<String>;

    /// Enumerate the devices exposed by `platform`.
    fn devices(&self, platform: &Self::Platform) -> Result<Vec<Self::Device>>;

    /// Human-readable device name.
    fn device_name(&self, device: &Self::Device) -> Result<String>;

    /// Create a context bound to `platform`, covering all its device types.
    fn create_context(&self, platform: &Self::Platform) -> Result<Self::Context>;

    /// Re-derive the device list from a live context.  Context creation is
    /// authoritative for which devices are actually bound; the set may be
    /// narrower than the platform enumeration.
    fn context_devices(&self, context: &Self::Context) -> Result<Vec<Self::Device>>;

    /// Create an in-order execution queue against one device of `context`.
    fn create_queue(&self, context: &Self::Context, device: &Self::Device)
        -> Result<Self::Queue>;

    /// Build a program from source against `devices`.
    ///
    /// On build failure the implementation must retrieve, for `target`, the
    /// build status, options and log from the still-live program handle and
    /// return them inside [`Error::Compilation`].
    ///
    /// [`Error::Compilation`]: crate::error::Error::Compilation
    fn build_program(
        &self,
        context: &Self::Context,
        devices: &[Self::Device],
        target: &Self::Device,
        source: &str,
    ) -> Result<Self::Program>;

    /// Look up a kernel entry point by name.  Fails with
    /// [`Error::Configuration`] when the entry point is absent.
    ///
    /// [`Error::Configuration`]: crate::error::Error::Configuration
    fn create_kernel(&self, program: &Self::Program, name: &str) -> Result<Self::Kernel>;

    /// Allocate a read-only device buffer, copy-initialized from `data` at
    /// creation time (a single blocking host-to-device transfer).
    fn create_input_buffer(&self, context: &Self::Context, data: &[f32])
        -> Result<Self::Buffer>;

    /// Allocate a read-write device buffer of `len` elements, uninitialized.
    fn create_output_buffer(&self, context: &Self::Context, len: usize)
        -> Result<Self::Buffer>;

    /// Bind a buffer to a positional kernel argument.
    fn set_buffer_arg(&self, kernel: &Self::Kernel, index: u32, buffer: &Self::Buffer)
        -> Result<()>;

    /// Bind a scalar to a positional kernel argument.
    fn set_scalar_arg(&self, kernel: &Self::Kernel, index: u32, value: u32) -> Result<()>;

    /// Enqueue one 2D NDRange execution of `kernel`.  Asynchronous: returns
    /// once the job is queued, not once it has run.
    fn enqueue(
        &self,
        queue: &Self::Queue,
        kernel: &Self::Kernel,
        global: [usize; 2],
        local: [usize; 2],
    ) -> Result<()>;

    /// Block until every command queued so far has completed.
    fn finish(&self, queue: &Self::Queue) -> Result<()>;

    /// Blocking device-to-host read of the buffer contents into `out`.
    fn read_buffer(&self, queue: &Self::Queue, buffer: &Self::Buffer, out: &mut [f32])
        -> Result<()>;
}
