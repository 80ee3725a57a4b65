//! In-process reference backend.
//!
//! Implements the [`Backend`] contract on the host CPU so the orchestration
//! layer can be exercised without an installed accelerator runtime.  The
//! "device" executes the block-multiply kernel contract directly: argument 0
//! and 1 are the input matrices, argument 2 the output, argument 3 the pitch,
//! and one work item computes one output element.  Compilation is simulated:
//! the source must declare at least one `__kernel void name(...)` entry point
//! and must not contain an `#error` directive.
//!
//! The backend counts buffer allocations so tests can assert that failed
//! staging calls allocate nothing and that repeated dispatches do not grow
//! resources.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::backend::Backend;
use crate::error::{Error, Result};

/// Build status value reported for simulated compilation failures, matching
/// the CL_BUILD_ERROR constant of the native API.
const BUILD_ERROR_STATUS: i32 = -2;

#[derive(Debug, Clone)]
pub struct HostPlatform {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct HostDevice {
    pub name: String,
}

#[derive(Debug)]
pub struct HostContext {
    devices: Vec<HostDevice>,
}

/// Command queue stand-in.  Work is executed eagerly at enqueue time, so
/// `finish` has nothing to wait for; the enqueue counter exists for test
/// instrumentation only.
#[derive(Debug, Default)]
pub struct HostQueue {
    enqueued: Cell<u64>,
}

impl HostQueue {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.get()
    }
}

#[derive(Debug)]
pub struct HostProgram {
    kernel_names: Vec<String>,
}

#[derive(Debug, Clone)]
enum HostArg {
    Buffer(HostBuffer),
    Scalar(u32),
}

/// Kernel handle carrying the positional argument bindings.
#[derive(Debug)]
pub struct HostKernel {
    name: String,
    args: RefCell<[Option<HostArg>; 4]>,
}

/// Device buffer backed by host memory.  Clones share storage, mirroring the
/// reference-counted handle semantics of native buffer objects.
#[derive(Debug, Clone)]
pub struct HostBuffer {
    data: Rc<RefCell<Vec<f32>>>,
    read_only: bool,
}

impl HostBuffer {
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}

/// Reference implementation of the accelerator contract.
///
/// Exposes one platform with one device.  Clones share the allocation
/// counter.
#[derive(Debug, Clone, Default)]
pub struct HostBackend {
    allocations: Rc<Cell<usize>>,
}

impl HostBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of device buffers allocated through this backend so far.
    pub fn buffer_allocations(&self) -> usize {
        self.allocations.get()
    }
}

fn required_arg<'a>(args: &'a [Option<HostArg>; 4], slot: usize) -> Result<&'a HostArg> {
    args[slot]
        .as_ref()
        .ok_or_else(|| Error::Runtime(format!("kernel argument {slot} not set")))
}

/// Extract `__kernel void name(` entry-point names from OpenCL C source.
fn kernel_names(source: &str) -> Vec<String> {
    source
        .split("__kernel")
        .skip(1)
        .filter_map(|fragment| {
            let after_void = fragment.trim_start().strip_prefix("void ")?;
            let name = after_void.split('(').next()?.trim();
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

impl Backend for HostBackend {
    type Platform = HostPlatform;
    type Device = HostDevice;
    type Context = HostContext;
    type Queue = HostQueue;
    type Program = HostProgram;
    type Kernel = HostKernel;
    type Buffer = HostBuffer;

    fn platforms(&self) -> Result<Vec<HostPlatform>> {
        Ok(vec![HostPlatform {
            name: "Host Reference Platform".into(),
        }])
    }

    fn platform_name(&self, platform: &HostPlatform) -> Result<String> {
        Ok(platform.name.clone())
    }

    fn devices(&self, _platform: &HostPlatform) -> Result<Vec<HostDevice>> {
        Ok(vec![HostDevice {
            name: "Host Reference CPU".into(),
        }])
    }

    fn device_name(&self, device: &HostDevice) -> Result<String> {
        Ok(device.name.clone())
    }

    fn create_context(&self, platform: &HostPlatform) -> Result<HostContext> {
        Ok(HostContext {
            devices: self.devices(platform)?,
        })
    }

    fn context_devices(&self, context: &HostContext) -> Result<Vec<HostDevice>> {
        Ok(context.devices.clone())
    }

    fn create_queue(&self, _context: &HostContext, _device: &HostDevice) -> Result<HostQueue> {
        Ok(HostQueue::default())
    }

    fn build_program(
        &self,
        _context: &HostContext,
        _devices: &[HostDevice],
        _target: &HostDevice,
        source: &str,
    ) -> Result<HostProgram> {
        if let Some(line) = source.lines().find(|l| l.trim_start().starts_with("#error")) {
            return Err(Error::Compilation {
                status: BUILD_ERROR_STATUS,
                options: String::new(),
                log: format!("error directive encountered: {}", line.trim()),
            });
        }
        let names = kernel_names(source);
        if names.is_empty() {
            return Err(Error::Compilation {
                status: BUILD_ERROR_STATUS,
                options: String::new(),
                log: "no __kernel entry point found in source".into(),
            });
        }
        Ok(HostProgram {
            kernel_names: names,
        })
    }

    fn create_kernel(&self, program: &HostProgram, name: &str) -> Result<HostKernel> {
        if !program.kernel_names.iter().any(|n| n == name) {
            return Err(Error::Configuration(format!(
                "kernel entry point `{name}` not found in program"
            )));
        }
        Ok(HostKernel {
            name: name.to_string(),
            args: RefCell::new([None, None, None, None]),
        })
    }

    fn create_input_buffer(&self, _context: &HostContext, data: &[f32]) -> Result<HostBuffer> {
        self.allocations.set(self.allocations.get() + 1);
        Ok(HostBuffer {
            data: Rc::new(RefCell::new(data.to_vec())),
            read_only: true,
        })
    }

    fn create_output_buffer(&self, _context: &HostContext, len: usize) -> Result<HostBuffer> {
        self.allocations.set(self.allocations.get() + 1);
        Ok(HostBuffer {
            data: Rc::new(RefCell::new(vec![0.0; len])),
            read_only: false,
        })
    }

    fn set_buffer_arg(&self, kernel: &HostKernel, index: u32, buffer: &HostBuffer) -> Result<()> {
        let slot = usize::try_from(index)
            .ok()
            .filter(|i| *i < 4)
            .ok_or_else(|| Error::Runtime(format!("kernel argument index {index} out of range")))?;
        kernel.args.borrow_mut()[slot] = Some(HostArg::Buffer(buffer.clone()));
        Ok(())
    }

    fn set_scalar_arg(&self, kernel: &HostKernel, index: u32, value: u32) -> Result<()> {
        let slot = usize::try_from(index)
            .ok()
            .filter(|i| *i < 4)
            .ok_or_else(|| Error::Runtime(format!("kernel argument index {index} out of range")))?;
        kernel.args.borrow_mut()[slot] = Some(HostArg::Scalar(value));
        Ok(())
    }

    fn enqueue(
        &self,
        queue: &HostQueue,
        kernel: &HostKernel,
        global: [usize; 2],
        local: [usize; 2],
    ) -> Result<()> {
        for (g, l) in global.iter().zip(local.iter()) {
            if *l == 0 || g % l != 0 {
                return Err(Error::Runtime(format!(
                    "local work size {l} does not divide global work size {g}"
                )));
            }
        }
        let args = kernel.args.borrow();
        let (mat_a, mat_b, out) = match (
            required_arg(&args, 0)?,
            required_arg(&args, 1)?,
            required_arg(&args, 2)?,
        ) {
            (HostArg::Buffer(a), HostArg::Buffer(b), HostArg::Buffer(c)) => (a, b, c),
            _ => {
                return Err(Error::Runtime(format!(
                    "kernel `{}` expects buffers at arguments 0..=2",
                    kernel.name
                )))
            }
        };
        let pitch = match required_arg(&args, 3)? {
            HostArg::Scalar(p) => *p as usize,
            HostArg::Buffer(_) => {
                return Err(Error::Runtime(format!(
                    "kernel `{}` expects a scalar pitch at argument 3",
                    kernel.name
                )))
            }
        };
        if out.read_only {
            return Err(Error::Runtime("output buffer is read-only".into()));
        }

        let a = mat_a.data.borrow();
        let b = mat_b.data.borrow();
        let mut c = out.data.borrow_mut();
        let (rows_a, rows_b) = (global[0], global[1]);
        if a.len() < rows_a * pitch || b.len() < rows_b * pitch || c.len() < rows_a * rows_b {
            return Err(Error::Runtime(
                "buffer sizes do not cover the requested work size".into(),
            ));
        }
        // One work item per output element: dot product of row i of A with
        // row j of B, both of width `pitch`.
        for i in 0..rows_a {
            for j in 0..rows_b {
                let mut sum = 0.0f32;
                for k in 0..pitch {
                    sum += a[i * pitch + k] * b[j * pitch + k];
                }
                c[i * rows_b + j] = sum;
            }
        }
        queue.enqueued.set(queue.enqueued.get() + 1);
        Ok(())
    }

    fn finish(&self, _queue: &HostQueue) -> Result<()> {
        Ok(())
    }

    fn read_buffer(&self, _queue: &HostQueue, buffer: &HostBuffer, out: &mut [f32]) -> Result<()> {
        let data = buffer.data.borrow();
        if out.len() > data.len() {
            return Err(Error::Runtime(format!(
                "read of {} elements exceeds buffer length {}",
                out.len(),
                data.len()
            )));
        }
        out.copy_from_slice(&data[..out.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_SRC: &str = "__kernel void matrix_multiply_block(__global const float* a) {}";

    #[test]
    fn extracts_kernel_names_from_source() {
        let names = kernel_names(
            "__kernel void first(__global float* x) {}\n__kernel void second() {}",
        );
        assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn build_rejects_source_without_entry_point() {
        let backend = HostBackend::new();
        let platform = backend.platforms().unwrap().remove(0);
        let ctx = backend.create_context(&platform).unwrap();
        let devices = backend.context_devices(&ctx).unwrap();
        let err = backend
            .build_program(&ctx, &devices, &devices[0], "float not_a_kernel;")
            .unwrap_err();
        match err {
            Error::Compilation { status, log, .. } => {
                assert_eq!(status, -2);
                assert!(!log.is_empty());
            }
            other => panic!("expected Compilation, got {other:?}"),
        }
    }

    #[test]
    fn build_rejects_error_directive() {
        let backend = HostBackend::new();
        let platform = backend.platforms().unwrap().remove(0);
        let ctx = backend.create_context(&platform).unwrap();
        let devices = backend.context_devices(&ctx).unwrap();
        let err = backend
            .build_program(&ctx, &devices, &devices[0], "#error broken\n")
            .unwrap_err();
        assert!(matches!(err, Error::Compilation { .. }));
    }

    #[test]
    fn missing_entry_point_is_a_configuration_error() {
        let backend = HostBackend::new();
        let platform = backend.platforms().unwrap().remove(0);
        let ctx = backend.create_context(&platform).unwrap();
        let devices = backend.context_devices(&ctx).unwrap();
        let program = backend
            .build_program(&ctx, &devices, &devices[0], VALID_SRC)
            .unwrap();
        let err = backend.create_kernel(&program, "no_such_kernel").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn allocation_counter_tracks_buffers() {
        let backend = HostBackend::new();
        let platform = backend.platforms().unwrap().remove(0);
        let ctx = backend.create_context(&platform).unwrap();
        assert_eq!(backend.buffer_allocations(), 0);
        let _a = backend.create_input_buffer(&ctx, &[1.0, 2.0]).unwrap();
        let _c = backend.create_output_buffer(&ctx, 4).unwrap();
        assert_eq!(backend.buffer_allocations(), 2);
    }

    #[test]
    fn enqueue_rejects_non_dividing_local_size() {
        let backend = HostBackend::new();
        let platform = backend.platforms().unwrap().remove(0);
        let ctx = backend.create_context(&platform).unwrap();
        let devices = backend.context_devices(&ctx).unwrap();
        let program = backend
            .build_program(&ctx, &devices, &devices[0], VALID_SRC)
            .unwrap();
        let kernel = backend
            .create_kernel(&program, "matrix_multiply_block")
            .unwrap();
        let queue = backend.create_queue(&ctx, &devices[0]).unwrap();
        let err = backend
            .enqueue(&queue, &kernel, [10, 10], [16, 16])
            .unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }
}
