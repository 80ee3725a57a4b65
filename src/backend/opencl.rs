//! OpenCL backend built on the `ocl` crate.
//!
//! Platform, device, context and queue handles use `ocl`'s high-level
//! wrappers; program build, kernel creation, argument binding and NDRange
//! enqueue go through `ocl::core` so that build diagnostics can be retrieved
//! from the program handle while it is still alive after a failed build.
//!
//! All native handles release their resources on drop, so the session's
//! ownership order (buffers and kernels dropped before the queue, queue
//! before the context) gives deterministic teardown.

use std::ffi::CString;
use std::fmt::Display;

use ocl::builders::ContextProperties;
use ocl::core::{self, ArgVal, ProgramBuildInfo, ProgramBuildInfoResult};
use ocl::flags::MemFlags;
use ocl::{Context, Device, Platform, Queue};

use crate::backend::Backend;
use crate::error::{Error, Result};

fn runtime<E: Display>(err: E) -> Error {
    Error::Runtime(err.to_string())
}

/// Backend driving a real OpenCL runtime.
#[derive(Debug, Clone, Default)]
pub struct OpenClBackend;

impl OpenClBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for OpenClBackend {
    type Platform = Platform;
    type Device = Device;
    type Context = Context;
    type Queue = Queue;
    type Program = core::Program;
    type Kernel = core::Kernel;
    type Buffer = core::Mem;

    fn platforms(&self) -> Result<Vec<Platform>> {
        Ok(Platform::list())
    }

    fn platform_name(&self, platform: &Platform) -> Result<String> {
        platform.name().map_err(runtime)
    }

    fn devices(&self, platform: &Platform) -> Result<Vec<Device>> {
        Device::list_all(platform).map_err(runtime)
    }

    fn device_name(&self, device: &Device) -> Result<String> {
        device.name().map_err(runtime)
    }

    fn create_context(&self, platform: &Platform) -> Result<Context> {
        // Bind the context to the platform through a context property and let
        // it cover every device type, as the companion kernel makes no
        // assumptions about the device class.
        let properties = ContextProperties::new().platform(*platform);
        Context::builder()
            .properties(properties)
            .build()
            .map_err(runtime)
    }

    fn context_devices(&self, context: &Context) -> Result<Vec<Device>> {
        Ok(context.devices())
    }

    fn create_queue(&self, context: &Context, device: &Device) -> Result<Queue> {
        Queue::new(context, *device, None).map_err(runtime)
    }

    fn build_program(
        &self,
        context: &Context,
        devices: &[Device],
        target: &Device,
        source: &str,
    ) -> Result<core::Program> {
        let src = CString::new(source)
            .map_err(|_| Error::Validation("kernel source contains a NUL byte".into()))?;
        let program =
            core::create_program_with_source(context.as_core(), &[src]).map_err(runtime)?;
        let options = CString::default();
        let device_ids: Vec<core::DeviceId> = devices.iter().map(|d| *d.as_core()).collect();
        if core::build_program(&program, Some(&device_ids), &options, None, None).is_err() {
            // The diagnostics are only retrievable while the program handle
            // is alive; query status, options and log in that order before
            // the handle drops.
            let status = match core::get_program_build_info(
                &program,
                *target.as_core(),
                ProgramBuildInfo::BuildStatus,
            ) {
                Ok(ProgramBuildInfoResult::BuildStatus(status)) => status as i32,
                _ => -2,
            };
            let options = match core::get_program_build_info(
                &program,
                *target.as_core(),
                ProgramBuildInfo::BuildOptions,
            ) {
                Ok(ProgramBuildInfoResult::BuildOptions(opts)) => opts,
                _ => String::new(),
            };
            let log = match core::get_program_build_info(
                &program,
                *target.as_core(),
                ProgramBuildInfo::BuildLog,
            ) {
                Ok(ProgramBuildInfoResult::BuildLog(log)) => log,
                _ => "build log unavailable".into(),
            };
            return Err(Error::Compilation {
                status,
                options,
                log,
            });
        }
        Ok(program)
    }

    fn create_kernel(&self, program: &core::Program, name: &str) -> Result<core::Kernel> {
        core::create_kernel(program, name).map_err(|err| {
            Error::Configuration(format!("kernel entry point `{name}` not found: {err}"))
        })
    }

    fn create_input_buffer(&self, context: &Context, data: &[f32]) -> Result<core::Mem> {
        unsafe {
            core::create_buffer(
                context.as_core(),
                MemFlags::new().read_only().copy_host_ptr(),
                data.len(),
                Some(data),
            )
        }
        .map_err(runtime)
    }

    fn create_output_buffer(&self, context: &Context, len: usize) -> Result<core::Mem> {
        unsafe {
            core::create_buffer::<_, f32>(context.as_core(), MemFlags::new().read_write(), len, None)
        }
        .map_err(runtime)
    }

    fn set_buffer_arg(&self, kernel: &core::Kernel, index: u32, buffer: &core::Mem) -> Result<()> {
        core::set_kernel_arg(kernel, index, ArgVal::mem(buffer)).map_err(runtime)
    }

    fn set_scalar_arg(&self, kernel: &core::Kernel, index: u32, value: u32) -> Result<()> {
        core::set_kernel_arg(kernel, index, ArgVal::scalar(&value)).map_err(runtime)
    }

    fn enqueue(
        &self,
        queue: &Queue,
        kernel: &core::Kernel,
        global: [usize; 2],
        local: [usize; 2],
    ) -> Result<()> {
        let global = [global[0], global[1], 1];
        let local = [local[0], local[1], 1];
        unsafe {
            core::enqueue_kernel(
                queue.as_core(),
                kernel,
                2,
                None,
                &global,
                Some(local),
                None::<core::Event>,
                None::<&mut core::Event>,
            )
        }
        .map_err(runtime)
    }

    fn finish(&self, queue: &Queue) -> Result<()> {
        queue.finish().map_err(runtime)
    }

    fn read_buffer(&self, queue: &Queue, buffer: &core::Mem, out: &mut [f32]) -> Result<()> {
        unsafe {
            core::enqueue_read_buffer(
                queue.as_core(),
                buffer,
                true,
                0,
                out,
                None::<core::Event>,
                None::<&mut core::Event>,
            )
        }
        .map_err(runtime)
    }
}
