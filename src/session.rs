//! Accelerator session initialization.
//!
//! This module provides the [`Session`] type, the unit of resource ownership
//! for one selected device: it holds the context, the device list derived
//! from that context, and the execution queue.  Creating a session validates
//! the platform and device indices against what the runtime actually
//! exposes.  Everything built later (programs, buffers, kernels) borrows the
//! session and is dropped before it, so teardown order is deterministic.

use log::info;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::registry::DeviceRegistry;

/// A session encapsulates all state needed to submit work to one device.
///
/// The context is created by platform and owns every device handle used
/// afterwards.  The device list is re-derived from the context rather than
/// reusing the platform enumeration, because a context may expose a
/// narrower device set than the platform did; the device index is therefore
/// validated twice.  Resource creation failures are fatal: there is no
/// retry.
#[derive(Debug)]
pub struct Session<B: Backend> {
    backend: B,
    context: B::Context,
    devices: Vec<B::Device>,
    queue: B::Queue,
    device_index: usize,
}

impl<B: Backend> Session<B> {
    /// Create a session bound to `devices[device_index]` of
    /// `platforms[platform_index]`.
    ///
    /// Fails with [`Error::Configuration`] when either index is out of range
    /// at either enumeration point, or [`Error::Runtime`] when the
    /// underlying accelerator layer refuses context or queue creation.
    pub fn new(backend: B, platform_index: usize, device_index: usize) -> Result<Self> {
        let registry = DeviceRegistry::new(backend.clone());
        registry.validate(platform_index, device_index)?;
        info!("device used     : {device_index}");

        let platform = registry.platform(platform_index)?;
        let context = backend.create_context(&platform)?;
        // Context creation is authoritative for which devices are bound;
        // re-check the index against the context's own list.
        let devices = backend.context_devices(&context)?;
        if device_index >= devices.len() {
            return Err(Error::Configuration(format!(
                "unknown device {device_index}: context exposes {} device(s)",
                devices.len()
            )));
        }
        let queue = backend.create_queue(&context, &devices[device_index])?;

        Ok(Self {
            backend,
            context,
            devices,
            queue,
            device_index,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn context(&self) -> &B::Context {
        &self.context
    }

    pub fn queue(&self) -> &B::Queue {
        &self.queue
    }

    /// The device the execution queue is bound to.
    pub fn device(&self) -> &B::Device {
        &self.devices[self.device_index]
    }

    /// All devices bound to the session's context.
    pub fn devices(&self) -> &[B::Device] {
        &self.devices
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }
}
