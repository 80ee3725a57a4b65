//! Runtime kernel compilation.
//!
//! The compiler takes kernel source text (usually read from a `.cl` file),
//! builds it against the session's device list, and on failure surfaces the
//! build status, compiler options and build log on the error channel before
//! propagating the failure.  The diagnostics are retrieved by the backend
//! from the still-live program handle; this module only reports them.  The
//! original error is re-raised unchanged, so the diagnostics are enrichment,
//! not replacement.

use std::fs;
use std::path::Path;

use log::error;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::session::Session;

/// A program compiled against one session's device list.
///
/// Must be rebuilt if the kernel source changes.  The program borrows
/// nothing from the session at rest, but kernels created from it are only
/// valid while the session lives.
#[derive(Debug)]
pub struct CompiledProgram<B: Backend> {
    pub(crate) program: B::Program,
}

impl<B: Backend> Session<B> {
    /// Read kernel source from `path` and compile it.
    ///
    /// A file that cannot be opened yields [`Error::Configuration`].
    pub fn compile_file(&self, path: &Path) -> Result<CompiledProgram<B>> {
        let source = fs::read_to_string(path).map_err(|_| {
            Error::Configuration(format!("could not open file : {}", path.display()))
        })?;
        self.compile_source(&source)
    }

    /// Compile kernel source text against every device bound to the session.
    pub fn compile_source(&self, source: &str) -> Result<CompiledProgram<B>> {
        match self
            .backend()
            .build_program(self.context(), self.devices(), self.device(), source)
        {
            Ok(program) => Ok(CompiledProgram { program }),
            Err(Error::Compilation {
                status,
                options,
                log,
            }) => {
                error!("build status    : {status}");
                error!("build options   : {options}");
                error!("build log       : {log}");
                Err(Error::Compilation {
                    status,
                    options,
                    log,
                })
            }
            Err(other) => Err(other),
        }
    }
}
