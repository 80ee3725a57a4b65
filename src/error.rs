//! Error taxonomy for the orchestration layer.
//!
//! Every fallible operation in this crate returns [`Result`].  No component
//! retries or recovers internally; failures unwind to the caller of the
//! orchestration sequence, and the binary maps them to a non-zero exit code.

/// Errors produced by the accelerator session and its dependents.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid platform/device selection, missing kernel source file, or a
    /// missing kernel entry point.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Kernel build failure, carrying the build diagnostics retrieved from
    /// the program handle before the failure propagated.
    #[error("kernel build failed (status {status}): {log}")]
    Compilation {
        /// Build status reported by the compiler (CL_BUILD_ERROR is -2).
        status: i32,
        /// Compiler options the build was attempted with.
        options: String,
        /// Textual build log.
        log: String,
    },

    /// Host-side input rejected before any device resource was touched.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure reported by the underlying accelerator layer that is not
    /// otherwise classified.
    #[error("accelerator runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
