//! Device buffer staging for one multiplication.
//!
//! This module defines [`BufferSet`], the staged device-resident state for a
//! block-tiled multiply: two read-only input buffers copy-initialized from
//! host memory at allocation time, one read-write output buffer sized to the
//! product of the two input row counts, and the kernel handle the dispatcher
//! binds them to.  Input validation happens before any device allocation so
//! a rejected staging call never leaves partially-created buffers behind.
//!
//! Re-staging replaces the prior set; buffers are never pooled or reused
//! across calls.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::program::CompiledProgram;
use crate::session::Session;

/// Entry point the companion kernel must expose.
pub const KERNEL_ENTRY_POINT: &str = "matrix_multiply_block";

/// Staged device buffers plus the kernel handle that consumes them.
///
/// Matrices are flat `f32` sequences interpreted as rows of width `pitch`.
/// With `rows_a = mat_a.len() / pitch` and `rows_b = mat_b.len() / pitch`,
/// the output holds `rows_a * rows_b` elements: one per pair of input rows.
#[derive(Debug)]
pub struct BufferSet<B: Backend> {
    pub(crate) mat_a: B::Buffer,
    pub(crate) mat_b: B::Buffer,
    pub(crate) result: B::Buffer,
    pub(crate) kernel: B::Kernel,
    pitch: u32,
    rows_a: usize,
    rows_b: usize,
    result_len: usize,
}

impl<B: Backend> BufferSet<B> {
    /// Stage `mat_a` and `mat_b` on the device and fetch the kernel handle.
    ///
    /// Fails with [`Error::Validation`] when either matrix length is not
    /// divisible by `pitch` (checked before touching the device), or with
    /// [`Error::Configuration`] when the compiled program has no
    /// [`KERNEL_ENTRY_POINT`].
    pub fn stage(
        session: &Session<B>,
        program: &CompiledProgram<B>,
        mat_a: &[f32],
        mat_b: &[f32],
        pitch: u32,
    ) -> Result<Self> {
        if pitch == 0 {
            return Err(Error::Validation("pitch must be greater than zero".into()));
        }
        let pitch_len = pitch as usize;
        if mat_a.len() % pitch_len != 0 {
            return Err(Error::Validation(
                "matrix 1 should be dividable by pitch".into(),
            ));
        }
        if mat_b.len() % pitch_len != 0 {
            return Err(Error::Validation(
                "matrix 2 should be dividable by pitch".into(),
            ));
        }
        let rows_a = mat_a.len() / pitch_len;
        let rows_b = mat_b.len() / pitch_len;
        let result_len = rows_a * rows_b;

        let backend = session.backend();
        // Inputs are copy-initialized at creation: one blocking host-to-
        // device transfer bound to the allocation, no separate copy step.
        let mat_a = backend.create_input_buffer(session.context(), mat_a)?;
        let mat_b = backend.create_input_buffer(session.context(), mat_b)?;
        let result = backend.create_output_buffer(session.context(), result_len)?;
        let kernel = backend.create_kernel(&program.program, KERNEL_ENTRY_POINT)?;

        Ok(Self {
            mat_a,
            mat_b,
            result,
            kernel,
            pitch,
            rows_a,
            rows_b,
            result_len,
        })
    }

    /// Row width of both input matrices, in elements.
    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    /// Row count of matrix A, the first global work dimension.
    pub fn rows_a(&self) -> usize {
        self.rows_a
    }

    /// Row count of matrix B, the second global work dimension.
    pub fn rows_b(&self) -> usize {
        self.rows_b
    }

    /// Number of elements in the output buffer.
    pub fn result_len(&self) -> usize {
        self.result_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HostBackend;

    const SRC: &str = "__kernel void matrix_multiply_block(__global const float* a, \
                       __global const float* b, __global float* c, uint pitch) {}";

    fn staged_fixture(
        backend: &HostBackend,
    ) -> (Session<HostBackend>, CompiledProgram<HostBackend>) {
        let session = Session::new(backend.clone(), 0, 0).unwrap();
        let program = session.compile_source(SRC).unwrap();
        (session, program)
    }

    #[test]
    fn stage_computes_result_size_from_block_counts() {
        let backend = HostBackend::new();
        let (session, program) = staged_fixture(&backend);
        let a = vec![0.0f32; 4 * 16];
        let b = vec![0.0f32; 4 * 32];
        let set = BufferSet::stage(&session, &program, &a, &b, 4).unwrap();
        assert_eq!(set.rows_a(), 16);
        assert_eq!(set.rows_b(), 32);
        assert_eq!(set.result_len(), 16 * 32);
    }

    #[test]
    fn stage_rejects_matrix_a_not_divisible_by_pitch() {
        let backend = HostBackend::new();
        let (session, program) = staged_fixture(&backend);
        let before = backend.buffer_allocations();
        let a = vec![0.0f32; 1000];
        let b = vec![0.0f32; 256];
        let err = BufferSet::stage(&session, &program, &a, &b, 128).unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("matrix 1")),
            other => panic!("expected Validation, got {other:?}"),
        }
        // Validation precedes allocation: nothing was created.
        assert_eq!(backend.buffer_allocations(), before);
    }

    #[test]
    fn stage_rejects_matrix_b_not_divisible_by_pitch() {
        let backend = HostBackend::new();
        let (session, program) = staged_fixture(&backend);
        let before = backend.buffer_allocations();
        let a = vec![0.0f32; 256];
        let b = vec![0.0f32; 99];
        let err = BufferSet::stage(&session, &program, &a, &b, 128).unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("matrix 2")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(backend.buffer_allocations(), before);
    }

    #[test]
    fn stage_rejects_zero_pitch() {
        let backend = HostBackend::new();
        let (session, program) = staged_fixture(&backend);
        let err = BufferSet::stage(&session, &program, &[1.0], &[1.0], 0).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn stage_fails_when_entry_point_is_missing() {
        let backend = HostBackend::new();
        let session = Session::new(backend.clone(), 0, 0).unwrap();
        let program = session
            .compile_source("__kernel void some_other_kernel(__global float* x) {}")
            .unwrap();
        let a = vec![0.0f32; 16];
        let err = BufferSet::stage(&session, &program, &a, &a, 4).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn restaging_allocates_fresh_buffers() {
        let backend = HostBackend::new();
        let (session, program) = staged_fixture(&backend);
        let a = vec![0.0f32; 64];
        let _first = BufferSet::stage(&session, &program, &a, &a, 4).unwrap();
        let after_first = backend.buffer_allocations();
        let _second = BufferSet::stage(&session, &program, &a, &a, 4).unwrap();
        assert_eq!(backend.buffer_allocations(), after_first + 3);
    }
}
