//! End-to-end orchestration tests against the in-process reference backend:
//! session, compile, stage, repeated dispatch, readback.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

use cl_matmul::{
    dispatch, read_result, Backend, BufferSet, Error, HostBackend, Session,
};

const KERNEL_SRC: &str = "__kernel void matrix_multiply_block(__global const float* a, \
                          __global const float* b, __global float* c, uint pitch) {}";

/// Naive host-side reference: dot product of row i of A with row j of B.
fn reference_multiply(a: &[f32], b: &[f32], pitch: usize) -> Vec<f32> {
    let rows_a = a.len() / pitch;
    let rows_b = b.len() / pitch;
    let mut out = vec![0.0f32; rows_a * rows_b];
    for i in 0..rows_a {
        for j in 0..rows_b {
            let mut sum = 0.0f32;
            for k in 0..pitch {
                sum += a[i * pitch + k] * b[j * pitch + k];
            }
            out[i * rows_b + j] = sum;
        }
    }
    out
}

fn random_matrix(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(0.0f32..1.0)).collect()
}

#[test]
fn full_sequence_with_repeated_dispatch() {
    let backend = HostBackend::new();
    let session = Session::new(backend.clone(), 0, 0).unwrap();
    let program = session.compile_source(KERNEL_SRC).unwrap();

    let pitch = 8u32;
    let mut rng = StdRng::seed_from_u64(7);
    let mat_a = random_matrix(&mut rng, 32 * pitch as usize);
    let mat_b = random_matrix(&mut rng, 48 * pitch as usize);
    let buffers = BufferSet::stage(&session, &program, &mat_a, &mat_b, pitch).unwrap();
    assert_eq!(buffers.result_len(), 32 * 48);

    let allocs_after_stage = backend.buffer_allocations();
    for _ in 0..10 {
        let elapsed = dispatch(&session, &buffers).unwrap();
        assert!(elapsed >= Duration::ZERO);
    }
    // Ten dispatches, zero new device resources.
    assert_eq!(backend.buffer_allocations(), allocs_after_stage);

    let out = read_result(&session, &buffers).unwrap();
    let expected = reference_multiply(&mat_a, &mat_b, pitch as usize);
    assert_eq!(out.len(), expected.len());
    for (got, want) in out.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-4, "got {got}, want {want}");
    }
}

#[test]
fn result_size_matches_block_count_product() {
    let session = Session::new(HostBackend::new(), 0, 0).unwrap();
    let program = session.compile_source(KERNEL_SRC).unwrap();
    let pitch = 128u32;
    // 16 rows per side keeps the fixture small while exercising the same
    // result-size arithmetic as a full-size run.
    let mat = vec![0.5f32; 16 * pitch as usize];
    let buffers = BufferSet::stage(&session, &program, &mat, &mat, pitch).unwrap();
    assert_eq!(buffers.result_len(), 16 * 16);
}

#[test]
fn indivisible_input_fails_before_any_allocation() {
    let backend = HostBackend::new();
    let session = Session::new(backend.clone(), 0, 0).unwrap();
    let program = session.compile_source(KERNEL_SRC).unwrap();

    let mat_a = vec![0.0f32; 1000];
    let mat_b = vec![0.0f32; 256];
    let err = BufferSet::stage(&session, &program, &mat_a, &mat_b, 128).unwrap_err();
    match err {
        Error::Validation(msg) => assert!(msg.contains("matrix 1")),
        other => panic!("expected Validation, got {other:?}"),
    }
    assert_eq!(backend.buffer_allocations(), 0);
}

#[test]
fn device_index_off_by_one_fails_with_configuration_error() {
    let backend = HostBackend::new();
    let device_count = {
        let platform = backend.platforms().unwrap().remove(0);
        backend.devices(&platform).unwrap().len()
    };
    let err = Session::new(backend, 0, device_count).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn compilation_failure_surfaces_before_staging() {
    let session = Session::new(HostBackend::new(), 0, 0).unwrap();
    let err = session.compile_source("#error kernel intentionally broken").unwrap_err();
    match err {
        Error::Compilation { status, log, .. } => {
            assert_eq!(status, -2);
            assert!(log.contains("broken"));
        }
        other => panic!("expected Compilation, got {other:?}"),
    }
}
