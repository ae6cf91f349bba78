// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::{BenchmarkStatus, MatrixMultiplyResult, RunningStats, CANCELLED};

pub const ERR_INVALID_SIZE: &str = "INVALID_SIZE";
pub const ERR_OOM: &str = "OOM";
pub const ERR_INVALID_RESULTS: &str = "INVALID_RESULTS";

/// Largest N with three N x N f64 matrices fitting in `memory_bytes`.
pub fn max_matrix_size(memory_bytes: u64) -> usize {
    (memory_bytes as f64 / 3.0 / std::mem::size_of::<f64>() as f64)
        .sqrt()
        .floor() as usize
}

fn alloc(len: usize) -> Option<Vec<f64>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, 0.0);
    Some(v)
}

/// A is all ones and B holds `1 / (2 + sin j)` in column j, so every
/// element of C in column j equals `n / (2 + sin j)`.
fn init_matrices(n: usize, a: &mut [f64], b: &mut [f64]) {
    for i in 0..n {
        for j in 0..n {
            a[i * n + j] = 1.0;
            b[i * n + j] = 1.0 / (2.0 + (j as f64).sin());
        }
    }
}

/// C = A * B, row-major, i-k-j order.
fn multiply(n: usize, a: &[f64], b: &[f64], c: &mut [f64]) {
    c.fill(0.0);
    for i in 0..n {
        let c_row = &mut c[i * n..(i + 1) * n];
        for k in 0..n {
            let aik = a[i * n + k];
            let b_row = &b[k * n..(k + 1) * n];
            for (cij, bkj) in c_row.iter_mut().zip(b_row) {
                *cij += aik * bkj;
            }
        }
    }
}

fn verify(n: usize, c: &[f64]) -> bool {
    (0..n).all(|j| {
        let expected = n as f64 / (2.0 + (j as f64).sin());
        let got = c[(n - 1) * n + j];
        ((got - expected) / expected).abs() < 1e-9
    })
}

pub fn run(size: usize, repeats: usize, cancel: &AtomicBool) -> MatrixMultiplyResult {
    if size == 0 || repeats == 0 {
        return MatrixMultiplyResult::failed(ERR_INVALID_SIZE);
    }
    let Some(len) = size.checked_mul(size) else {
        return MatrixMultiplyResult::failed(ERR_OOM);
    };
    let (Some(mut a), Some(mut b), Some(mut c)) = (alloc(len), alloc(len), alloc(len)) else {
        return MatrixMultiplyResult::failed(ERR_OOM);
    };
    init_matrices(size, &mut a, &mut b);

    let n = size as f64;
    let flops_per_step = n * n * (n + 1.0) * 2.0;
    let mut stats = RunningStats::new();

    for _ in 0..repeats {
        if cancel.load(Ordering::Relaxed) {
            return MatrixMultiplyResult::failed(CANCELLED);
        }
        let start = Instant::now();
        multiply(size, black_box(&a), black_box(&b), &mut c);
        black_box(&c);
        let elapsed = start.elapsed().as_secs_f64().max(f64::EPSILON);
        stats.push(flops_per_step / elapsed / 1e9);
    }

    if !verify(size, &c) {
        return MatrixMultiplyResult::failed(ERR_INVALID_RESULTS);
    }

    MatrixMultiplyResult {
        status: BenchmarkStatus::Ok,
        avg: stats.avg(),
        min: stats.min(),
        max: stats.max(),
        stddev: stats.stddev(),
    }
}
