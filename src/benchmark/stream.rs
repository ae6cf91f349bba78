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

//! STREAM memory bandwidth kernels (copy, scale, add, triad).

use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::{BenchmarkStatus, StreamResult, CANCELLED};

pub const ERR_INVALID_SIZE: &str = "INVALID_SIZE";
pub const ERR_OOM_HOST: &str = "OOM_HOST";
pub const ERR_INVALID_RESULTS: &str = "INVALID_RESULTS";

const SCALAR: f64 = 3.0;
const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Largest vector length with three f64 vectors fitting in `memory_bytes`.
pub fn max_vector_size(memory_bytes: u64) -> usize {
    (memory_bytes / 3 / std::mem::size_of::<f64>() as u64) as usize
}

fn alloc(len: usize, value: f64) -> Option<Vec<f64>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, value);
    Some(v)
}

#[derive(Debug, Clone, Copy)]
enum Kernel {
    Copy,
    Scale,
    Add,
    Triad,
}

impl Kernel {
    const ALL: [Kernel; 4] = [Kernel::Copy, Kernel::Scale, Kernel::Add, Kernel::Triad];

    /// f64 arrays touched per element.
    fn arrays(self) -> f64 {
        match self {
            Kernel::Copy | Kernel::Scale => 2.0,
            Kernel::Add | Kernel::Triad => 3.0,
        }
    }
}

struct Vectors {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl Vectors {
    fn apply(&mut self, kernel: Kernel) {
        let Vectors { a, b, c } = self;
        match kernel {
            Kernel::Copy => c.copy_from_slice(a),
            Kernel::Scale => b.iter_mut().zip(c.iter()).for_each(|(b, c)| *b = SCALAR * c),
            Kernel::Add => c
                .iter_mut()
                .zip(a.iter().zip(b.iter()))
                .for_each(|(c, (a, b))| *c = a + b),
            Kernel::Triad => a
                .iter_mut()
                .zip(b.iter().zip(c.iter()))
                .for_each(|(a, (b, c))| *a = b + SCALAR * c),
        }
    }
}

/// Replay the kernels on scalars and compare with the vector contents.
fn verify(vectors: &Vectors, repeats: usize) -> bool {
    let (mut a, mut b, mut c) = (1.0_f64, 2.0_f64, 0.0_f64);
    for _ in 0..repeats {
        c = a;
        b = SCALAR * c;
        c = a + b;
        a = b + SCALAR * c;
    }
    let close = |got: &[f64], want: f64| {
        got.iter()
            .all(|&v| v == want || ((v - want) / want).abs() < 1e-12)
    };
    close(&vectors.a, a) && close(&vectors.b, b) && close(&vectors.c, c)
}

pub fn run(size: usize, repeats: usize, cancel: &AtomicBool) -> StreamResult {
    if size == 0 || repeats == 0 {
        return StreamResult::failed(ERR_INVALID_SIZE);
    }
    let (Some(a), Some(b), Some(c)) = (alloc(size, 1.0), alloc(size, 2.0), alloc(size, 0.0)) else {
        return StreamResult::failed(ERR_OOM_HOST);
    };
    let mut vectors = Vectors { a, b, c };

    let bytes_per_element = std::mem::size_of::<f64>() as f64 * size as f64;
    let mut best = [0.0_f64; 4];

    for _ in 0..repeats {
        if cancel.load(Ordering::Relaxed) {
            return StreamResult::failed(CANCELLED);
        }
        for (slot, kernel) in best.iter_mut().zip(Kernel::ALL) {
            let start = Instant::now();
            vectors.apply(kernel);
            black_box(&vectors.a);
            let elapsed = start.elapsed().as_secs_f64().max(f64::EPSILON);
            let rate = kernel.arrays() * bytes_per_element / elapsed / BYTES_PER_GIB;
            *slot = slot.max(rate);
        }
    }

    if !verify(&vectors, repeats) {
        return StreamResult::failed(ERR_INVALID_RESULTS);
    }

    StreamResult {
        status: BenchmarkStatus::Ok,
        copy: best[0],
        scale: best[1],
        add: best[2],
        triad: best[3],
    }
}
