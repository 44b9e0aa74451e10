use std::hint::black_box;
use std::time::Instant;

use crate::generator::Scale;

#[derive(Clone, Copy, Debug)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    pub seed: u64,
    pub scale: Scale,
}

impl BenchConfig {
    pub fn warmup_iters(&self) -> u64 {
        match self.profile {
            Profile::Quick => 8,
            Profile::Full => 32,
        }
    }

    pub fn samples(&self) -> usize {
        match self.profile {
            Profile::Quick => 10,
            Profile::Full => 50,
        }
    }

    pub fn iters_per_sample(&self) -> u64 {
        match self.profile {
            Profile::Quick => 5,
            Profile::Full => 20,
        }
    }
}

/// Timing statistics of one case. Durations are seconds per call.
#[derive(Clone, Debug)]
pub struct Measured {
    pub samples: usize,
    pub iters_per_sample: u64,
    pub warmup_iters: u64,
    pub median: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Measured {
    /// Calls per second, from the mean.
    pub fn ops(&self) -> f64 {
        1.0 / self.mean
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Times `f` over `samples` batches of `iters_per_sample` calls after a warmup.
///
/// The first error stops the measurement and is returned as is.
pub fn try_measure<T, E>(
    samples: usize,
    iters_per_sample: u64,
    warmup_iters: u64,
    mut f: impl FnMut() -> Result<T, E>,
) -> Result<Measured, E> {
    for _ in 0..warmup_iters {
        black_box(f()?);
    }

    let samples = samples.max(1);
    let iters = iters_per_sample.max(1);
    let mut per_call = Vec::with_capacity(samples);
    for _ in 0..samples {
        let start = Instant::now();
        for _ in 0..iters {
            black_box(f()?);
        }
        // Clamp to 1ns so ops stays finite on coarse clocks.
        let ns = start.elapsed().as_nanos().max(1);
        per_call.push(ns as f64 / 1e9 / iters as f64);
    }

    per_call.sort_by(f64::total_cmp);
    let mean = per_call.iter().sum::<f64>() / per_call.len() as f64;
    Ok(Measured {
        samples,
        iters_per_sample: iters,
        warmup_iters,
        median: median(&per_call),
        mean,
        min: per_call[0],
        max: per_call[per_call.len() - 1],
    })
}
