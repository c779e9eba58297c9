//! Fixed-capacity samples kept per column
use crate::helpers::digest::hash64;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;

/// Uniform sample of numeric values (Algorithm R) with a seeded generator,
/// so the same input always keeps the same values.
#[derive(Clone, Debug)]
pub struct Reservoir {
    capacity: usize,
    seen: u64,
    values: Vec<f64>,
    rng: StdRng,
}

impl Reservoir {
    pub fn new(capacity: usize, seed: u64) -> Self {
        Reservoir {
            capacity,
            seen: 0,
            values: Vec::with_capacity(capacity.min(64)),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
        } else {
            let slot = self.rng.gen_range(0..self.seen);
            if slot < self.capacity as u64 {
                self.values[slot as usize] = value;
            }
        }
    }

    /// Number of values held
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Quartiles of the sampled values by linear interpolation
    pub fn quartiles(&self) -> Option<Quartiles> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.to_owned();
        sorted.sort_by(f64::total_cmp);
        Some(Quartiles {
            q1: percentile(&sorted, 0.25),
            median: percentile(&sorted, 0.5),
            q3: percentile(&sorted, 0.75),
        })
    }
}

/// Lower quartile, median and upper quartile of a column sample
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

impl Quartiles {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// Tukey fences `[Q1 - k·IQR, Q3 + k·IQR]`
    pub fn fences(&self, multiplier: f64) -> (f64, f64) {
        let spread = self.iqr() * multiplier;
        (self.q1 - spread, self.q3 + spread)
    }
}

fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let rank = fraction * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// K-minimum-values sketch: keeps the values with the `capacity` smallest hashes.
/// The kept values double as the distinct-value sample.
#[derive(Clone, Debug)]
pub struct DistinctSample {
    capacity: usize,
    values: BTreeMap<u64, String>,
}

impl DistinctSample {
    pub fn new(capacity: usize) -> Self {
        DistinctSample {
            capacity,
            values: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, value: &str) {
        let hash = hash64(value);
        if self.values.contains_key(&hash) {
            return;
        }
        if self.values.len() < self.capacity {
            self.values.insert(hash, value.to_owned());
        } else if let Some((&largest, _)) = self.values.last_key_value() {
            if hash < largest {
                self.values.pop_last();
                self.values.insert(hash, value.to_owned());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Exact below capacity, `(k - 1) / h_k` scaled to the hash space above it
    pub fn estimate(&self) -> u64 {
        if self.values.len() < self.capacity {
            return self.values.len() as u64;
        }
        match self.values.last_key_value() {
            Some((&largest, _)) if largest > 0 => {
                let fraction = largest as f64 / u64::MAX as f64;
                ((self.capacity - 1) as f64 / fraction).round() as u64
            }
            _ => self.values.len() as u64,
        }
    }

    /// The sampled values in lexical order
    pub fn values(&self) -> Vec<String> {
        let mut values: Vec<String> = self.values.values().cloned().collect();
        values.sort();
        values
    }
}
