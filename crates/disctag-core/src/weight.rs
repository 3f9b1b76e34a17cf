//! The averaged weight cell.

use serde::{Deserialize, Serialize};

/// How the time-averaged value of a weight is accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Averaging {
    /// Each update records `delta * example_index`; the sum is rebuilt as
    /// `value * n - accumulator` at finalization.
    #[default]
    Lazy,
    /// The trainer periodically adds every current value to its sum.
    Eager,
}

/// One trainable scalar.
///
/// `accumulator` holds the eager running sum or the lazy correction term,
/// depending on the [`Averaging`] discipline in use.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Weight {
    value: f64,
    accumulator: f64,
    last_updated: u64,
}

impl Weight {
    /// Weight starting at `value` with an empty history.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Sum of values seen so far, for averaging.
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Index of the example during which the weight last changed.
    pub fn last_updated(&self) -> u64 {
        self.last_updated
    }

    /// Apply an update made while processing example `example` (0-based).
    pub fn adjust(&mut self, delta: f64, example: u64, averaging: Averaging) {
        self.value += delta;
        self.last_updated = example;
        if averaging == Averaging::Lazy {
            self.accumulator += delta * example as f64;
        }
    }

    /// Eager averaging step.
    pub fn add_to_sum(&mut self) {
        self.accumulator += self.value;
    }

    /// Eager running sum.
    pub fn sum(&self) -> f64 {
        self.accumulator
    }

    /// The eager sum with granularity 1 over `n` examples, reconstructed
    /// from lazy updates.
    pub fn lazy_sum(&self, n: u64) -> f64 {
        self.value * n as f64 - self.accumulator
    }

    /// The value exported after `n` training examples.
    pub fn averaged(&self, averaging: Averaging, n: u64) -> f64 {
        match averaging {
            Averaging::Lazy => self.lazy_sum(n),
            Averaging::Eager => self.sum(),
        }
    }

    /// Replace the cell with a fixed value, dropping training history.
    pub fn set(&mut self, value: f64) {
        *self = Self::new(value);
    }
}
