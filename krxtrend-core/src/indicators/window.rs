//! Fixed-size circular buffer used by every rolling indicator.
//!
//! The window holds the last `capacity` observations, each of which may be
//! missing. A running sum over the present values is maintained on push, so
//! means and sums are O(1) per bar. Min, max and standard deviation scan the
//! buffer, which is at most a few dozen slots for the indicators in this crate.

#[derive(Debug, Clone)]
pub struct RollingWindow {
    slots: Vec<Option<f64>>,
    head: usize,
    filled: usize,
    sum: f64,
    present: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "rolling window capacity must be >= 1");
        Self {
            slots: vec![None; capacity],
            head: 0,
            filled: 0,
            sum: 0.0,
            present: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Push the newest observation, evicting the oldest once the window is full.
    pub fn push(&mut self, value: Option<f64>) {
        if self.filled == self.capacity() {
            if let Some(old) = self.slots[self.head] {
                self.sum -= old;
                self.present -= 1;
            }
        } else {
            self.filled += 1;
        }

        self.slots[self.head] = value;
        if let Some(v) = value {
            self.sum += v;
            self.present += 1;
        }
        self.head = (self.head + 1) % self.capacity();

        // No values left: drop accumulated rounding error.
        if self.present == 0 {
            self.sum = 0.0;
        }
    }

    /// True once `capacity` observations have been pushed.
    pub fn is_full(&self) -> bool {
        self.filled == self.capacity()
    }

    /// Number of non-missing observations currently in the window.
    pub fn present(&self) -> usize {
        self.present
    }

    /// True when the window is full and holds no missing observation.
    pub fn is_complete(&self) -> bool {
        self.is_full() && self.present == self.capacity()
    }

    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.slots[..self.filled].iter().filter_map(|v| *v)
    }

    /// Sum of present values, if at least `min_present` are present.
    pub fn sum(&self, min_present: usize) -> Option<f64> {
        (self.present >= min_present.max(1)).then_some(self.sum)
    }

    /// Mean of present values, if at least `min_present` are present.
    pub fn mean(&self, min_present: usize) -> Option<f64> {
        self.sum(min_present).map(|s| s / self.present as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.values().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values().reduce(f64::max)
    }

    /// Sample standard deviation (n - 1 denominator) of present values.
    ///
    /// Needs at least two present values regardless of `min_present`.
    pub fn std(&self, min_present: usize) -> Option<f64> {
        let n = self.present;
        if n < min_present.max(2) {
            return None;
        }
        let mean = self.values().sum::<f64>() / n as f64;
        let var = self.values().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(var.sqrt())
    }
}
