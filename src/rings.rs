//! Small bounded-history helper shared by the per-tick components.
//!
//! Every hot-path history (price ring, feature ring, volume-volatility ring,
//! audit ring, ...) is a `Ring<T>` rather than an unbounded `Vec`, so per-session
//! memory is bounded regardless of how long a session runs.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Ring<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    pub fn back(&self) -> Option<&T> {
        self.buf.back()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Iterator over the most recent `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip)
    }
}

impl Ring<f64> {
    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        if self.buf.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .buf
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.buf.len() as f64;
        var.max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let mut ring = Ring::new(3);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        ring.push(4);
        let items: Vec<_> = ring.iter().copied().collect();
        assert_eq!(items, vec![2, 3, 4]);
    }

    #[test]
    fn mean_and_std_dev() {
        let mut ring: Ring<f64> = Ring::new(10);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            ring.push(v);
        }
        assert!((ring.mean() - 5.0).abs() < 1e-9);
        assert!((ring.std_dev() - 2.0).abs() < 1e-9);
    }
}
