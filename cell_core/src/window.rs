//! Rolling sample buffer with a one-outlier trimmed mean.

use std::collections::VecDeque;

use crate::error::CellError;

/// Bounded, newest-first buffer of readings for one quantity.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    min_samples: usize,
}

impl SampleWindow {
    /// `capacity = n_sample * replicas`. At least three samples are always
    /// required before an average is available.
    pub fn new(n_sample: usize, replicas: usize) -> Self {
        let min_samples = n_sample.max(3);
        let capacity = (n_sample * replicas.max(1)).max(min_samples);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            min_samples,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.samples.push_front(value);
        if self.samples.len() > self.capacity {
            self.samples.pop_back();
        }
    }

    /// Mean after discarding exactly one maximum and one minimum.
    ///
    /// Ties are not special-cased: with three equal maxima only one of them
    /// is dropped.
    pub fn average(&self) -> Result<f64, CellError> {
        let n = self.samples.len();
        if n < self.min_samples {
            return Err(CellError::InsufficientSamples {
                have: n,
                need: self.min_samples,
            });
        }
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        for &v in &self.samples {
            sum += v;
            max = max.max(v);
            min = min.min(v);
        }
        Ok((sum - max - min) / (n - 2) as f64)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest sample, if any.
    pub fn latest(&self) -> Option<f64> {
        self.samples.front().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut w = SampleWindow::new(3, 2);
        for v in 0..10 {
            w.add(f64::from(v));
        }
        assert_eq!(w.len(), 6);
        assert_eq!(w.latest(), Some(9.0));
        // remaining 4..=9, trimmed: 5+6+7+8
        assert_eq!(w.average().unwrap(), 6.5);
    }

    #[rstest]
    #[case(&[1.0, 2.0, 3.0], 2.0)]
    #[case(&[5.0, 5.0, 5.0, 5.0], 5.0)]
    #[case(&[1.0, 100.0, 2.0, 3.0, -50.0], 2.0)]
    #[case(&[-3.0, -1.0, -2.0], -2.0)]
    fn trimmed_mean(#[case] values: &[f64], #[case] expected: f64) {
        let mut w = SampleWindow::new(3, 4);
        for &v in values {
            w.add(v);
        }
        assert!((w.average().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn tied_extremes_are_dropped_once() {
        let mut w = SampleWindow::new(3, 2);
        for v in [9.0, 9.0, 1.0, 1.0, 5.0] {
            w.add(v);
        }
        // drop one 9 and one 1: (9 + 1 + 5) / 3
        assert!((w.average().unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_samples() {
        let mut w = SampleWindow::new(10, 1);
        for _ in 0..9 {
            w.add(1.0);
        }
        assert_eq!(
            w.average(),
            Err(CellError::InsufficientSamples { have: 9, need: 10 })
        );
        w.add(1.0);
        assert!(w.average().is_ok());
    }

    #[test]
    fn clear_empties() {
        let mut w = SampleWindow::new(3, 1);
        w.add(1.0);
        w.clear();
        assert!(w.is_empty());
    }

    proptest! {
        #[test]
        fn average_excludes_one_max_and_one_min(values in prop::collection::vec(-1e6f64..1e6, 3..40)) {
            let mut w = SampleWindow::new(3, 20);
            for &v in &values {
                w.add(v);
            }
            let kept: Vec<f64> = values.iter().rev().take(w.capacity()).copied().collect();
            let max = kept.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = kept.iter().copied().fold(f64::INFINITY, f64::min);
            let expected = (kept.iter().sum::<f64>() - max - min) / (kept.len() - 2) as f64;
            prop_assert!((w.average().unwrap() - expected).abs() <= 1e-6 * expected.abs().max(1.0));
        }

        #[test]
        fn length_never_exceeds_capacity(n in 3usize..12, r in 1usize..4, count in 0usize..100) {
            let mut w = SampleWindow::new(n, r);
            for i in 0..count {
                w.add(i as f64);
            }
            prop_assert!(w.len() <= w.capacity());
            prop_assert_eq!(w.average().is_ok(), w.len() >= n);
        }
    }
}
