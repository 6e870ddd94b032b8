/// Utility types for training diagnostics
use std::collections::VecDeque;

/// Sliding window over the most recent values
///
/// Keeps at most `window_size` values; older ones fall off the front.
#[derive(Debug, Clone)]
pub struct ValueWindow {
    window_size: usize,
    values: VecDeque<f64>,
}

impl Default for ValueWindow {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ValueWindow {
    /// Create new window holding up to `window_size` values
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            values: VecDeque::with_capacity(window_size.max(1)),
        }
    }

    /// Push a value, evicting the oldest when full
    pub fn append(&mut self, x: f64) {
        if self.values.len() == self.window_size {
            self.values.pop_front();
        }
        self.values.push_back(x);
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Mean of the window, 0 when empty
    pub fn average(&self) -> f64 {
        self.sum() / self.count().max(1) as f64
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = ValueWindow::new(3);
        for x in [1.0, 2.0, 3.0, 4.0] {
            window.append(x);
        }

        assert_eq!(window.count(), 3);
        assert!((window.sum() - 9.0).abs() < 1e-12);
        assert!((window.average() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_average_is_zero() {
        let mut window = ValueWindow::default();
        assert_eq!(window.average(), 0.0);

        window.append(5.0);
        window.reset();
        assert_eq!(window.count(), 0);
        assert_eq!(window.average(), 0.0);
    }
}
