//! Values handed out by the measurement engine.

use chrono::{DateTime, Local};
use cell_traits::Quantity;

/// One entry of the error log.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl ErrorRecord {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
        }
    }
}

/// One averaged value per quantity; `None` marks a series that could not be averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    values: [Option<f64>; Quantity::COUNT],
}

impl Snapshot {
    pub fn get(&self, q: Quantity) -> Option<f64> {
        self.values[q.index()]
    }

    pub fn set(&mut self, q: Quantity, value: Option<f64>) {
        self.values[q.index()] = value;
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(Option::is_some)
    }

    /// Quantities with no value, in `Quantity::ALL` order.
    pub fn missing(&self) -> Vec<Quantity> {
        Quantity::ALL
            .into_iter()
            .filter(|q| self.get(*q).is_none())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Quantity, Option<f64>)> + '_ {
        Quantity::ALL.into_iter().map(|q| (q, self.get(q)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tracks_missing_values() {
        let mut s = Snapshot::default();
        assert!(!s.is_complete());
        for q in Quantity::ALL {
            s.set(q, Some(1.0));
        }
        assert!(s.is_complete());
        s.set(Quantity::O2, None);
        assert_eq!(s.missing(), vec![Quantity::O2]);
    }
}
