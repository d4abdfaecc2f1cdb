//! Sources of time, process id and randomness for temp-name generation.
//!
//! The writer only ever uses [`SystemEntropy`]. Tests substitute
//! [`FixedEntropy`] to get reproducible names.

use chrono::{Local, NaiveDate};

/// Ambient inputs that make a temp name unique.
pub trait EntropySource {
    /// Uniformly random value in `0..2^32`.
    fn random_u32(&mut self) -> u32;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate;

    /// Identifier of the calling process.
    fn pid(&self) -> u32;
}

/// Process-wide clock, pid and thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEntropy;

impl EntropySource for SystemEntropy {
    fn random_u32(&mut self) -> u32 {
        rand::random()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn pid(&self) -> u32 {
        std::process::id()
    }
}

/// Deterministic source that replays a fixed date, pid and random sequence.
#[derive(Debug, Clone)]
pub struct FixedEntropy {
    pub date: NaiveDate,
    pub pid: u32,
    randoms: Vec<u32>,
    next: usize,
}

impl FixedEntropy {
    /// Create a source that yields `randoms` in order, wrapping around.
    pub fn new(date: NaiveDate, pid: u32, randoms: Vec<u32>) -> Self {
        Self {
            date,
            pid,
            randoms,
            next: 0,
        }
    }
}

impl EntropySource for FixedEntropy {
    fn random_u32(&mut self) -> u32 {
        if self.randoms.is_empty() {
            return 0;
        }
        let value = self.randoms[self.next % self.randoms.len()];
        self.next += 1;
        value
    }

    fn today(&self) -> NaiveDate {
        self.date
    }

    fn pid(&self) -> u32 {
        self.pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_entropy_cycles() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut source = FixedEntropy::new(date, 7, vec![1, 2]);

        assert_eq!(source.random_u32(), 1);
        assert_eq!(source.random_u32(), 2);
        assert_eq!(source.random_u32(), 1);
        assert_eq!(source.today(), date);
        assert_eq!(source.pid(), 7);
    }

    #[test]
    fn test_fixed_entropy_empty_yields_zero() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut source = FixedEntropy::new(date, 1, Vec::new());
        assert_eq!(source.random_u32(), 0);
    }

    #[test]
    fn test_system_entropy_pid() {
        assert_eq!(SystemEntropy.pid(), std::process::id());
    }
}
