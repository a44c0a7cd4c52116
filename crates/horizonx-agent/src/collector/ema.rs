// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Time-weighted exponential moving average.
//!
//! Parameterized by a half-life: after exactly one half-life of elapsed
//! time, the smoothed value has moved halfway to the raw reading,
//! independent of sampling cadence. Irregular ticks are handled by
//! weighting each update with the actual elapsed time.

use std::time::Duration;

/// One smoothed series.
#[derive(Debug, Clone)]
pub struct Ema {
    half_life: Duration,
    value: Option<f64>,
}

impl Ema {
    pub fn new(half_life: Duration) -> Self {
        Self {
            half_life,
            value: None,
        }
    }

    /// Fold in a raw reading taken `dt` after the previous one and return
    /// the smoothed value. The first reading seeds the series.
    pub fn update(&mut self, raw: f64, dt: Duration) -> f64 {
        let smoothed = match self.value {
            None => raw,
            Some(previous) => {
                let half_lives = dt.as_secs_f64() / self.half_life.as_secs_f64();
                let alpha = 1.0 - (-half_lives * std::f64::consts::LN_2).exp();
                previous + alpha * (raw - previous)
            }
        };
        self.value = Some(smoothed);
        smoothed
    }

    /// Current smoothed value, if the series has been seeded.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_seeds_with_raw() {
        let mut ema = Ema::new(Duration::from_secs(15));
        assert_eq!(ema.update(42.0, Duration::from_secs(5)), 42.0);
    }

    #[test]
    fn test_one_half_life_moves_halfway() {
        let mut ema = Ema::new(Duration::from_secs(20));
        ema.update(0.0, Duration::from_secs(5));
        let smoothed = ema.update(100.0, Duration::from_secs(20));
        assert!((smoothed - 50.0).abs() < 1e-9, "got {}", smoothed);
    }

    #[test]
    fn test_longer_dt_weighs_raw_more() {
        let mut short = Ema::new(Duration::from_secs(30));
        let mut long = Ema::new(Duration::from_secs(30));
        short.update(0.0, Duration::from_secs(5));
        long.update(0.0, Duration::from_secs(5));

        let after_short = short.update(100.0, Duration::from_secs(5));
        let after_long = long.update(100.0, Duration::from_secs(60));
        assert!(after_long > after_short);
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut ema = Ema::new(Duration::from_secs(15));
        ema.update(0.0, Duration::from_secs(5));
        let mut last = 0.0;
        for _ in 0..100 {
            last = ema.update(80.0, Duration::from_secs(5));
        }
        assert!((last - 80.0).abs() < 0.01, "got {}", last);
    }
}
