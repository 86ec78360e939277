//! Component J: sheds work under sustained load by skipping ticks rather
//! than letting the ingest queue back up.

use parking_lot::Mutex;

use crate::rings::Ring;

const WINDOW: usize = 20;
const TRAILING: usize = 5;
const SKIP_RATIO_DIVISOR: f64 = 50.0;
const EXIT_RATIO: f64 = 0.7;

struct SchedulerState {
    samples: Ring<f64>,
    adaptive: bool,
    skip_ratio: u32,
    counter: u64,
}

pub struct AdaptiveScheduler {
    state: Mutex<SchedulerState>,
    t_slow_ms: f64,
}

impl AdaptiveScheduler {
    pub fn new(t_slow_ms: f64) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                samples: Ring::new(WINDOW),
                adaptive: false,
                skip_ratio: 1,
                counter: 0,
            }),
            t_slow_ms,
        }
    }

    /// Record one tick's processing time. Call after every processed tick,
    /// skipped or not.
    pub fn record(&self, processing_ms: f64) {
        let mut state = self.state.lock();
        state.samples.push(processing_ms);
        let trailing_avg = Self::trailing_average(&state.samples);

        if !state.adaptive && trailing_avg > self.t_slow_ms {
            state.adaptive = true;
            state.skip_ratio = (trailing_avg / SKIP_RATIO_DIVISOR).clamp(1.0, 3.0).round() as u32;
        } else if state.adaptive && trailing_avg < EXIT_RATIO * self.t_slow_ms {
            state.adaptive = false;
            state.skip_ratio = 1;
            state.counter = 0;
        }
    }

    /// Whether the worker should process the next popped snapshot, or skip
    /// it to shed load. Always returns true outside adaptive mode.
    pub fn should_process(&self) -> bool {
        let mut state = self.state.lock();
        if !state.adaptive {
            return true;
        }
        let due = state.counter % state.skip_ratio as u64 == 0;
        state.counter += 1;
        due
    }

    pub fn is_adaptive(&self) -> bool {
        self.state.lock().adaptive
    }

    pub fn skip_ratio(&self) -> u32 {
        self.state.lock().skip_ratio
    }

    fn trailing_average(samples: &Ring<f64>) -> f64 {
        let tail: Vec<f64> = samples.tail(TRAILING).copied().collect();
        if tail.is_empty() {
            return 0.0;
        }
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enters_adaptive_mode_after_sustained_slow_ticks() {
        let scheduler = AdaptiveScheduler::new(100.0);
        for _ in 0..6 {
            scheduler.record(250.0);
        }
        assert!(scheduler.is_adaptive());
        assert!(scheduler.skip_ratio() >= 1);
    }

    #[test]
    fn stays_in_normal_mode_under_threshold() {
        let scheduler = AdaptiveScheduler::new(100.0);
        for _ in 0..10 {
            scheduler.record(10.0);
        }
        assert!(!scheduler.is_adaptive());
        assert!(scheduler.should_process());
    }

    #[test]
    fn exits_adaptive_mode_once_trailing_average_recovers() {
        let scheduler = AdaptiveScheduler::new(100.0);
        for _ in 0..6 {
            scheduler.record(250.0);
        }
        assert!(scheduler.is_adaptive());
        for _ in 0..6 {
            scheduler.record(5.0);
        }
        assert!(!scheduler.is_adaptive());
    }
}
